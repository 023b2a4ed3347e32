//! Registry of active subscribers.

use super::index::TagIndex;
use super::types::SubscriberSlot;
use crate::error::{FeedError, Result};
use crate::tags::TagSet;
use crate::types::SubscriberId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Active subscribers by id, plus the tag index used for matching.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    slots: RwLock<HashMap<SubscriberId, Arc<SubscriberSlot>>>,
    index: TagIndex,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a slot visible and index its interests.
    ///
    /// Fails with `DuplicateSubscriber` before touching anything if the id
    /// is taken.
    pub fn insert(&self, slot: Arc<SubscriberSlot>, interests: &TagSet) -> Result<()> {
        let mut slots = self.slots.write();
        if slots.contains_key(slot.id()) {
            return Err(FeedError::DuplicateSubscriber(slot.id().clone()));
        }

        self.index.add(slot.id(), interests);
        slots.insert(slot.id().clone(), slot);
        Ok(())
    }

    /// Fail with `DuplicateSubscriber` if `id` is registered.
    pub fn ensure_absent(&self, id: &SubscriberId) -> Result<()> {
        if self.slots.read().contains_key(id) {
            return Err(FeedError::DuplicateSubscriber(id.clone()));
        }
        Ok(())
    }

    /// Detach a subscriber and drop its index entries.
    pub fn remove(&self, id: &SubscriberId, interests: &TagSet) -> Result<Arc<SubscriberSlot>> {
        let slot = self
            .slots
            .write()
            .remove(id)
            .ok_or_else(|| FeedError::UnknownSubscriber(id.clone()))?;
        self.index.remove(id, interests);
        Ok(slot)
    }

    pub fn get(&self, id: &SubscriberId) -> Result<Arc<SubscriberSlot>> {
        self.slots
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| FeedError::UnknownSubscriber(id.clone()))
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.slots.read().contains_key(id)
    }

    /// Re-index after an interest change. Caller holds the slot lock.
    pub fn reindex(&self, id: &SubscriberId, old: &TagSet, new: &TagSet) {
        self.index.replace(id, old, new);
    }

    /// Slots whose indexed interests share a tag with `tags`.
    ///
    /// The index can lag an in-flight interest change; callers re-check
    /// interests under the slot lock.
    pub fn candidates(&self, tags: &TagSet) -> Vec<Arc<SubscriberSlot>> {
        let ids = self.index.lookup(tags);
        if ids.is_empty() {
            return Vec::new();
        }

        let slots = self.slots.read();
        ids.iter().filter_map(|id| slots.get(id).cloned()).collect()
    }

    pub fn ids(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self.slots.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn slots(&self) -> Vec<Arc<SubscriberSlot>> {
        self.slots.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    pub fn index(&self) -> &TagIndex {
        &self.index
    }
}
