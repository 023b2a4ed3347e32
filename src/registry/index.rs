//! Inverted index from tag to interested subscribers.

use crate::tags::{Tag, TagSet};
use crate::types::SubscriberId;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Tag -> subscribers whose interests include it.
#[derive(Debug, Default)]
pub struct TagIndex {
    entries: RwLock<HashMap<Tag, HashSet<SubscriberId>>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: &SubscriberId, interests: &TagSet) {
        let mut entries = self.entries.write();
        for tag in interests {
            entries.entry(*tag).or_default().insert(id.clone());
        }
    }

    pub fn remove(&self, id: &SubscriberId, interests: &TagSet) {
        let mut entries = self.entries.write();
        for tag in interests {
            if let Some(set) = entries.get_mut(tag) {
                set.remove(id);
                if set.is_empty() {
                    entries.remove(tag);
                }
            }
        }
    }

    /// Move a subscriber from `old` interests to `new` ones.
    pub fn replace(&self, id: &SubscriberId, old: &TagSet, new: &TagSet) {
        let mut entries = self.entries.write();

        for tag in old.difference(new) {
            if let Some(set) = entries.get_mut(tag) {
                set.remove(id);
                if set.is_empty() {
                    entries.remove(tag);
                }
            }
        }

        for tag in new.difference(old) {
            entries.entry(*tag).or_default().insert(id.clone());
        }
    }

    /// Union of subscribers interested in any of `tags`. Each subscriber
    /// appears once however many tags it matches.
    pub fn lookup(&self, tags: &TagSet) -> HashSet<SubscriberId> {
        let entries = self.entries.read();
        let mut matched = HashSet::new();
        for tag in tags {
            if let Some(set) = entries.get(tag) {
                matched.extend(set.iter().cloned());
            }
        }
        matched
    }

    /// Number of subscribers indexed under `tag`.
    pub fn count(&self, tag: Tag) -> usize {
        self.entries.read().get(&tag).map_or(0, HashSet::len)
    }
}
