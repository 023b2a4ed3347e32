//! Append-only store of published items.

use super::snapshot::ContentSnapshot;
use crate::error::{FeedError, Result};
use crate::persistence::Persistence;
use crate::tags::{Tag, TagSet};
use crate::types::{ContentInput, ContentItem, ItemId, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    /// Items in ascending id order.
    items: Vec<Arc<ContentItem>>,

    /// Tag -> positions in `items`.
    tag_index: HashMap<Tag, Vec<usize>>,
}

impl Inner {
    fn push(&mut self, item: Arc<ContentItem>) {
        let position = self.items.len();
        for tag in &item.tags {
            self.tag_index.entry(*tag).or_default().push(position);
        }
        self.items.push(item);
    }
}

/// Ordered collection of every published item.
pub struct ContentStore {
    inner: RwLock<Inner>,

    /// Serializes id/timestamp assignment and the persistence append.
    write_lock: Mutex<()>,

    persistence: Arc<dyn Persistence>,
}

impl ContentStore {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            write_lock: Mutex::new(()),
            persistence,
        }
    }

    /// Reload previously persisted items without writing them again.
    ///
    /// Items must arrive in strictly ascending id order.
    pub fn restore(&self, items: Vec<ContentItem>) -> Result<()> {
        let _lock = self.write_lock.lock();
        let mut inner = self.inner.write();

        for item in items {
            if let Some(last) = inner.items.last() {
                if item.id <= last.id {
                    return Err(FeedError::Corruption(format!(
                        "Item {} out of order after {}",
                        item.id, last.id
                    )));
                }
            }
            inner.push(Arc::new(item));
        }

        Ok(())
    }

    /// Validate, stamp, persist and store a new item.
    ///
    /// The id is one past the newest item; the timestamp is the current
    /// time, never earlier than the newest item's.
    pub fn publish(&self, input: ContentInput) -> Result<Arc<ContentItem>> {
        let (title, body, tags) = Self::validate(input.title, input.body, input.tags)?;

        let _lock = self.write_lock.lock();

        let (id, published) = {
            let inner = self.inner.read();
            match inner.items.last() {
                Some(last) => (last.id.next(), Timestamp::now().max(last.published)),
                None => (ItemId(1), Timestamp::now()),
            }
        };

        let item = ContentItem {
            id,
            author: input.author,
            title,
            body,
            published,
            tags,
        };

        self.persistence.append_item(&item)?;

        let item = Arc::new(item);
        self.inner.write().push(Arc::clone(&item));

        tracing::debug!(item = %item.id, tags = item.tags.len(), "published item");

        Ok(item)
    }

    fn validate(
        title: Option<String>,
        body: Option<String>,
        tags: Option<TagSet>,
    ) -> Result<(String, String, TagSet)> {
        let title = title.ok_or_else(|| FeedError::InvalidContent("missing title".into()))?;
        let body = body.ok_or_else(|| FeedError::InvalidContent("missing body".into()))?;
        let tags = tags.ok_or_else(|| FeedError::InvalidContent("missing tag set".into()))?;
        Ok((title, body, tags))
    }

    /// Snapshot of every item in ascending id order.
    pub fn all_items(&self) -> ContentSnapshot {
        ContentSnapshot::new(self.inner.read().items.clone())
    }

    /// Items carrying `tag`, in ascending id order.
    pub fn items_with_tag(&self, tag: Tag) -> Vec<Arc<ContentItem>> {
        let inner = self.inner.read();
        inner
            .tag_index
            .get(&tag)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&p| Arc::clone(&inner.items[p]))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Look up an item by id.
    pub fn get(&self, id: ItemId) -> Option<Arc<ContentItem>> {
        let inner = self.inner.read();
        inner
            .items
            .binary_search_by_key(&id, |item| item.id)
            .ok()
            .map(|p| Arc::clone(&inner.items[p]))
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }
}
