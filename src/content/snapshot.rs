//! Read-only view of the store at a point in time.

use crate::tags::{intersects, Tag, TagSet};
use crate::types::ContentItem;
use std::sync::Arc;

/// Finite, restartable, id-ordered view of the store.
///
/// Items published after the snapshot was taken are not visible through it.
#[derive(Clone, Debug, Default)]
pub struct ContentSnapshot {
    items: Vec<Arc<ContentItem>>,
}

impl ContentSnapshot {
    pub(crate) fn new(items: Vec<Arc<ContentItem>>) -> Self {
        Self { items }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<ContentItem>> {
        self.items.iter()
    }

    /// Items carrying `tag`, in id order.
    pub fn with_tag(&self, tag: Tag) -> impl Iterator<Item = &Arc<ContentItem>> + '_ {
        self.items.iter().filter(move |item| item.has_tag(tag))
    }

    /// Items sharing at least one tag with `interests`, in id order.
    pub fn matching<'a>(
        &'a self,
        interests: &'a TagSet,
    ) -> impl Iterator<Item = &'a Arc<ContentItem>> + 'a {
        self.items
            .iter()
            .filter(move |item| intersects(&item.tags, interests))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Arc<ContentItem>> {
        self.items
    }
}

impl IntoIterator for ContentSnapshot {
    type Item = Arc<ContentItem>;
    type IntoIter = std::vec::IntoIter<Arc<ContentItem>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ContentSnapshot {
    type Item = &'a Arc<ContentItem>;
    type IntoIter = std::slice::Iter<'a, Arc<ContentItem>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
