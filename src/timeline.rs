//! Per-subscriber ordered, deduplicated view of delivered items.
//!
//! Entries are kept sorted by `(published, id)`. A second index on the
//! content fingerprint enforces that no two entries share a (title, body)
//! pair, and among copies of the same content the one earliest in timeline
//! order always wins, whatever order the copies arrive in. The timeline
//! itself knows nothing about interests; the delivery engine decides what
//! goes in.

use crate::types::{ContentFingerprint, ContentItem, ItemId, Timestamp};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Ordered, deduplicated sequence of items owned by one subscriber.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    /// Entries in timeline order.
    entries: BTreeMap<(Timestamp, ItemId), Arc<ContentItem>>,

    /// Fingerprint -> key of the entry holding that content.
    fingerprints: HashMap<ContentFingerprint, (Timestamp, ItemId)>,

    /// Ids currently present.
    ids: HashSet<ItemId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline from an unordered candidate set.
    ///
    /// Candidates are sorted first, so among duplicates the copy earliest in
    /// timeline order is the one kept.
    pub fn build(candidates: impl IntoIterator<Item = Arc<ContentItem>>) -> Self {
        let mut sorted: Vec<_> = candidates.into_iter().collect();
        sorted.sort_by_key(|item| item.order_key());

        let mut timeline = Self::new();
        for item in sorted {
            timeline.insert(item);
        }
        timeline
    }

    /// Insert an item at its ordered position.
    ///
    /// Returns false (and leaves the timeline untouched) when an entry with
    /// the same (title, body) sorts at or before it. An entry with the same
    /// content that sorts after it is displaced.
    pub fn insert(&mut self, item: Arc<ContentItem>) -> bool {
        let fingerprint = item.fingerprint();
        let key = item.order_key();

        if let Some(&existing) = self.fingerprints.get(&fingerprint) {
            if existing <= key {
                return false;
            }
            self.entries.remove(&existing);
            self.ids.remove(&existing.1);
        }

        self.fingerprints.insert(fingerprint, key);
        self.ids.insert(item.id);
        self.entries.insert(key, item);
        true
    }

    /// Would inserting this item be rejected as a duplicate?
    pub fn holds_content_of(&self, item: &ContentItem) -> bool {
        self.fingerprints
            .get(&item.fingerprint())
            .is_some_and(|existing| *existing <= item.order_key())
    }

    /// Swap in a freshly built timeline.
    pub fn replace(&mut self, other: Timeline) {
        *self = other;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.fingerprints.clear();
        self.ids.clear();
    }

    /// Items in timeline order.
    pub fn items(&self) -> Vec<Arc<ContentItem>> {
        self.entries.values().cloned().collect()
    }

    /// Item ids in timeline order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.entries.keys().map(|(_, id)| *id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ContentItem>> + '_ {
        self.entries.values()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{Tag, TagSet};

    fn item(id: u64, ts: i64, title: &str, body: &str) -> Arc<ContentItem> {
        Arc::new(ContentItem {
            id: ItemId(id),
            author: "author".into(),
            title: title.into(),
            body: body.into(),
            published: Timestamp(ts),
            tags: [Tag::Art].into_iter().collect::<TagSet>(),
        })
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut timeline = Timeline::new();
        assert!(timeline.insert(item(3, 30, "c", "c")));
        assert!(timeline.insert(item(1, 10, "a", "a")));
        assert!(timeline.insert(item(2, 20, "b", "b")));

        assert_eq!(timeline.ids(), vec![ItemId(1), ItemId(2), ItemId(3)]);
    }

    #[test]
    fn test_equal_timestamps_ordered_by_id() {
        let mut timeline = Timeline::new();
        timeline.insert(item(9, 5, "x", "1"));
        timeline.insert(item(4, 5, "y", "2"));
        timeline.insert(item(6, 5, "z", "3"));

        assert_eq!(timeline.ids(), vec![ItemId(4), ItemId(6), ItemId(9)]);
    }

    #[test]
    fn test_duplicate_content_rejected() {
        let mut timeline = Timeline::new();
        assert!(timeline.insert(item(1, 10, "same", "text")));
        assert!(!timeline.insert(item(2, 20, "same", "text")));

        assert_eq!(timeline.len(), 1);
        assert!(timeline.contains(ItemId(1)));
        assert!(!timeline.contains(ItemId(2)));
    }

    #[test]
    fn test_earlier_copy_displaces_later_one() {
        let mut timeline = Timeline::new();
        assert!(timeline.insert(item(3, 30, "other", "text")));
        assert!(timeline.insert(item(2, 20, "same", "text")));
        assert!(timeline.holds_content_of(&item(4, 40, "same", "text")));
        assert!(!timeline.holds_content_of(&item(1, 10, "same", "text")));

        // Arrives late but sorts first: it takes the slot.
        assert!(timeline.insert(item(1, 10, "same", "text")));
        assert_eq!(timeline.ids(), vec![ItemId(1), ItemId(3)]);
        assert!(timeline.contains(ItemId(1)));
        assert!(!timeline.contains(ItemId(2)));

        // Ties on timestamp fall back to the id.
        assert!(!timeline.insert(item(5, 10, "same", "text")));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_arrival_order_does_not_change_result() {
        let a = item(1, 10, "dup", "x");
        let b = item(2, 20, "dup", "x");
        let c = item(3, 20, "solo", "y");

        let mut forward = Timeline::new();
        for p in [&a, &b, &c] {
            forward.insert(Arc::clone(p));
        }
        let mut backward = Timeline::new();
        for p in [&c, &b, &a] {
            backward.insert(Arc::clone(p));
        }

        assert_eq!(forward.ids(), backward.ids());
        assert_eq!(forward.ids(), Timeline::build(vec![b, c, a]).ids());
    }

    #[test]
    fn test_contains_tracks_clear_and_replace() {
        let mut timeline = Timeline::build(vec![item(1, 1, "a", "a"), item(2, 2, "b", "b")]);
        assert!(timeline.contains(ItemId(1)));
        assert!(timeline.contains(ItemId(2)));
        assert!(!timeline.contains(ItemId(3)));

        timeline.replace(Timeline::build(vec![item(3, 3, "c", "c")]));
        assert!(!timeline.contains(ItemId(1)));
        assert!(timeline.contains(ItemId(3)));

        timeline.clear();
        assert!(!timeline.contains(ItemId(3)));
    }

    #[test]
    fn test_build_keeps_earliest_duplicate() {
        let timeline = Timeline::build(vec![
            item(5, 50, "dup", "body"),
            item(2, 20, "dup", "body"),
            item(3, 30, "other", "body"),
        ]);

        assert_eq!(timeline.ids(), vec![ItemId(2), ItemId(3)]);
    }

    #[test]
    fn test_build_collapses_same_item_seen_twice() {
        let p = item(1, 10, "t", "b");
        let timeline = Timeline::build(vec![Arc::clone(&p), p]);
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_clear_and_replace() {
        let mut timeline = Timeline::build(vec![item(1, 1, "a", "a")]);
        timeline.clear();
        assert!(timeline.is_empty());
        // Fingerprint index is cleared too.
        assert!(timeline.insert(item(1, 1, "a", "a")));

        timeline.replace(Timeline::build(vec![item(2, 2, "b", "b")]));
        assert_eq!(timeline.ids(), vec![ItemId(2)]);
        assert!(!timeline.holds_content_of(&item(1, 1, "a", "a")));
    }
}
