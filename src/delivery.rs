//! Delivery engine.
//!
//! Three operations move items into timelines:
//! - `deliver`: live fan-out of one newly published item
//! - `backfill`: populate an empty timeline from the whole store
//! - `resync`: unconditionally rebuild a timeline from the whole store
//!
//! Every timeline mutation happens under the subscriber's slot lock and is
//! journaled before it is applied, so each timeline moves from one
//! consistent state to the next or not at all. Deliveries to different
//! subscribers are independent; a failure for one does not undo another.

use crate::content::ContentStore;
use crate::error::{FeedError, Result};
use crate::events::EventBus;
use crate::persistence::{JournalEntry, Persistence};
use crate::registry::{SubscriberRegistry, SubscriberSlot, SubscriberState};
use crate::tags::intersects;
use crate::timeline::Timeline;
use crate::types::{ContentItem, ItemId, SubscriberId};
use crossbeam_channel::unbounded;
use std::sync::Arc;

/// What happened for one subscriber during live delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Appended to the timeline.
    Delivered,
    /// The timeline already holds an item with the same title and body.
    Duplicate,
    /// Interests changed, or the subscriber left, since the index was
    /// consulted.
    NotMatched,
}

/// Result of fanning one item out.
#[derive(Clone, Debug, Default)]
pub struct DeliveryReport {
    pub item: ItemId,
    /// Subscribers whose timeline received the item, sorted.
    pub delivered: Vec<SubscriberId>,
    /// Subscribers that matched but already held the same content, sorted.
    pub duplicates: Vec<SubscriberId>,
    /// Subscribers whose delivery could not be journaled.
    pub failed: Vec<(SubscriberId, String)>,
}

impl DeliveryReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, id: SubscriberId, result: Result<DeliveryOutcome>) {
        match result {
            Ok(DeliveryOutcome::Delivered) => self.delivered.push(id),
            Ok(DeliveryOutcome::Duplicate) => self.duplicates.push(id),
            Ok(DeliveryOutcome::NotMatched) => {}
            Err(e) => {
                tracing::warn!(subscriber = %id, error = %e, "delivery failed");
                self.failed.push((id, e.to_string()));
            }
        }
    }

    fn finish(mut self) -> Self {
        self.delivered.sort();
        self.duplicates.sort();
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }
}

/// Computes matching sets and writes timelines.
pub struct DeliveryEngine {
    store: Arc<ContentStore>,
    registry: Arc<SubscriberRegistry>,
    persistence: Arc<dyn Persistence>,
    events: Arc<EventBus>,

    /// Fan-outs with at least this many candidates run on worker threads.
    parallel_threshold: usize,

    /// Upper bound on worker threads for one fan-out.
    max_workers: usize,
}

impl DeliveryEngine {
    pub fn new(
        store: Arc<ContentStore>,
        registry: Arc<SubscriberRegistry>,
        persistence: Arc<dyn Persistence>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            registry,
            persistence,
            events,
            parallel_threshold: 64,
            max_workers: 4,
        }
    }

    pub fn with_parallelism(mut self, threshold: usize, max_workers: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self.max_workers = max_workers.max(1);
        self
    }

    /// Subscribers whose current interests intersect the item's tags, sorted.
    pub fn matching_subscribers(&self, item: &ContentItem) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self
            .registry
            .candidates(&item.tags)
            .into_iter()
            .filter(|slot| slot.is_reader() && intersects(&item.tags, &slot.lock().interests))
            .map(|slot| slot.id().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Fan a stored item out to every matching subscriber.
    pub fn deliver(&self, item: &Arc<ContentItem>) -> DeliveryReport {
        let candidates = self.registry.candidates(&item.tags);
        let mut report = DeliveryReport {
            item: item.id,
            ..Default::default()
        };

        let workers = self.max_workers.min(candidates.len());
        if candidates.len() >= self.parallel_threshold && workers > 1 {
            self.deliver_parallel(item, candidates, workers, &mut report);
        } else {
            for slot in candidates {
                let result = self.deliver_to(&slot, item);
                report.record(slot.id().clone(), result);
            }
        }

        tracing::debug!(
            item = %item.id,
            delivered = report.delivered.len(),
            duplicates = report.duplicates.len(),
            failed = report.failed.len(),
            "fan-out complete"
        );

        report.finish()
    }

    fn deliver_parallel(
        &self,
        item: &Arc<ContentItem>,
        candidates: Vec<Arc<SubscriberSlot>>,
        workers: usize,
        report: &mut DeliveryReport,
    ) {
        let (work_tx, work_rx) = unbounded::<Arc<SubscriberSlot>>();
        let (done_tx, done_rx) = unbounded();

        for slot in candidates {
            let _ = work_tx.send(slot);
        }
        drop(work_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move || {
                    for slot in work_rx.iter() {
                        let result = self.deliver_to(&slot, item);
                        let _ = done_tx.send((slot.id().clone(), result));
                    }
                });
            }
        });
        drop(done_tx);

        for (id, result) in done_rx.iter() {
            report.record(id, result);
        }
    }

    /// Append one item to one subscriber's timeline.
    fn deliver_to(&self, slot: &SubscriberSlot, item: &Arc<ContentItem>) -> Result<DeliveryOutcome> {
        let mut state = slot.lock();

        if state.detached || !slot.is_reader() || !intersects(&item.tags, &state.interests) {
            return Ok(DeliveryOutcome::NotMatched);
        }
        // A later copy of the same content is displaced by the insert below.
        if state.timeline.holds_content_of(item) {
            return Ok(DeliveryOutcome::Duplicate);
        }

        self.persistence.append_journal(&JournalEntry::Delivered {
            subscriber: slot.id().clone(),
            item: item.id,
        })?;
        state.timeline.insert(Arc::clone(item));

        self.events.delivered(slot.id(), item.id);
        Ok(DeliveryOutcome::Delivered)
    }

    /// Populate an empty timeline from the whole store.
    ///
    /// Returns false without doing anything if the timeline already has
    /// entries.
    pub fn backfill(&self, id: &SubscriberId) -> Result<bool> {
        let slot = self.registry.get(id)?;
        let mut state = slot.lock();
        self.backfill_locked(&slot, &mut state)
    }

    /// Rebuild a timeline from scratch with the subscriber's current
    /// interests. Returns the new length.
    pub fn resync(&self, id: &SubscriberId) -> Result<usize> {
        let slot = self.registry.get(id)?;
        let mut state = slot.lock();
        self.resync_locked(&slot, &mut state)
    }

    pub(crate) fn backfill_locked(
        &self,
        slot: &SubscriberSlot,
        state: &mut SubscriberState,
    ) -> Result<bool> {
        ensure_attached(slot, state)?;
        if !state.timeline.is_empty() {
            return Ok(false);
        }

        let len = self.rebuild_locked(slot, state)?;
        tracing::debug!(subscriber = %slot.id(), len, "backfilled timeline");
        Ok(true)
    }

    pub(crate) fn resync_locked(
        &self,
        slot: &SubscriberSlot,
        state: &mut SubscriberState,
    ) -> Result<usize> {
        ensure_attached(slot, state)?;
        let len = self.rebuild_locked(slot, state)?;
        tracing::debug!(subscriber = %slot.id(), len, "resynced timeline");
        Ok(len)
    }

    /// Timeline the subscriber would hold if built from the store now.
    ///
    /// Taken while the slot lock is held, so any item published after the
    /// snapshot is delivered live once the lock is released, and any item
    /// in both is collapsed by the fingerprint check.
    pub(crate) fn scan_locked(&self, slot: &SubscriberSlot, state: &SubscriberState) -> Timeline {
        if !slot.is_reader() {
            return Timeline::new();
        }
        let snapshot = self.store.all_items();
        Timeline::build(snapshot.matching(&state.interests).cloned())
    }

    /// Scan the store with the current interests and swap the result in.
    fn rebuild_locked(&self, slot: &SubscriberSlot, state: &mut SubscriberState) -> Result<usize> {
        let timeline = self.scan_locked(slot, state);

        if timeline.is_empty() && state.timeline.is_empty() {
            return Ok(0);
        }

        self.persistence
            .append_journal(&JournalEntry::TimelineRebuilt {
                subscriber: slot.id().clone(),
                items: timeline.ids(),
            })?;

        let len = timeline.len();
        state.timeline.replace(timeline);

        self.events.rebuilt(slot.id(), len);
        Ok(len)
    }
}

fn ensure_attached(slot: &SubscriberSlot, state: &SubscriberState) -> Result<()> {
    if state.detached {
        return Err(FeedError::UnknownSubscriber(slot.id().clone()));
    }
    Ok(())
}
