//! Main Feed struct tying all components together.

use crate::content::{ContentSnapshot, ContentStore};
use crate::delivery::{DeliveryEngine, DeliveryReport};
use crate::error::{FeedError, Result};
use crate::events::{EventBus, ListenerConfig, ListenerHandle, ListenerId};
use crate::persistence::{FilePersistence, JournalEntry, MemoryPersistence, Persistence};
use crate::registry::{SubscriberRegistry, SubscriberSlot, SubscriberState, SubscriberView};
use crate::tags::{Tag, TagSet};
use crate::timeline::Timeline;
use crate::types::{
    ContentInput, ContentItem, FeedStats, ItemId, Role, SubscriberId, SubscriberSpec,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Feed configuration.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Directory for durable state (None = in-memory only).
    pub path: Option<PathBuf>,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Fan-outs with at least this many candidate subscribers run on
    /// worker threads.
    pub parallel_fanout_threshold: usize,

    /// Upper bound on worker threads for one fan-out.
    pub max_delivery_workers: usize,

    /// Sync logs every N appends.
    pub sync_interval: u64,

    /// Buffer size for listeners created with `listen_default`.
    pub event_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            parallel_fanout_threshold: 64,
            max_delivery_workers: 4,
            sync_interval: 1,
            event_buffer_size: 1000,
        }
    }
}

impl FeedConfig {
    /// Durable feed rooted at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// A newly published item and where it went.
#[derive(Clone, Debug)]
pub struct Published {
    pub item: Arc<ContentItem>,
    pub report: DeliveryReport,
}

/// The feed engine.
///
/// Provides a unified interface for:
/// - Publishing items and fanning them out
/// - Attaching, detaching and re-targeting subscribers
/// - Reading timelines and the content store
pub struct Feed {
    config: FeedConfig,

    persistence: Arc<dyn Persistence>,

    store: Arc<ContentStore>,

    registry: Arc<SubscriberRegistry>,

    engine: DeliveryEngine,

    events: Arc<EventBus>,

    /// Serializes register/unregister so the journal never records a
    /// membership change that was then rejected.
    membership: Mutex<()>,
}

impl Feed {
    /// Open a feed as described by `config`.
    pub fn open(config: FeedConfig) -> Result<Self> {
        let persistence: Arc<dyn Persistence> = match &config.path {
            None => Arc::new(MemoryPersistence::new()),
            Some(path) if config.create_if_missing => {
                Arc::new(FilePersistence::open_or_create(path, config.sync_interval)?)
            }
            Some(path) => Arc::new(FilePersistence::open(path, config.sync_interval)?),
        };
        Self::with_persistence(config, persistence)
    }

    /// In-memory feed with default settings.
    pub fn in_memory() -> Self {
        let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
        Self::assemble(FeedConfig::default(), persistence)
    }

    /// Open a feed on an explicit backend, replaying whatever it holds.
    pub fn with_persistence(config: FeedConfig, persistence: Arc<dyn Persistence>) -> Result<Self> {
        let recovered = persistence.load()?;
        let feed = Self::assemble(config, persistence);

        let item_count = recovered.items.len();
        let journal_len = recovered.journal.len();
        feed.store.restore(recovered.items)?;
        for entry in recovered.journal {
            feed.replay(entry)?;
        }

        if item_count > 0 || journal_len > 0 {
            tracing::info!(
                items = item_count,
                journal = journal_len,
                subscribers = feed.registry.len(),
                "recovered feed"
            );
        }

        Ok(feed)
    }

    fn assemble(config: FeedConfig, persistence: Arc<dyn Persistence>) -> Self {
        let store = Arc::new(ContentStore::new(Arc::clone(&persistence)));
        let registry = Arc::new(SubscriberRegistry::new());
        let events = Arc::new(EventBus::new());
        let engine = DeliveryEngine::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&persistence),
            Arc::clone(&events),
        )
        .with_parallelism(config.parallel_fanout_threshold, config.max_delivery_workers);

        Self {
            config,
            persistence,
            store,
            registry,
            engine,
            events,
            membership: Mutex::new(()),
        }
    }

    /// Apply one journal entry without re-journaling it.
    fn replay(&self, entry: JournalEntry) -> Result<()> {
        match entry {
            JournalEntry::Registered { spec, items } => {
                let slot = Arc::new(SubscriberSlot::new(spec));
                let mut state = slot.lock();
                state.timeline = self.replay_timeline(items)?;
                self.registry
                    .insert(Arc::clone(&slot), &state.interests)
                    .map_err(|e| FeedError::Corruption(format!("journal replay: {}", e)))?;
            }
            JournalEntry::InterestsChanged {
                subscriber,
                interests,
            } => {
                let slot = self.replay_slot(&subscriber)?;
                let mut state = slot.lock();
                let old = std::mem::replace(&mut state.interests, interests);
                self.registry.reindex(&subscriber, &old, &state.interests);
            }
            JournalEntry::Unregistered { subscriber } => {
                let slot = self.replay_slot(&subscriber)?;
                let interests = slot.lock().interests.clone();
                self.registry.remove(&subscriber, &interests)?;
            }
            JournalEntry::Delivered { subscriber, item } => {
                let slot = self.replay_slot(&subscriber)?;
                let item = self.replay_item(item)?;
                slot.lock().timeline.insert(item);
            }
            JournalEntry::TimelineRebuilt { subscriber, items } => {
                let slot = self.replay_slot(&subscriber)?;
                let timeline = self.replay_timeline(items)?;
                slot.lock().timeline.replace(timeline);
            }
        }
        Ok(())
    }

    fn replay_slot(&self, id: &SubscriberId) -> Result<Arc<SubscriberSlot>> {
        self.registry.get(id).map_err(|_| {
            FeedError::Corruption(format!("journal references unknown subscriber {}", id))
        })
    }

    fn replay_item(&self, id: ItemId) -> Result<Arc<ContentItem>> {
        self.store
            .get(id)
            .ok_or_else(|| FeedError::Corruption(format!("journal references unknown item {}", id)))
    }

    fn replay_timeline(&self, items: Vec<ItemId>) -> Result<Timeline> {
        let items = items
            .into_iter()
            .map(|id| self.replay_item(id))
            .collect::<Result<Vec<_>>>()?;
        Ok(Timeline::build(items))
    }

    // --- Publishing ---

    /// Store a new item and deliver it to every interested reader.
    pub fn publish(&self, input: ContentInput) -> Result<Published> {
        let item = self.store.publish(input)?;
        self.events.published(&item);
        let report = self.engine.deliver(&item);
        Ok(Published { item, report })
    }

    /// Publish on behalf of a registered journalist, who becomes the author.
    pub fn publish_as(
        &self,
        journalist: &SubscriberId,
        title: impl Into<String>,
        body: impl Into<String>,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Result<Published> {
        let slot = self.registry.get(journalist)?;
        if slot.role() != Role::Journalist {
            return Err(FeedError::RoleMismatch {
                id: journalist.clone(),
                expected: Role::Journalist,
            });
        }

        self.publish(ContentInput::new(journalist.as_str(), title, body, tags))
    }

    // --- Subscriptions ---

    /// Attach a participant. Readers are backfilled before any live
    /// delivery can reach them.
    ///
    /// Registration and the initial timeline are journaled as one entry, so
    /// a failed write leaves no subscriber behind.
    pub fn register(&self, spec: SubscriberSpec) -> Result<SubscriberView> {
        let _membership = self.membership.lock();
        self.registry.ensure_absent(&spec.id)?;

        let slot = Arc::new(SubscriberSlot::new(spec.clone()));
        {
            let mut state = slot.lock();

            // Index first, then scan: a publish the scan misses finds the
            // slot in the index and waits for this lock.
            self.registry.insert(Arc::clone(&slot), &state.interests)?;
            let timeline = self.engine.scan_locked(&slot, &state);

            let entry = JournalEntry::Registered {
                spec,
                items: timeline.ids(),
            };
            if let Err(e) = self.persistence.append_journal(&entry) {
                state.detached = true;
                self.registry.remove(slot.id(), &state.interests)?;
                return Err(e);
            }

            let len = timeline.len();
            state.timeline = timeline;
            if len > 0 {
                self.events.rebuilt(slot.id(), len);
            }
        }

        tracing::debug!(subscriber = %slot.id(), role = ?slot.role(), "registered subscriber");
        Ok(slot.view())
    }

    /// Detach a participant and forget its timeline.
    pub fn unregister(&self, id: &SubscriberId) -> Result<()> {
        let _membership = self.membership.lock();
        let slot = self.registry.get(id)?;
        let mut state = slot.lock();
        self.detach_locked(&slot, &mut state)?;
        drop(state);

        self.events.removed(id);
        tracing::debug!(subscriber = %id, "unregistered subscriber");
        Ok(())
    }

    /// Journal the removal and retire the slot. Anyone still holding the
    /// slot sees `detached` once they get the lock.
    fn detach_locked(&self, slot: &SubscriberSlot, state: &mut SubscriberState) -> Result<()> {
        self.persistence.append_journal(&JournalEntry::Unregistered {
            subscriber: slot.id().clone(),
        })?;
        self.registry.remove(slot.id(), &state.interests)?;

        state.detached = true;
        state.interests.clear();
        state.timeline.clear();
        Ok(())
    }

    /// Replace a reader's interests and rebuild its timeline.
    pub fn set_interests(
        &self,
        id: &SubscriberId,
        interests: impl IntoIterator<Item = Tag>,
    ) -> Result<SubscriberView> {
        let interests: TagSet = interests.into_iter().collect();
        let slot = self.registry.get(id)?;
        if !slot.is_reader() {
            return Err(FeedError::RoleMismatch {
                id: id.clone(),
                expected: Role::Reader,
            });
        }

        {
            let mut state = slot.lock();

            // Detached while we waited for the lock.
            if state.detached {
                return Err(FeedError::UnknownSubscriber(id.clone()));
            }

            self.persistence
                .append_journal(&JournalEntry::InterestsChanged {
                    subscriber: id.clone(),
                    interests: interests.clone(),
                })?;

            let old = std::mem::replace(&mut state.interests, interests);
            // Index first, then rebuild: a publish that missed the new
            // index entry is already in the store the rebuild scans.
            self.registry.reindex(id, &old, &state.interests);
            self.engine.resync_locked(&slot, &mut state)?;
        }

        Ok(slot.view())
    }

    /// Populate a reader's timeline if it is still empty.
    pub fn backfill(&self, id: &SubscriberId) -> Result<bool> {
        self.engine.backfill(id)
    }

    /// Rebuild a reader's timeline from the whole store.
    pub fn resync(&self, id: &SubscriberId) -> Result<usize> {
        self.engine.resync(id)
    }

    pub fn subscriber(&self, id: &SubscriberId) -> Result<SubscriberView> {
        Ok(self.registry.get(id)?.view())
    }

    pub fn subscribers(&self) -> Vec<SubscriberId> {
        self.registry.ids()
    }

    // --- Reads ---

    /// A subscriber's timeline, oldest first.
    pub fn timeline(&self, id: &SubscriberId) -> Result<Vec<Arc<ContentItem>>> {
        Ok(self.registry.get(id)?.lock().timeline.items())
    }

    pub fn all_items(&self) -> ContentSnapshot {
        self.store.all_items()
    }

    pub fn items_with_tag(&self, tag: Tag) -> Vec<Arc<ContentItem>> {
        self.store.items_with_tag(tag)
    }

    pub fn item(&self, id: ItemId) -> Option<Arc<ContentItem>> {
        self.store.get(id)
    }

    /// Readers whose current interests match `item`.
    pub fn matching_subscribers(&self, item: &ContentItem) -> Vec<SubscriberId> {
        self.engine.matching_subscribers(item)
    }

    // --- Events ---

    pub fn listen(&self, config: ListenerConfig) -> ListenerHandle {
        self.events.listen(config)
    }

    /// Listener for every event, with the configured buffer size.
    pub fn listen_default(&self) -> ListenerHandle {
        self.events.listen(ListenerConfig {
            buffer_size: self.config.event_buffer_size,
            ..Default::default()
        })
    }

    pub fn unlisten(&self, id: ListenerId) {
        self.events.unlisten(id)
    }

    // --- Housekeeping ---

    pub fn stats(&self) -> FeedStats {
        let mut stats = FeedStats {
            item_count: self.store.len() as u64,
            ..Default::default()
        };
        for slot in self.registry.slots() {
            stats.subscriber_count += 1;
            if slot.is_reader() {
                stats.reader_count += 1;
            }
            stats.timeline_entries += slot.lock().timeline.len() as u64;
        }
        stats
    }

    /// Force pending writes to the backing store.
    pub fn sync(&self) -> Result<()> {
        self.persistence.sync()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}
