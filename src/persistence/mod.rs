//! Persistence boundary.
//!
//! The engine issues three kinds of operation against its backing store:
//! read-all on open, append-one for published items and journal entries,
//! and replace-all for a rebuilt timeline (a `TimelineRebuilt` entry carries
//! the complete id list). Backends decide how durable any of it is.

mod file;
mod log;
mod memory;

pub use file::FilePersistence;
pub use log::FrameLog;
pub use memory::MemoryPersistence;

use crate::error::Result;
use crate::tags::TagSet;
use crate::types::{ContentItem, ItemId, SubscriberId, SubscriberSpec};
use serde::{Deserialize, Serialize};

/// Subscriber-side change, replayed in order on open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    /// Participant attached, together with its backfilled timeline.
    Registered {
        spec: SubscriberSpec,
        #[serde(default)]
        items: Vec<ItemId>,
    },

    /// Interest set replaced.
    InterestsChanged {
        subscriber: SubscriberId,
        interests: TagSet,
    },

    /// Participant detached.
    Unregistered { subscriber: SubscriberId },

    /// One item appended by live delivery.
    Delivered {
        subscriber: SubscriberId,
        item: ItemId,
    },

    /// Timeline replaced wholesale (backfill or resync).
    TimelineRebuilt {
        subscriber: SubscriberId,
        items: Vec<ItemId>,
    },
}

impl JournalEntry {
    pub fn subscriber(&self) -> &SubscriberId {
        match self {
            JournalEntry::Registered { spec, .. } => &spec.id,
            JournalEntry::InterestsChanged { subscriber, .. }
            | JournalEntry::Unregistered { subscriber }
            | JournalEntry::Delivered { subscriber, .. }
            | JournalEntry::TimelineRebuilt { subscriber, .. } => subscriber,
        }
    }
}

/// Everything a backend hands back on open.
#[derive(Clone, Debug, Default)]
pub struct Recovered {
    /// Published items in ascending id order.
    pub items: Vec<ContentItem>,

    /// Journal in append order.
    pub journal: Vec<JournalEntry>,
}

/// Backing store for items, subscribers and timelines.
pub trait Persistence: Send + Sync {
    /// Read back everything persisted so far.
    fn load(&self) -> Result<Recovered>;

    /// Persist a newly published item. Called before the item is visible.
    fn append_item(&self, item: &ContentItem) -> Result<()>;

    /// Persist a subscriber-side change. Called before it is applied.
    fn append_journal(&self, entry: &JournalEntry) -> Result<()>;

    /// Flush anything buffered.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
