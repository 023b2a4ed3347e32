//! Event and listener types.

use crate::tags::TagSet;
use crate::types::{ContentItem, ItemId, SubscriberId};
use serde::{Deserialize, Serialize};

/// Configuration for a listener.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Max buffered events before the listener is dropped.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: EventFilter,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: EventFilter::all(),
        }
    }
}

/// Filter criteria for listeners.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// Only timeline events for these subscribers (None = every subscriber).
    pub subscribers: Option<Vec<SubscriberId>>,

    /// Include publish events.
    pub include_published: bool,

    /// Include delivery, rebuild and removal events.
    pub include_timeline: bool,
}

impl EventFilter {
    /// Everything.
    pub fn all() -> Self {
        Self {
            subscribers: None,
            include_published: true,
            include_timeline: true,
        }
    }

    /// Publish events only.
    pub fn published() -> Self {
        Self {
            include_published: true,
            ..Default::default()
        }
    }

    /// Timeline changes for the given subscribers.
    pub fn timelines(subscribers: Vec<SubscriberId>) -> Self {
        Self {
            subscribers: Some(subscribers),
            include_timeline: true,
            ..Default::default()
        }
    }

    pub(crate) fn wants_subscriber(&self, id: &SubscriberId) -> bool {
        self.include_timeline
            && self
                .subscribers
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|s| s == id))
    }
}

/// Events emitted to listeners.
///
/// These are hints that a timeline changed; the timeline itself is still
/// read through the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A new item entered the content store.
    Published { item: ItemSummary },

    /// An item was appended to a subscriber's timeline.
    Delivered {
        subscriber: SubscriberId,
        item: ItemId,
    },

    /// A timeline was rebuilt by backfill or resync.
    TimelineRebuilt { subscriber: SubscriberId, len: usize },

    /// A subscriber was detached.
    SubscriberRemoved { subscriber: SubscriberId },

    /// The listener was dropped.
    Dropped { reason: DropReason },
}

/// Why a listener was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly removed.
    Unlistened,
}

/// Summary of an item (for events, avoids sending the body).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub author: String,
    pub title: String,
    pub published: i64,
    pub tags: TagSet,
    /// Body size in bytes.
    pub body_size: usize,
}

impl ItemSummary {
    pub fn from_item(item: &ContentItem) -> Self {
        Self {
            id: item.id,
            author: item.author.clone(),
            title: item.title.clone(),
            published: item.published.0,
            tags: item.tags.clone(),
            body_size: item.body.len(),
        }
    }
}

/// Unique identifier for a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle for receiving events.
pub struct ListenerHandle {
    pub id: ListenerId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<FeedEvent>,
}

impl ListenerHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<FeedEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<FeedEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<FeedEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<FeedEvent> {
        self.receiver.try_iter().collect()
    }
}
