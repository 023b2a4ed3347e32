//! # Tag Feed
//!
//! A tag-routed fan-out engine: journalists publish tagged items, readers
//! declare interest in tags and each keeps a personal timeline of the items
//! that match.
//!
//! ## Core Concepts
//!
//! - **Tags**: A fixed catalog of topics; items carry some, readers want some
//! - **Content**: Append-only store of every published item
//! - **Timelines**: Per-reader, time-ordered, deduplicated by title and body
//! - **Delivery**: Live fan-out on publish, backfill on attach, resync when
//!   interests change
//!
//! ## Example
//!
//! ```ignore
//! use tagfeed::{ContentInput, Feed, FeedConfig, SubscriberSpec, Tag};
//!
//! let feed = Feed::open(FeedConfig::at("./my-feed"))?;
//!
//! feed.register(SubscriberSpec::reader("alice", [Tag::Sport]))?;
//!
//! // Delivered to alice straight away
//! feed.publish(ContentInput::new("desk", "Final score", "2-1", [Tag::Sport]))?;
//!
//! // Alice's timeline is rebuilt from the whole store
//! feed.set_interests(&"alice".into(), [Tag::Sport, Tag::Music])?;
//! ```

pub mod content;
pub mod delivery;
pub mod error;
pub mod events;
pub mod feed;
pub mod persistence;
pub mod registry;
pub mod tags;
pub mod timeline;
pub mod types;

// Re-exports
pub use content::{ContentSnapshot, ContentStore};
pub use delivery::{DeliveryEngine, DeliveryOutcome, DeliveryReport};
pub use error::{FeedError, Result};
pub use events::{
    DropReason, EventBus, EventFilter, FeedEvent, ItemSummary, ListenerConfig, ListenerHandle,
    ListenerId,
};
pub use feed::{Feed, FeedConfig, Published};
pub use persistence::{
    FilePersistence, FrameLog, JournalEntry, MemoryPersistence, Persistence, Recovered,
};
pub use registry::{SubscriberRegistry, SubscriberSlot, SubscriberState, SubscriberView, TagIndex};
pub use tags::{intersects, parse_tags, tag_set, Tag, TagSet};
pub use timeline::Timeline;
pub use types::*;
