//! In-process change notifications.
//!
//! Listeners learn that an item was published or that a timeline changed,
//! so a caching presentation layer knows when to pull again:
//! - Publishes
//! - Live deliveries
//! - Backfills and resyncs
//! - Detached subscribers
//!
//! Buffers are bounded; a listener that falls behind is dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = feed.listen(ListenerConfig {
//!     filter: EventFilter::timelines(vec!["alice".into()]),
//!     ..Default::default()
//! });
//!
//! while let Ok(event) = handle.recv() {
//!     match event {
//!         FeedEvent::Delivered { .. } | FeedEvent::TimelineRebuilt { .. } => refresh(),
//!         FeedEvent::Dropped { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{
    DropReason, EventFilter, FeedEvent, ItemSummary, ListenerConfig, ListenerHandle, ListenerId,
};
