//! Subscriber registry.
//!
//! Holds every registered participant in its own lockable slot and keeps an
//! inverted tag index so that matching a published item costs time in the
//! number of interested subscribers, not the number of registered ones.

mod index;
mod manager;
mod types;

pub use index::TagIndex;
pub use manager::SubscriberRegistry;
pub use types::{SubscriberSlot, SubscriberState, SubscriberView};
