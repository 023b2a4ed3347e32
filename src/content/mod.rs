//! Content store.
//!
//! Published items live in an append-only, id-ordered vector with a
//! per-tag position index. Reads take consistent snapshots, so a scan never
//! observes a half-finished publish.

mod snapshot;
mod store;

pub use snapshot::ContentSnapshot;
pub use store::ContentStore;
