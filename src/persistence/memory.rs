//! In-process backend. Survives only as long as the value itself.

use super::{JournalEntry, Persistence, Recovered};
use crate::error::Result;
use crate::types::ContentItem;
use parking_lot::Mutex;

/// Keeps items and journal in memory.
///
/// Sharing one instance (behind an `Arc`) between successive feeds lets a
/// later feed recover what an earlier one wrote.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    items: Mutex<Vec<ContentItem>>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_count(&self) -> usize {
        self.items.lock().len()
    }

    pub fn journal_len(&self) -> usize {
        self.journal.lock().len()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Recovered> {
        Ok(Recovered {
            items: self.items.lock().clone(),
            journal: self.journal.lock().clone(),
        })
    }

    fn append_item(&self, item: &ContentItem) -> Result<()> {
        self.items.lock().push(item.clone());
        Ok(())
    }

    fn append_journal(&self, entry: &JournalEntry) -> Result<()> {
        self.journal.lock().push(entry.clone());
        Ok(())
    }
}
