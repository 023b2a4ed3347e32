//! Directory-backed persistence.
//!
//! Layout:
//! - `MANIFEST`: magic, version, JSON header (creation time, tag catalog)
//! - `LOCK`: exclusive lock held for the lifetime of the backend
//! - `content.log`: one frame per published item
//! - `journal.log`: one frame per subscriber-side change

use super::log::FrameLog;
use super::{JournalEntry, Persistence, Recovered};
use crate::error::{FeedError, Result};
use crate::tags::Tag;
use crate::types::{ContentItem, Timestamp};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the feed manifest.
const FEED_MAGIC: &[u8; 4] = b"TFD\0";

/// Current feed format version.
const FEED_VERSION: u8 = 1;

const CONTENT_MAGIC: [u8; 4] = *b"ITM\0";
const JOURNAL_MAGIC: [u8; 4] = *b"JRN\0";

#[derive(Debug, Serialize, Deserialize)]
struct ManifestHeader {
    created: Timestamp,
    tags: Vec<String>,
}

/// Persistence backed by a directory of append-only logs.
pub struct FilePersistence {
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    content: FrameLog<ContentItem>,

    journal: FrameLog<JournalEntry>,
}

impl FilePersistence {
    /// Open an existing feed directory or create a new one.
    pub fn open_or_create(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref();
        if path.join("MANIFEST").exists() {
            Self::open(path, sync_interval)
        } else {
            Self::create(path, sync_interval)
        }
    }

    /// Create a new feed directory.
    pub fn create(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;
        Self::write_manifest(&path)?;

        Self::with_logs(path, lock_file, sync_interval)
    }

    /// Open an existing feed directory.
    pub fn open(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.join("MANIFEST").exists() {
            return Err(FeedError::NotInitialized);
        }

        let lock_file = Self::acquire_lock(&path)?;
        Self::verify_manifest(&path)?;

        Self::with_logs(path, lock_file, sync_interval)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_logs(path: PathBuf, lock_file: File, sync_interval: u64) -> Result<Self> {
        let content = FrameLog::open(path.join("content.log"), CONTENT_MAGIC, sync_interval)?;
        let journal = FrameLog::open(path.join("journal.log"), JOURNAL_MAGIC, sync_interval)?;

        Ok(Self {
            path,
            _lock_file: lock_file,
            content,
            journal,
        })
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let header = serde_json::to_vec(&ManifestHeader {
            created: Timestamp::now(),
            tags: Tag::catalog().into_iter().map(String::from).collect(),
        })?;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(FEED_MAGIC)?;
        file.write_all(&[FEED_VERSION])?;
        file.write_all(&(header.len() as u32).to_le_bytes())?;
        file.write_all(&header)?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != FEED_MAGIC {
            return Err(FeedError::InvalidFormat("Invalid feed magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != FEED_VERSION {
            return Err(FeedError::InvalidFormat(format!(
                "Unsupported feed version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)?;
        let mut header = vec![0u8; u32::from_le_bytes(len_bytes) as usize];
        file.read_exact(&mut header)?;

        let header: ManifestHeader = serde_json::from_slice(&header)
            .map_err(|e| FeedError::InvalidFormat(format!("Unreadable manifest: {}", e)))?;

        // Items written under an older catalog must still parse.
        for name in &header.tags {
            if name.parse::<Tag>().is_err() {
                return Err(FeedError::InvalidFormat(format!(
                    "Feed uses tag `{}` which is no longer in the catalog",
                    name
                )));
            }
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| FeedError::Locked)?;

        Ok(lock_file)
    }
}

impl Persistence for FilePersistence {
    fn load(&self) -> Result<Recovered> {
        Ok(Recovered {
            items: self.content.read_all()?,
            journal: self.journal.read_all()?,
        })
    }

    fn append_item(&self, item: &ContentItem) -> Result<()> {
        self.content.append(item)
    }

    fn append_journal(&self, entry: &JournalEntry) -> Result<()> {
        self.journal.append(entry)
    }

    fn sync(&self) -> Result<()> {
        self.content.sync()?;
        self.journal.sync()
    }
}

impl std::fmt::Debug for FilePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePersistence")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for FilePersistence {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}
