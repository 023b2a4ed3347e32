//! Append-only log of checksummed MessagePack frames.
//!
//! File layout: 4-byte magic, 1-byte version, then frames of
//! `len: u32 LE | payload | crc32(payload): u32 LE`.

use crate::error::{FeedError, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Current frame log format version.
const LOG_VERSION: u8 = 1;

/// Header size (magic + version).
const HEADER_SIZE: u64 = 5;

/// Frames larger than this are treated as corruption.
const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

struct Writer {
    file: File,
    /// Offset of the end of the last complete frame.
    end: u64,
    writes_since_sync: u64,
}

/// Typed append-only log.
pub struct FrameLog<T> {
    path: PathBuf,
    magic: [u8; 4],
    writer: Mutex<Writer>,
    /// Sync every N appends (1 = every append).
    sync_interval: u64,
    _entry: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> FrameLog<T> {
    /// Open or create a log, verifying the header if the file exists.
    pub fn open(path: impl AsRef<Path>, magic: [u8; 4], sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            file.write_all(&magic)?;
            file.write_all(&[LOG_VERSION])?;
            file.sync_all()?;
        } else {
            Self::verify_header(&mut file, &magic)?;
        }

        let end = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path,
            magic,
            writer: Mutex::new(Writer {
                file,
                end,
                writes_since_sync: 0,
            }),
            sync_interval: sync_interval.max(1),
            _entry: PhantomData,
        })
    }

    /// Append one entry.
    pub fn append(&self, entry: &T) -> Result<()> {
        // Named fields: journal entries are internally tagged.
        let encoded = rmp_serde::to_vec_named(entry)?;

        let mut frame = Vec::with_capacity(encoded.len() + 8);
        frame.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        frame.extend_from_slice(&encoded);
        frame.extend_from_slice(&crc32fast::hash(&encoded).to_le_bytes());

        let mut writer = self.writer.lock();
        let end = writer.end;
        writer.file.seek(SeekFrom::Start(end))?;
        writer.file.write_all(&frame)?;
        writer.end = end + frame.len() as u64;

        writer.writes_since_sync += 1;
        if writer.writes_since_sync >= self.sync_interval {
            writer.file.sync_data()?;
            writer.writes_since_sync = 0;
        }

        Ok(())
    }

    /// Read every complete entry in order.
    ///
    /// A frame cut short at the end of the file (crash mid-append) is
    /// dropped and the file truncated back to the last complete frame.
    /// A checksum failure anywhere else is corruption.
    pub fn read_all(&self) -> Result<Vec<T>> {
        let mut writer = self.writer.lock();

        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut entries = Vec::new();
        let mut offset = HEADER_SIZE;

        loop {
            match Self::read_frame(&mut reader)? {
                Frame::Entry(entry, size) => {
                    entries.push(entry);
                    offset += size;
                }
                Frame::End => break,
                Frame::Torn => {
                    tracing::warn!(
                        path = %self.path.display(),
                        offset,
                        "dropping torn frame at end of log"
                    );
                    writer.file.set_len(offset)?;
                    writer.file.sync_all()?;
                    writer.end = offset;
                    break;
                }
            }
        }

        Ok(entries)
    }

    /// Force pending appends to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.sync_all()?;
        writer.writes_since_sync = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn verify_header(file: &mut File, magic: &[u8; 4]) -> Result<()> {
        file.seek(SeekFrom::Start(0))?;

        let mut found = [0u8; 4];
        file.read_exact(&mut found)?;
        if &found != magic {
            return Err(FeedError::InvalidFormat("Invalid log magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != LOG_VERSION {
            return Err(FeedError::InvalidFormat(format!(
                "Unsupported log version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn read_frame(reader: &mut impl Read) -> Result<Frame<T>> {
        let mut len_bytes = [0u8; 4];
        match read_exact_or_eof(reader, &mut len_bytes)? {
            Fill::Empty => return Ok(Frame::End),
            Fill::Partial => return Ok(Frame::Torn),
            Fill::Full => {}
        }
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_FRAME_SIZE {
            return Err(FeedError::Corruption("Frame too large".into()));
        }

        let mut encoded = vec![0u8; len];
        if !matches!(read_exact_or_eof(reader, &mut encoded)?, Fill::Full) {
            return Ok(Frame::Torn);
        }

        let mut checksum_bytes = [0u8; 4];
        if !matches!(read_exact_or_eof(reader, &mut checksum_bytes)?, Fill::Full) {
            return Ok(Frame::Torn);
        }
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(&encoded);
        if stored != computed {
            return Err(FeedError::ChecksumMismatch {
                expected: stored,
                got: computed,
            });
        }

        let entry = rmp_serde::from_slice(&encoded)?;
        Ok(Frame::Entry(entry, (len + 8) as u64))
    }
}

impl<T> std::fmt::Debug for FrameLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLog")
            .field("path", &self.path)
            .field("magic", &self.magic)
            .finish()
    }
}

enum Frame<T> {
    Entry(T, u64),
    End,
    Torn,
}

enum Fill {
    Empty,
    Partial,
    Full,
}

/// Like `read_exact`, but reports how far it got before EOF.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<Fill> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(if filled == buf.len() {
        Fill::Full
    } else if filled == 0 {
        Fill::Empty
    } else {
        Fill::Partial
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    const MAGIC: [u8; 4] = *b"TST\0";

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        n: u32,
        text: String,
    }

    fn entry(n: u32) -> Entry {
        Entry {
            n,
            text: format!("entry {}", n),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let log = FrameLog::<Entry>::open(dir.path().join("a.log"), MAGIC, 1).unwrap();

        for n in 0..3 {
            log.append(&entry(n)).unwrap();
        }

        let entries = log.read_all().unwrap();
        assert_eq!(entries, vec![entry(0), entry(1), entry(2)]);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");

        {
            let log = FrameLog::<Entry>::open(&path, MAGIC, 100).unwrap();
            log.append(&entry(1)).unwrap();
            log.sync().unwrap();
        }

        let log = FrameLog::<Entry>::open(&path, MAGIC, 100).unwrap();
        log.append(&entry(2)).unwrap();
        assert_eq!(log.read_all().unwrap(), vec![entry(1), entry(2)]);
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        FrameLog::<Entry>::open(&path, MAGIC, 1).unwrap();

        let result = FrameLog::<Entry>::open(&path, *b"OTH\0", 1);
        assert!(matches!(result, Err(FeedError::InvalidFormat(_))));
    }

    #[test]
    fn test_torn_tail_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");

        {
            let log = FrameLog::<Entry>::open(&path, MAGIC, 1).unwrap();
            log.append(&entry(1)).unwrap();
            log.append(&entry(2)).unwrap();
        }

        // Chop a few bytes off the last frame.
        let len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();
        drop(file);

        let log = FrameLog::<Entry>::open(&path, MAGIC, 1).unwrap();
        assert_eq!(log.read_all().unwrap(), vec![entry(1)]);

        // Appends land after the last good frame.
        log.append(&entry(3)).unwrap();
        assert_eq!(log.read_all().unwrap(), vec![entry(1), entry(3)]);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");

        {
            let log = FrameLog::<Entry>::open(&path, MAGIC, 1).unwrap();
            log.append(&entry(1)).unwrap();
            log.append(&entry(2)).unwrap();
        }

        // Flip a payload byte of the first frame.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE as usize + 5] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let log = FrameLog::<Entry>::open(&path, MAGIC, 1).unwrap();
        assert!(matches!(
            log.read_all(),
            Err(FeedError::ChecksumMismatch { .. })
        ));
    }
}
