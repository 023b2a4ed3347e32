//! Core types for the feed engine.

use crate::tags::{Tag, TagSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a published item.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn next(self) -> Self {
        ItemId(self.0 + 1)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a registered participant, chosen by the caller.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        SubscriberId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        SubscriberId(s.to_string())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// SHA-256 over an item's (title, body) pair.
///
/// Two items with equal fingerprints are the same content for timeline
/// purposes, whatever their ids, authors, timestamps or tags.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(pub [u8; 32]);

impl ContentFingerprint {
    pub fn of(title: &str, body: &str) -> Self {
        let mut hasher = Sha256::new();
        // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update((title.len() as u64).to_le_bytes());
        hasher.update(title.as_bytes());
        hasher.update(body.as_bytes());
        ContentFingerprint(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}...)", &self.to_hex()[..8])
    }
}

/// Participant kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Carries interests and a timeline.
    Reader,
    /// May publish; never receives deliveries.
    Journalist,
}

/// A published item. Never mutated after the store assigns its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Assigned by the content store.
    pub id: ItemId,

    pub author: String,

    pub title: String,

    pub body: String,

    /// Assigned by the content store at publish time.
    pub published: Timestamp,

    pub tags: TagSet,
}

impl ContentItem {
    /// Timeline sort key: timestamp first, id breaks ties.
    pub fn order_key(&self) -> (Timestamp, ItemId) {
        (self.published, self.id)
    }

    pub fn fingerprint(&self) -> ContentFingerprint {
        ContentFingerprint::of(&self.title, &self.body)
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Input for publishing (before id and timestamp are assigned).
///
/// Fields arrive from a request layer and may be missing; the content store
/// rejects missing title, body or tags.
#[derive(Clone, Debug, Default)]
pub struct ContentInput {
    pub author: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<TagSet>,
}

impl ContentInput {
    /// Fully populated input.
    pub fn new(
        author: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Self {
        Self {
            author: author.into(),
            title: Some(title.into()),
            body: Some(body.into()),
            tags: Some(tags.into_iter().collect()),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags = Some(tags.into_iter().collect());
        self
    }
}

/// Registration request for a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberSpec {
    pub id: SubscriberId,
    pub role: Role,
    pub interests: TagSet,
}

impl SubscriberSpec {
    pub fn reader(id: impl Into<String>, interests: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            id: SubscriberId(id.into()),
            role: Role::Reader,
            interests: interests.into_iter().collect(),
        }
    }

    pub fn journalist(id: impl Into<String>) -> Self {
        Self {
            id: SubscriberId(id.into()),
            role: Role::Journalist,
            interests: TagSet::new(),
        }
    }
}

/// Feed statistics.
#[derive(Clone, Debug, Default)]
pub struct FeedStats {
    pub item_count: u64,
    pub subscriber_count: u64,
    pub reader_count: u64,
    pub timeline_entries: u64,
}
