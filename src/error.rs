//! Error types for the feed engine.

use crate::types::{Role, SubscriberId};
use thiserror::Error;

/// Main error type for feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Subscriber already registered: {0}")]
    DuplicateSubscriber(SubscriberId),

    #[error("Subscriber not found: {0}")]
    UnknownSubscriber(SubscriberId),

    #[error("Subscriber {id} does not have the {expected:?} role")]
    RoleMismatch { id: SubscriberId, expected: Role },

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid feed format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Feed is locked by another process")]
    Locked,

    #[error("Feed not initialized")]
    NotInitialized,
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for FeedError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for FeedError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        FeedError::Deserialization(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
