//! Error types for the Lookalike pipeline.

use crate::types::ItemId;
use std::path::PathBuf;

/// Result type alias for Lookalike core operations.
pub type Result<T> = std::result::Result<T, LookalikeError>;

/// Main error type for the metadata store, feature store and configuration.
#[derive(Debug, thiserror::Error)]
pub enum LookalikeError {
    /// Feature vector is missing, unreadable or not numeric
    #[error("Invalid feature vector for item {item}: {reason}")]
    InvalidVector { item: ItemId, reason: String },

    /// Metadata record failed to parse or validate
    #[error("Malformed metadata record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    /// No metadata record for the requested item
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LookalikeError {
    /// Create a new invalid vector error
    pub fn invalid_vector(item: &ItemId, reason: impl Into<String>) -> Self {
        Self::InvalidVector {
            item: item.clone(),
            reason: reason.into(),
        }
    }

    /// Create a new malformed record error
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
