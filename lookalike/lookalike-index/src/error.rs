//! Error types for the similarity index.

use lookalike_core::ItemId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid feature vector for item {item}: {reason}")]
    InvalidVector { item: ItemId, reason: String },

    #[error("Invalid query vector: {0}")]
    InvalidQuery(String),

    #[error("Invalid dimension: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot build an index from zero items")]
    EmptyIndex,

    #[error("No persisted index at {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Corrupt index artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
