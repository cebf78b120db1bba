//! Error types for neighbor computation.

use lookalike_core::{ItemId, LookalikeError};
use lookalike_index::IndexError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NeighborError>;

#[derive(Debug, Error)]
pub enum NeighborError {
    #[error(transparent)]
    Store(#[from] LookalikeError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Neighbors not computed yet for item {0}")]
    NotComputed(ItemId),
}
