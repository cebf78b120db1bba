//! Per-item similar-product computation.
//!
//! Ties the metadata store, the feature store and the similarity index
//! together: for every item, query its `k + 1` nearest neighbors, drop the
//! self-match, convert distances to truncated similarity scores and store the
//! ranked list in the item's `IBSP` field.
//!
//! # Example
//!
//! ```no_run
//! use lookalike_core::LookalikeConfig;
//! use lookalike_neighbors::NeighborService;
//!
//! # async fn example() -> lookalike_neighbors::Result<()> {
//! let service = NeighborService::from_config(LookalikeConfig::default()).await?;
//! let report = service.compute_for_all().await?;
//! println!("updated {} items", report.items);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod service;
pub mod similarity;

pub use error::{NeighborError, Result};
pub use service::{
    BatchReport, IndexSource, NeighborService, Progress, ProgressCallback, Recommendation,
};
pub use similarity::{distance_to_similarity, rank_neighbors};
