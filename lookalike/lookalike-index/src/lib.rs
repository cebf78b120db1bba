//! Approximate nearest-neighbor index for item feature vectors.
//!
//! - HNSW graph in cosine space (instant-distance)
//! - Batch construction from the full item set, no incremental updates
//! - Two-artifact persistence: graph plus raw data points
//! - Read-only k-NN queries, shareable across tasks
//!
//! # Example
//!
//! ```no_run
//! use lookalike_core::{IndexConfig, ItemId};
//! use lookalike_index::{HnswIndex, IndexFiles, NeighborIndex};
//! use std::path::Path;
//!
//! # async fn example() -> lookalike_index::Result<()> {
//! let files = IndexFiles::new(Path::new("data/index"), "index.bin");
//! let index = if HnswIndex::exists(&files).await? {
//!     HnswIndex::load(&files).await?
//! } else {
//!     let items = vec![(ItemId::Numeric(1), vec![1.0, 0.0]), (ItemId::Numeric(2), vec![0.0, 1.0])];
//!     let index = HnswIndex::build(IndexConfig::default(), items)?;
//!     index.save(&files).await?;
//!     index
//! };
//!
//! for hit in index.search(&[1.0, 0.1], 2).await? {
//!     println!("{}: {:.4}", hit.id, hit.distance);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod index;
pub mod persist;

pub use error::{IndexError, Result};
pub use index::{HnswIndex, IndexHit, IndexStats, NeighborIndex, cosine_distance};
pub use persist::{INDEX_FORMAT_VERSION, INDEX_MAGIC, IndexFiles};
