//! Core types and storage for the Lookalike image recommender.
//!
//! This crate provides:
//! - Item identifiers, metadata records and neighbor entries
//! - The file-based item metadata store (`<ID>.json` per item)
//! - The flat-text feature vector store
//! - Pipeline configuration with TOML loading and environment overrides
//!
//! # Example
//!
//! ```no_run
//! use lookalike_core::prelude::*;
//!
//! # async fn example() -> lookalike_core::Result<()> {
//! let config = LookalikeConfig::default();
//! let store = JsonMetadataStore::open(&config.paths.metadata_dir).await?;
//! let features = TextFeatureStore::new(&config.paths.features_dir, "txt");
//!
//! for record in store.list().await? {
//!     let vector = features.load(&record).await?;
//!     println!("{}: {} dims", record.id, vector.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod metadata;
pub mod types;

pub use config::{GeneralConfig, IndexConfig, LookalikeConfig, NeighborsConfig, PathsConfig};
pub use error::{LookalikeError, Result};
pub use features::{FeatureStore, TextFeatureStore, parse_feature_text};
pub use metadata::{JsonMetadataStore, MetadataStore};
pub use types::{FeatureVector, ItemId, ItemRecord, NeighborEntry};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::LookalikeConfig;
    pub use crate::error::{LookalikeError, Result};
    pub use crate::features::{FeatureStore, TextFeatureStore};
    pub use crate::metadata::{JsonMetadataStore, MetadataStore};
    pub use crate::types::{FeatureVector, ItemId, ItemRecord, NeighborEntry};
}
