//! Neighbor computation service.
//!
//! Orchestrates the batch: build the index if none is persisted (otherwise
//! reload it), then query it for every item and write the ranked neighbor
//! list back into the item's metadata record.

use crate::error::{NeighborError, Result};
use crate::similarity::rank_neighbors;
use futures::stream::{self, TryStreamExt};
use lookalike_core::{
    FeatureStore, ItemId, ItemRecord, JsonMetadataStore, LookalikeConfig, LookalikeError,
    MetadataStore, NeighborEntry, TextFeatureStore,
};
use lookalike_index::{HnswIndex, IndexError, IndexFiles, IndexStats, NeighborIndex};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Batch progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

/// Progress callback, invoked once per finished item.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Where the index used by a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    Built,
    Loaded,
}

/// Summary of a `compute_for_all` run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub items: usize,
    /// `None` when the metadata store was empty
    pub index: Option<IndexSource>,
    pub elapsed: Duration,
}

/// A stored neighbor resolved to its metadata record.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub entry: NeighborEntry,
    pub record: ItemRecord,
}

pub struct NeighborService {
    config: LookalikeConfig,
    metadata: Arc<dyn MetadataStore>,
    features: Arc<dyn FeatureStore>,
    files: IndexFiles,
    progress: Option<ProgressCallback>,
}

impl NeighborService {
    pub fn new(
        config: LookalikeConfig,
        metadata: Arc<dyn MetadataStore>,
        features: Arc<dyn FeatureStore>,
    ) -> Self {
        let files = IndexFiles::from_config(&config.paths);
        Self {
            config,
            metadata,
            features,
            files,
            progress: None,
        }
    }

    /// Service over the file-based stores named in `config`.
    pub async fn from_config(config: LookalikeConfig) -> Result<Self> {
        let metadata = JsonMetadataStore::open(&config.paths.metadata_dir).await?;
        let features = TextFeatureStore::new(
            &config.paths.features_dir,
            config.paths.features_extension.clone(),
        );
        Ok(Self::new(config, Arc::new(metadata), Arc::new(features)))
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn k(&self) -> usize {
        self.config.neighbors.k
    }

    pub fn index_files(&self) -> &IndexFiles {
        &self.files
    }

    /// Build and persist the index from every item.
    ///
    /// Skipped when a persisted index exists, unless `force` is set.
    /// Returns the stats of a freshly built index, `None` when skipped.
    pub async fn build_index(&self, force: bool) -> Result<Option<IndexStats>> {
        if !force && HnswIndex::exists(&self.files).await? {
            info!("Persisted index found at {}, skipping build", self.files.graph.display());
            return Ok(None);
        }

        let records = self.metadata.list().await?;
        let index = self.build_from(&records).await?;
        index.save(&self.files).await?;
        Ok(Some(index.stats()))
    }

    /// Stats of the persisted index.
    pub async fn index_stats(&self) -> Result<IndexStats> {
        Ok(HnswIndex::load(&self.files).await?.stats())
    }

    /// Reload the persisted index, building and persisting one first if absent.
    pub async fn load_or_build(&self, records: &[ItemRecord]) -> Result<(HnswIndex, IndexSource)> {
        match HnswIndex::load(&self.files).await {
            Ok(index) => Ok((index, IndexSource::Loaded)),
            Err(IndexError::IndexNotFound(path)) => {
                info!("No persisted index at {}, building one", path.display());
                let index = self.build_from(records).await?;
                index.save(&self.files).await?;
                Ok((index, IndexSource::Built))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn build_from(&self, records: &[ItemRecord]) -> Result<HnswIndex> {
        info!("Loading feature vectors for {} items", records.len());

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let vector = self.features.load(record).await?;
            items.push((record.id.clone(), vector));
        }

        Ok(HnswIndex::build(self.config.index, items)?)
    }

    /// Compute and store the neighbor list of one item.
    ///
    /// Queries `k + 1` neighbors with the item's own vector and drops the
    /// self-match. The record is written back immediately.
    pub async fn compute_for_item(
        &self,
        mut record: ItemRecord,
        index: &dyn NeighborIndex,
    ) -> Result<Vec<NeighborEntry>> {
        let vector = self.features.load(&record).await?;
        let hits = index.search(&vector, self.k() + 1).await?;
        let neighbors = rank_neighbors(&record.id, hits);

        debug!("Item {}: {} neighbors", record.id, neighbors.len());

        record.neighbors = Some(neighbors.clone());
        self.metadata.put(&record).await?;
        Ok(neighbors)
    }

    /// Compute neighbor lists for every item in the metadata store.
    ///
    /// The first failing item aborts the batch; items finished before it
    /// keep their updated records.
    pub async fn compute_for_all(&self) -> Result<BatchReport> {
        let started = Instant::now();
        let records = self.metadata.list().await?;
        let total = records.len();

        if total == 0 {
            info!("No items in metadata store, nothing to compute");
            return Ok(BatchReport {
                items: 0,
                index: None,
                elapsed: started.elapsed(),
            });
        }

        let (index, source) = self.load_or_build(&records).await?;
        let index: &dyn NeighborIndex = &index;
        self.check_search_width(index)?;
        let workers = self.config.neighbors.workers;

        info!("Computing {} neighbors for {} items with {} worker(s)", self.k(), total, workers);

        let processed = AtomicUsize::new(0);
        let processed = &processed;

        stream::iter(records.into_iter().map(Ok::<_, NeighborError>))
            .try_for_each_concurrent(workers, |record| async move {
                self.compute_for_item(record, index).await?;
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                self.report_progress(done, total);
                Ok::<(), NeighborError>(())
            })
            .await?;

        let elapsed = started.elapsed();
        info!("Computed neighbors for {} items in {:?}", total, elapsed);

        Ok(BatchReport {
            items: total,
            index: Some(source),
            elapsed,
        })
    }

    /// The index returns at most `ef_search` hits, fixed when it was built.
    fn check_search_width(&self, index: &dyn NeighborIndex) -> Result<()> {
        let ef_search = index.stats().ef_search;
        if self.k() + 1 > ef_search {
            return Err(LookalikeError::config(format!(
                "k = {} needs {} hits per query but the persisted index searches {}; \
                 lower k or rebuild the index with a larger index.ef_search",
                self.k(),
                self.k() + 1,
                ef_search
            ))
            .into());
        }
        Ok(())
    }

    fn report_progress(&self, processed: usize, total: usize) {
        if let Some(callback) = &self.progress {
            callback(Progress { processed, total });
        }

        let interval = self.config.neighbors.progress_interval;
        if processed == total || (interval > 0 && processed % interval == 0) {
            info!(processed, total, "Neighbor computation progress");
        }
    }

    /// Stored recommendations of an item, each resolved to its record.
    pub async fn recommend(&self, id: &ItemId) -> Result<Vec<Recommendation>> {
        let record = self.metadata.get(id).await?;
        let Some(neighbors) = record.neighbors else {
            return Err(NeighborError::NotComputed(id.clone()));
        };

        let mut recommendations = Vec::with_capacity(neighbors.len());
        for entry in neighbors {
            let record = self.metadata.get(&entry.id).await?;
            recommendations.push(Recommendation { entry, record });
        }
        Ok(recommendations)
    }
}
