//! HNSW similarity index over item feature vectors.
//!
//! The index is built once from the full item set, persisted, and reloaded on
//! later runs. It is never mutated after construction, so it can be shared
//! read-only between concurrent queries.
//!
//! Search is approximate: HNSW trades exact top-k recall for sublinear query
//! time. Consumers only need good similar items, not an exact ranking.

use crate::error::{IndexError, Result};
use crate::persist::{
    self, DataPoints, GraphArtifact, INDEX_FORMAT_VERSION, INDEX_MAGIC, IndexFiles, PersistedId,
};
use async_trait::async_trait;
use instant_distance::{Builder, HnswMap, Point, Search};
use lookalike_core::{FeatureVector, IndexConfig, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::fs;
use tracing::{debug, info, warn};

/// Point wrapper for instant-distance compatibility
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorPoint {
    data: Vec<f32>,
}

impl Point for VectorPoint {
    fn distance(&self, other: &Self) -> f32 {
        cosine_distance(&self.data, &other.data)
    }
}

impl VectorPoint {
    fn new(data: Vec<f32>) -> Self {
        Self { data }
    }
}

/// Cosine distance `1 - cos(a, b)`.
///
/// 0 means same direction; a zero vector is at distance 1 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        1.0f32
    } else {
        let similarity = dot / (norm_a * norm_b);
        let clamped_similarity = similarity.clamp(-1.0, 1.0);
        1.0 - clamped_similarity
    }
}

/// One query result.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: ItemId,
    pub distance: f32,
}

/// Index statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_vectors: usize,
    pub dimension: usize,
    pub metric: &'static str,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

/// Read-only k-NN index.
#[async_trait]
pub trait NeighborIndex: Send + Sync {
    /// Up to `n` nearest neighbors of `query`, by ascending distance.
    async fn search(&self, query: &[f32], n: usize) -> Result<Vec<IndexHit>>;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality shared by every indexed vector.
    fn dimension(&self) -> usize;

    fn stats(&self) -> IndexStats;
}

/// HNSW vector index implementation using instant-distance.
pub struct HnswIndex {
    params: IndexConfig,
    /// Shared by both persisted artifacts of this build
    build_id: u64,
    dimension: usize,
    /// Item ID per data point; graph values index into this
    ids: Vec<ItemId>,
    /// Raw vectors per data point
    vectors: Vec<FeatureVector>,
    positions: HashMap<ItemId, usize>,
    hnsw: HnswMap<VectorPoint, usize>,
}

impl HnswIndex {
    /// Build an index from the full item set.
    ///
    /// The first vector fixes the index dimension. Every vector must be
    /// non-empty, finite and of that dimension, and IDs must be unique.
    pub fn build(params: IndexConfig, items: Vec<(ItemId, FeatureVector)>) -> Result<Self> {
        let Some((_, first)) = items.first() else {
            return Err(IndexError::EmptyIndex);
        };
        let dimension = first.len();

        info!(
            "Building HNSW index: {} vectors, dimension={}, ef_construction={}, ef_search={}",
            items.len(),
            dimension,
            params.ef_construction,
            params.ef_search
        );

        let mut ids = Vec::with_capacity(items.len());
        let mut vectors = Vec::with_capacity(items.len());
        let mut positions = HashMap::with_capacity(items.len());

        for (id, vector) in items {
            validate_vector(&id, &vector, dimension)?;
            if positions.insert(id.clone(), ids.len()).is_some() {
                return Err(IndexError::InvalidVector {
                    item: id,
                    reason: "duplicate item ID".to_string(),
                });
            }
            ids.push(id);
            vectors.push(vector);
        }

        let points: Vec<VectorPoint> = vectors.iter().cloned().map(VectorPoint::new).collect();
        let values: Vec<usize> = (0..ids.len()).collect();

        let hnsw = Builder::default()
            .ef_construction(params.ef_construction)
            .ef_search(params.ef_search)
            .seed(params.seed)
            .build(points, values);

        info!("HNSW index built with {} vectors", ids.len());

        Ok(Self {
            params,
            build_id: persist::new_build_id(),
            dimension,
            ids,
            vectors,
            positions,
            hnsw,
        })
    }

    /// Whether a persisted index exists at `files`.
    pub async fn exists(files: &IndexFiles) -> Result<bool> {
        files.exists().await
    }

    /// Persist the graph and the raw data points.
    pub async fn save(&self, files: &IndexFiles) -> Result<()> {
        info!("Saving index to: {}", files.graph.display());

        if let Some(parent) = files.graph.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let graph = persist::encode(&GraphArtifact {
            build_id: self.build_id,
            graph: &self.hnsw,
        })?;
        let data = persist::encode(&DataPoints {
            magic: INDEX_MAGIC,
            version: INDEX_FORMAT_VERSION,
            build_id: self.build_id,
            dimension: self.dimension,
            params: self.params,
            ids: self.ids.iter().map(PersistedId::from).collect(),
            vectors: self.vectors.clone(),
        })?;

        persist::write_pair_atomic(files, &graph, &data).await?;

        info!(
            "Index saved: {} vectors ({} + {} bytes)",
            self.ids.len(),
            graph.len(),
            data.len()
        );
        Ok(())
    }

    /// Reload a persisted index without rebuilding the graph.
    pub async fn load(files: &IndexFiles) -> Result<Self> {
        if !files.exists().await? {
            return Err(IndexError::IndexNotFound(files.graph.clone()));
        }

        info!("Loading index from: {}", files.graph.display());

        let data_bytes = fs::read(&files.data).await?;
        let data: DataPoints = persist::decode(&data_bytes, &files.data)?;
        data.validate(&files.data)?;

        let graph_bytes = fs::read(&files.graph).await?;
        let artifact: GraphArtifact<HnswMap<VectorPoint, usize>> =
            persist::decode(&graph_bytes, &files.graph)?;

        if artifact.build_id != data.build_id {
            return Err(IndexError::Corrupt {
                path: files.graph.clone(),
                reason: "graph and data artifacts come from different builds".to_string(),
            });
        }
        let hnsw = artifact.graph;

        if hnsw.values.len() != data.ids.len() {
            return Err(IndexError::Corrupt {
                path: files.graph.clone(),
                reason: format!(
                    "graph has {} points but data artifact has {}",
                    hnsw.values.len(),
                    data.ids.len()
                ),
            });
        }
        if hnsw.values.iter().any(|&pos| pos >= data.ids.len()) {
            return Err(IndexError::Corrupt {
                path: files.graph.clone(),
                reason: "graph references an unknown data point".to_string(),
            });
        }

        let ids: Vec<ItemId> = data.ids.into_iter().map(ItemId::from).collect();
        let positions = ids.iter().enumerate().map(|(pos, id)| (id.clone(), pos)).collect();

        info!("Index loaded successfully: {} vectors", ids.len());

        Ok(Self {
            params: data.params,
            build_id: data.build_id,
            dimension: data.dimension,
            ids,
            vectors: data.vectors,
            positions,
            hnsw,
        })
    }

    /// Stored vector of an indexed item.
    pub fn vector(&self, id: &ItemId) -> Option<&[f32]> {
        self.positions.get(id).map(|&pos| self.vectors[pos].as_slice())
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn params(&self) -> &IndexConfig {
        &self.params
    }

    fn search_sync(&self, query: &[f32], n: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::InvalidQuery("non-finite component".to_string()));
        }
        if n > self.params.ef_search {
            warn!(
                "Requested {} neighbors but ef_search is {}; results are capped",
                n, self.params.ef_search
            );
        }

        let query_point = VectorPoint::new(query.to_vec());
        let mut search = Search::default();

        let hits: Vec<IndexHit> = self
            .hnsw
            .search(&query_point, &mut search)
            .take(n)
            .map(|item| IndexHit {
                id: self.ids[*item.value].clone(),
                distance: item.distance,
            })
            .collect();

        debug!("HNSW search found {} results", hits.len());
        Ok(hits)
    }
}

fn validate_vector(id: &ItemId, vector: &[f32], dimension: usize) -> Result<()> {
    if vector.is_empty() {
        return Err(IndexError::InvalidVector {
            item: id.clone(),
            reason: "empty vector".to_string(),
        });
    }
    if vector.len() != dimension {
        return Err(IndexError::InvalidVector {
            item: id.clone(),
            reason: format!("expected {} dimensions, got {}", dimension, vector.len()),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(IndexError::InvalidVector {
            item: id.clone(),
            reason: "non-finite component".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl NeighborIndex for HnswIndex {
    async fn search(&self, query: &[f32], n: usize) -> Result<Vec<IndexHit>> {
        self.search_sync(query, n)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            total_vectors: self.ids.len(),
            dimension: self.dimension,
            metric: "cosine",
            ef_construction: self.params.ef_construction,
            ef_search: self.params.ef_search,
            seed: self.params.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    fn create_test_vector(dimension: usize, seed: u64) -> FeatureVector {
        let mut vec = Vec::with_capacity(dimension);
        for i in 0..dimension {
            vec.push(((seed + i as u64) % 100) as f32 / 100.0);
        }
        vec
    }

    fn items(n: u64, dimension: usize) -> Vec<(ItemId, FeatureVector)> {
        (0..n)
            .map(|i| (ItemId::Numeric(i), create_test_vector(dimension, i * 7)))
            .collect()
    }

    #[test]
    fn test_cosine_distance() {
        assert_abs_diff_eq!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]), 0.0);
        assert_abs_diff_eq!(cosine_distance(&[1.0, 0.0], &[0.0, 1.0]), 1.0);
        assert_abs_diff_eq!(cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]), 2.0);
        assert_abs_diff_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_build_and_search() {
        let index = HnswIndex::build(IndexConfig::default(), items(20, 16)).unwrap();
        assert_eq!(index.len(), 20);
        assert_eq!(index.dimension(), 16);

        let query = create_test_vector(16, 5 * 7);
        let results = index.search(&query, 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, ItemId::Numeric(5));
        assert!(results[0].distance < 1e-5);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_empty_build() {
        let result = HnswIndex::build(IndexConfig::default(), vec![]);
        assert!(matches!(result, Err(IndexError::EmptyIndex)));
    }

    #[test]
    fn test_dimension_mismatch_on_build() {
        let mut data = items(3, 8);
        data.push((ItemId::Numeric(99), vec![1.0; 4]));

        match HnswIndex::build(IndexConfig::default(), data) {
            Err(IndexError::InvalidVector { item, .. }) => assert_eq!(item, ItemId::Numeric(99)),
            other => panic!("Expected InvalidVector error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_non_finite_and_duplicate_rejected() {
        let data = vec![
            (ItemId::Numeric(1), vec![1.0, 0.0]),
            (ItemId::Numeric(2), vec![f32::NAN, 0.0]),
        ];
        assert!(matches!(
            HnswIndex::build(IndexConfig::default(), data),
            Err(IndexError::InvalidVector { .. })
        ));

        let data = vec![
            (ItemId::Numeric(1), vec![1.0, 0.0]),
            (ItemId::Numeric(1), vec![0.0, 1.0]),
        ];
        assert!(matches!(
            HnswIndex::build(IndexConfig::default(), data),
            Err(IndexError::InvalidVector { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let index = HnswIndex::build(IndexConfig::default(), items(3, 8)).unwrap();
        match index.search(&[1.0; 4], 2).await {
            Err(IndexError::DimensionMismatch { expected, got }) => {
                assert_eq!(expected, 8);
                assert_eq!(got, 4);
            }
            other => panic!("Expected DimensionMismatch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let files = IndexFiles::new(temp_dir.path(), "index.bin");

        let index = HnswIndex::build(IndexConfig::default(), items(30, 12)).unwrap();
        assert!(!HnswIndex::exists(&files).await.unwrap());
        index.save(&files).await.unwrap();
        assert!(HnswIndex::exists(&files).await.unwrap());

        let loaded = HnswIndex::load(&files).await.unwrap();
        assert_eq!(loaded.len(), 30);
        assert_eq!(loaded.stats(), index.stats());
        assert_eq!(loaded.vector(&ItemId::Numeric(4)), index.vector(&ItemId::Numeric(4)));

        for seed in [0u64, 13, 29] {
            let query = create_test_vector(12, seed * 3);
            let before = index.search(&query, 6).await.unwrap();
            let after = loaded.search(&query, 6).await.unwrap();
            assert_eq!(before, after);
        }
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp_dir = tempdir().unwrap();
        let files = IndexFiles::new(temp_dir.path(), "index.bin");
        assert!(matches!(
            HnswIndex::load(&files).await,
            Err(IndexError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_data_artifact() {
        let temp_dir = tempdir().unwrap();
        let files = IndexFiles::new(temp_dir.path(), "index.bin");

        let index = HnswIndex::build(IndexConfig::default(), items(5, 4)).unwrap();
        index.save(&files).await.unwrap();
        std::fs::remove_file(&files.data).unwrap();

        assert!(!HnswIndex::exists(&files).await.unwrap());
        assert!(matches!(
            HnswIndex::load(&files).await,
            Err(IndexError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_load_garbage_is_corrupt() {
        let temp_dir = tempdir().unwrap();
        let files = IndexFiles::new(temp_dir.path(), "index.bin");
        std::fs::write(&files.graph, b"not a graph").unwrap();
        std::fs::write(&files.data, b"not data").unwrap();

        assert!(matches!(
            HnswIndex::load(&files).await,
            Err(IndexError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_graph_from_another_build_is_corrupt() {
        let temp_dir = tempdir().unwrap();
        let old = IndexFiles::new(temp_dir.path(), "index.bin");
        let new = IndexFiles::new(temp_dir.path(), "rebuilt.bin");

        // Same point count, different items: only the build ID tells them apart.
        HnswIndex::build(IndexConfig::default(), items(6, 4))
            .unwrap()
            .save(&old)
            .await
            .unwrap();
        let shifted: Vec<_> = items(6, 4)
            .into_iter()
            .map(|(id, v)| match id {
                ItemId::Numeric(n) => (ItemId::Numeric(n + 100), v),
                other => (other, v),
            })
            .collect();
        HnswIndex::build(IndexConfig::default(), shifted)
            .unwrap()
            .save(&new)
            .await
            .unwrap();

        // Rebuild interrupted after the graph rename.
        std::fs::copy(&new.graph, &old.graph).unwrap();

        assert!(matches!(
            HnswIndex::load(&old).await,
            Err(IndexError::Corrupt { .. })
        ));
        assert!(!temp_dir.path().join("index.bin.tmp").exists());
        assert!(!temp_dir.path().join("index.bin.dat.tmp").exists());
    }
}
