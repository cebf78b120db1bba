//! On-disk layout of a persisted index.
//!
//! Two co-located artifacts:
//! - `<name>`: the HNSW graph (bincode, serde mode)
//! - `<name>.dat`: the raw data points with a format header
//!
//! Both artifacts carry the same build ID, so a graph from one build next to
//! the data of another (an interrupted rebuild) is detected on load. Both are
//! fully written to temp files before either is renamed into place.

use crate::error::{IndexError, Result};
use bincode::config;
use lookalike_core::{FeatureVector, IndexConfig, ItemId, PathsConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Magic bytes at the start of the data artifact.
pub const INDEX_MAGIC: [u8; 4] = *b"LKIX";
/// Supported data artifact version.
pub const INDEX_FORMAT_VERSION: u16 = 1;

/// Paths of the two index artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFiles {
    pub graph: PathBuf,
    pub data: PathBuf,
}

impl IndexFiles {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            graph: dir.join(name),
            data: dir.join(format!("{}.dat", name)),
        }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(&paths.index_dir, &paths.index_name)
    }

    /// Both artifacts are present.
    pub async fn exists(&self) -> Result<bool> {
        Ok(fs::try_exists(&self.graph).await? && fs::try_exists(&self.data).await?)
    }
}

/// Item IDs in bincode-friendly form; `ItemId` itself is untagged for JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum PersistedId {
    Numeric(u64),
    Text(String),
}

impl From<&ItemId> for PersistedId {
    fn from(id: &ItemId) -> Self {
        match id {
            ItemId::Numeric(n) => Self::Numeric(*n),
            ItemId::Text(s) => Self::Text(s.clone()),
        }
    }
}

impl From<PersistedId> for ItemId {
    fn from(id: PersistedId) -> Self {
        match id {
            PersistedId::Numeric(n) => Self::Numeric(n),
            PersistedId::Text(s) => Self::Text(s),
        }
    }
}

/// Identifier shared by the two artifacts of one build.
pub(crate) fn new_build_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    nanos ^ COUNTER.fetch_add(1, Ordering::Relaxed).rotate_left(48)
}

/// Contents of the graph artifact.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GraphArtifact<G> {
    pub build_id: u64,
    pub graph: G,
}

/// Contents of the data artifact, in data-point order.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DataPoints {
    pub magic: [u8; 4],
    pub version: u16,
    pub build_id: u64,
    pub dimension: usize,
    pub params: IndexConfig,
    pub ids: Vec<PersistedId>,
    pub vectors: Vec<FeatureVector>,
}

impl DataPoints {
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.magic != INDEX_MAGIC {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                reason: "bad magic bytes".to_string(),
            });
        }
        if self.version != INDEX_FORMAT_VERSION {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("unsupported format version {}", self.version),
            });
        }
        if self.ids.len() != self.vectors.len() {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("{} ids but {} vectors", self.ids.len(), self.vectors.len()),
            });
        }
        if let Some(bad) = self.vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("vector of length {} in a {}-dim index", bad.len(), self.dimension),
            });
        }
        Ok(())
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, config::standard())
        .map_err(|e| IndexError::Serialization(format!("Serialization failed: {}", e)))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<T> {
    bincode::serde::decode_from_slice(bytes, config::standard())
        .map(|(value, _)| value)
        .map_err(|e| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("Deserialization failed: {}", e),
        })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    PathBuf::from(temp)
}

/// Write both artifacts to sibling temp files, then rename them into place.
pub(crate) async fn write_pair_atomic(files: &IndexFiles, graph: &[u8], data: &[u8]) -> Result<()> {
    let graph_temp = temp_path(&files.graph);
    let data_temp = temp_path(&files.data);

    fs::write(&graph_temp, graph).await?;
    fs::write(&data_temp, data).await?;

    fs::rename(&graph_temp, &files.graph).await?;
    fs::rename(&data_temp, &files.data).await?;
    Ok(())
}
