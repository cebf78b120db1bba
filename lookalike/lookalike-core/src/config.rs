//! Pipeline configuration.
//!
//! All filesystem locations used by the metadata store, feature store and
//! index live here and are passed explicitly to each component.
//!
//! Configuration is read from a TOML file, then environment overrides are
//! applied, then the result is validated:
//!
//! ```toml
//! [paths]
//! metadata_dir = "data/metadata"
//! features_dir = "data/features"
//! index_dir = "data/index"
//!
//! [index]
//! ef_search = 100
//!
//! [neighbors]
//! k = 10
//! workers = 4
//! ```

use crate::error::{LookalikeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable names
pub const ENV_METADATA_DIR: &str = "LOOKALIKE_METADATA_DIR";
pub const ENV_FEATURES_DIR: &str = "LOOKALIKE_FEATURES_DIR";
pub const ENV_INDEX_DIR: &str = "LOOKALIKE_INDEX_DIR";
pub const ENV_K: &str = "LOOKALIKE_K";
pub const ENV_WORKERS: &str = "LOOKALIKE_WORKERS";
pub const ENV_LOG_LEVEL: &str = "LOOKALIKE_LOG_LEVEL";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookalikeConfig {
    pub paths: PathsConfig,
    pub index: IndexConfig,
    pub neighbors: NeighborsConfig,
    pub general: GeneralConfig,
}

/// Filesystem layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of `<ID>.json` metadata records
    pub metadata_dir: PathBuf,

    /// Base directory for relative feature-vector paths
    pub features_dir: PathBuf,

    /// File extension used when writing feature vectors
    pub features_extension: String,

    /// Directory holding the persisted index artifacts
    pub index_dir: PathBuf,

    /// Graph artifact name; the data artifact is `<index_name>.dat`
    pub index_name: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            metadata_dir: PathBuf::from("data/metadata"),
            features_dir: PathBuf::from("data/features"),
            features_extension: "txt".to_string(),
            index_dir: PathBuf::from("data/index"),
            index_name: "index.bin".to_string(),
        }
    }
}

/// HNSW construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Candidate list size while building the graph
    pub ef_construction: usize,

    /// Candidate list size at query time; caps the number of results
    pub ef_search: usize,

    /// RNG seed for layer assignment
    pub seed: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ef_construction: 100,
            ef_search: 100,
            seed: 42,
        }
    }
}

/// Neighbor computation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborsConfig {
    /// Number of similar items kept per item
    pub k: usize,

    /// Concurrent per-item computations (1 = sequential)
    pub workers: usize,

    /// Log progress every this many items (0 = only at the end)
    pub progress_interval: usize,
}

impl Default for NeighborsConfig {
    fn default() -> Self {
        Self {
            k: 10,
            workers: 1,
            progress_interval: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl PathsConfig {
    /// Path of the graph artifact.
    pub fn index_graph_path(&self) -> PathBuf {
        self.index_dir.join(&self.index_name)
    }
}

impl LookalikeConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LookalikeError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| LookalikeError::config(format!("Failed to parse config file: {}", e)))?;

        config.merge_env_vars()?;
        config.validate()?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults.
    /// Environment overrides and validation apply in both cases.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path).await,
            None => {
                let mut config = Self::default();
                config.merge_env_vars()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Save configuration atomically (temp file, then rename).
    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| LookalikeError::config(format!("Failed to serialize config: {}", e)))?;

        let temp_path = path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn merge_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_METADATA_DIR) {
            debug!("Overriding metadata_dir from environment: {}", dir);
            self.paths.metadata_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup(ENV_FEATURES_DIR) {
            debug!("Overriding features_dir from environment: {}", dir);
            self.paths.features_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup(ENV_INDEX_DIR) {
            debug!("Overriding index_dir from environment: {}", dir);
            self.paths.index_dir = PathBuf::from(dir);
        }

        if let Some(k) = lookup(ENV_K) {
            self.neighbors.k = k
                .parse()
                .map_err(|e| LookalikeError::config(format!("Invalid {} value '{}': {}", ENV_K, k, e)))?;
        }

        if let Some(workers) = lookup(ENV_WORKERS) {
            self.neighbors.workers = workers.parse().map_err(|e| {
                LookalikeError::config(format!("Invalid {} value '{}': {}", ENV_WORKERS, workers, e))
            })?;
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.general.log_level = level;
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(LookalikeError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.general.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.neighbors.k == 0 {
            return Err(LookalikeError::config("neighbors.k must be at least 1"));
        }

        if self.neighbors.workers == 0 {
            return Err(LookalikeError::config("neighbors.workers must be at least 1"));
        }

        // Search returns at most ef_search points and the service asks for k + 1.
        if self.index.ef_search <= self.neighbors.k {
            return Err(LookalikeError::config(format!(
                "index.ef_search ({}) must exceed neighbors.k ({})",
                self.index.ef_search, self.neighbors.k
            )));
        }

        if self.index.ef_construction == 0 {
            return Err(LookalikeError::config("index.ef_construction must be at least 1"));
        }

        if self.paths.index_name.is_empty() {
            return Err(LookalikeError::config("paths.index_name must not be empty"));
        }

        Ok(())
    }
}
