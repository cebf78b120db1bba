//! File-based item metadata store.
//!
//! One single-line JSON object per item, stored as `<ID>.json` in a flat
//! directory. Records are parsed and validated at this boundary so a bad
//! file fails with [`LookalikeError::MalformedRecord`] instead of producing
//! a wrong key further down the pipeline.

use crate::error::{LookalikeError, Result};
use crate::types::{ItemId, ItemRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Storage for per-item metadata records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Read every record.
    async fn list(&self) -> Result<Vec<ItemRecord>>;

    /// Read one record.
    async fn get(&self, id: &ItemId) -> Result<ItemRecord>;

    /// Create or overwrite one record.
    async fn put(&self, record: &ItemRecord) -> Result<()>;
}

/// Directory of `<ID>.json` files.
#[derive(Debug, Clone)]
pub struct JsonMetadataStore {
    dir: PathBuf,
}

impl JsonMetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open the store, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir).await?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &ItemId) -> Result<PathBuf> {
        if !id.is_path_safe() {
            return Err(LookalikeError::malformed(
                &self.dir,
                format!("item ID {:?} cannot be used as a file name", id.to_string()),
            ));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn read_record(path: &Path) -> Result<ItemRecord> {
        let content = fs::read_to_string(path).await?;
        let record: ItemRecord = serde_json::from_str(content.trim())
            .map_err(|e| LookalikeError::malformed(path, e.to_string()))?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if record.id.to_string() != stem {
            return Err(LookalikeError::malformed(
                path,
                format!("embedded ID {} does not match file name", record.id),
            ));
        }

        Ok(record)
    }

    /// Split a JSON Lines catalog into per-item records.
    ///
    /// Each non-blank line must be one item object carrying an `ID` field.
    /// Returns the number of records written.
    pub async fn import_catalog(&self, catalog: &Path) -> Result<usize> {
        info!("Importing catalog {} into {}", catalog.display(), self.dir.display());

        fs::create_dir_all(&self.dir).await?;
        let content = fs::read_to_string(catalog).await?;

        let mut written = 0;
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: ItemRecord = serde_json::from_str(line).map_err(|e| {
                LookalikeError::malformed(catalog, format!("line {}: {}", line_no + 1, e))
            })?;
            self.put(&record).await?;
            written += 1;
        }

        info!("Imported {} item records", written);
        Ok(written)
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn list(&self) -> Result<Vec<ItemRecord>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in &paths {
            records.push(Self::read_record(path).await?);
        }

        debug!("Read {} records from {}", records.len(), self.dir.display());
        Ok(records)
    }

    async fn get(&self, id: &ItemId) -> Result<ItemRecord> {
        let path = self.record_path(id)?;
        if !fs::try_exists(&path).await? {
            return Err(LookalikeError::ItemNotFound(id.clone()));
        }
        Self::read_record(&path).await
    }

    async fn put(&self, record: &ItemRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        let content = serde_json::to_string(record)?;

        // Atomic write: readers never observe a half-written record.
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Wrote record {}", path.display());
        Ok(())
    }
}
