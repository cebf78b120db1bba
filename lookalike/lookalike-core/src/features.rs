//! Flat-text feature vector files.
//!
//! One vector per file, values separated by newlines, commas or whitespace,
//! `#` comment lines allowed. This is the layout `numpy.savetxt` produces for
//! a 1-D array, which is what the extraction step writes.

use crate::error::{LookalikeError, Result};
use crate::types::{FeatureVector, ItemId, ItemRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Source of per-item feature vectors.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Load the feature vector referenced by a metadata record.
    async fn load(&self, record: &ItemRecord) -> Result<FeatureVector>;
}

/// Feature vectors stored as text files under a base directory.
#[derive(Debug, Clone)]
pub struct TextFeatureStore {
    base_dir: PathBuf,
    extension: String,
}

impl TextFeatureStore {
    pub fn new(base_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            extension: extension.into(),
        }
    }

    /// Resolve a record's feature path.
    ///
    /// Relative paths are tried against the base directory, then as given
    /// (relative to the working directory, which is how the extraction step
    /// records them), then by file name alone under the base directory.
    /// When none exists the base-directory candidate is returned.
    pub async fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }

        let under_base = self.base_dir.join(path);
        let mut candidates = vec![under_base.clone(), path.to_path_buf()];
        if let Some(name) = path.file_name() {
            candidates.push(self.base_dir.join(name));
        }

        for candidate in candidates {
            if fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
        }
        under_base
    }

    /// Write a vector as `<base_dir>/<ID>.<ext>`, one value per line.
    ///
    /// Returns the path to store in the record's `image_features` field.
    pub async fn save(&self, id: &ItemId, vector: &[f32]) -> Result<PathBuf> {
        if !id.is_path_safe() {
            return Err(LookalikeError::invalid_vector(id, "item ID cannot be used as a file name"));
        }

        fs::create_dir_all(&self.base_dir).await?;
        let path = self.base_dir.join(format!("{}.{}", id, self.extension));

        let mut content = String::with_capacity(vector.len() * 12);
        for value in vector {
            content.push_str(&value.to_string());
            content.push('\n');
        }
        fs::write(&path, content).await?;

        debug!("Saved {}-dim feature vector for item {}", vector.len(), id);
        Ok(path)
    }
}

#[async_trait]
impl FeatureStore for TextFeatureStore {
    async fn load(&self, record: &ItemRecord) -> Result<FeatureVector> {
        let Some(rel) = &record.image_features else {
            return Err(LookalikeError::invalid_vector(&record.id, "record has no image_features path"));
        };

        let path = self.resolve(rel).await;
        let content = fs::read_to_string(&path).await.map_err(|e| {
            LookalikeError::invalid_vector(&record.id, format!("cannot read {}: {}", path.display(), e))
        })?;

        parse_feature_text(&record.id, &content)
    }
}

/// Parse the text form of a feature vector.
pub fn parse_feature_text(id: &ItemId, content: &str) -> Result<FeatureVector> {
    let mut vector = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let value: f32 = token
                .parse()
                .map_err(|_| LookalikeError::invalid_vector(id, format!("non-numeric value {:?}", token)))?;
            if !value.is_finite() {
                return Err(LookalikeError::invalid_vector(id, format!("non-finite value {}", token)));
            }
            vector.push(value);
        }
    }

    if vector.is_empty() {
        return Err(LookalikeError::invalid_vector(id, "feature file is empty"));
    }

    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_savetxt_layout() {
        let id = ItemId::Numeric(1);
        let text = "1.000000000000000000e+00\n2.500000000000000000e-01\n0.000000000000000000e+00\n";
        assert_eq!(parse_feature_text(&id, text).unwrap(), vec![1.0, 0.25, 0.0]);
    }

    #[test]
    fn test_parse_mixed_separators_and_comments() {
        let id = ItemId::Numeric(1);
        let text = "# header\n1, 2 3\n\n4\t5\n";
        assert_eq!(parse_feature_text(&id, text).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let id = ItemId::Numeric(1);
        assert!(matches!(
            parse_feature_text(&id, "1.0\nabc\n"),
            Err(LookalikeError::InvalidVector { .. })
        ));
        assert!(matches!(
            parse_feature_text(&id, "1.0\nnan\n"),
            Err(LookalikeError::InvalidVector { .. })
        ));
        assert!(matches!(
            parse_feature_text(&id, "\n# only a comment\n"),
            Err(LookalikeError::InvalidVector { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = TextFeatureStore::new(dir.path(), "txt");
        let id = ItemId::from("sku-9");

        let path = store.save(&id, &[0.5, -1.25, 3.0]).await.unwrap();
        assert_eq!(path, dir.path().join("sku-9.txt"));

        let record = ItemRecord::new(id).with_features(&path);
        assert_eq!(store.load(&record).await.unwrap(), vec![0.5, -1.25, 3.0]);
    }

    #[tokio::test]
    async fn test_relative_path_resolves_against_base() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("3.npz"), "1\n2\n").unwrap();

        let store = TextFeatureStore::new(dir.path(), "npz");
        let record = ItemRecord::new(3u64).with_features("3.npz");
        assert_eq!(store.load(&record).await.unwrap(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_working_dir_relative_path() {
        let dir = tempfile::tempdir_in(".").unwrap();
        std::fs::write(dir.path().join("12.npz"), "0.5\n0.5\n").unwrap();
        let rel = Path::new(dir.path().file_name().unwrap()).join("12.npz");

        let store = TextFeatureStore::new("no/such/base", "npz");
        let record = ItemRecord::new(12u64).with_features(&rel);
        assert_eq!(store.load(&record).await.unwrap(), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_file_name_fallback_under_base() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("12.npz"), "1,2,3\n").unwrap();

        let store = TextFeatureStore::new(dir.path(), "npz");
        let record = ItemRecord::new(12u64).with_features("images_features/12.npz");
        assert_eq!(store.load(&record).await.unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_missing_vector() {
        let dir = tempdir().unwrap();
        let store = TextFeatureStore::new(dir.path(), "txt");

        let no_path = ItemRecord::new(1u64);
        assert!(matches!(
            store.load(&no_path).await,
            Err(LookalikeError::InvalidVector { .. })
        ));

        let no_file = ItemRecord::new(2u64).with_features("2.txt");
        assert!(matches!(
            store.load(&no_file).await,
            Err(LookalikeError::InvalidVector { .. })
        ));
    }
}
