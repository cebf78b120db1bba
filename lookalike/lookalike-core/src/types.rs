//! Core types shared by the store, index and neighbor service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A fixed-length image feature vector.
pub type FeatureVector = Vec<f32>;

/// Stable item identifier.
///
/// Catalogs use either integer or string IDs. The JSON form is kept as-is
/// when a record is written back, so `5` and `"5"` stay distinct on disk
/// while both map to the `5.json` metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Numeric(u64),
    Text(String),
}

impl ItemId {
    /// Whether this ID can be used verbatim as a file name stem.
    pub fn is_path_safe(&self) -> bool {
        match self {
            Self::Numeric(_) => true,
            Self::Text(s) => {
                !s.is_empty()
                    && s != "."
                    && s != ".."
                    && !s.contains(['/', '\\', '\0'])
            }
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for ItemId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<u64>() {
            Ok(n) => Self::Numeric(n),
            Err(_) => Self::Text(s.to_string()),
        })
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        Self::Numeric(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// One ranked entry of an item's similar-products list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub id: ItemId,
    /// Similarity in `[0, 1]` for non-opposed vectors, higher is closer.
    /// Stored as `sim`, the key existing `IBSP` lists use.
    #[serde(rename = "sim", alias = "similarity")]
    pub similarity: f64,
}

/// Per-item metadata record, stored as `<ID>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(rename = "ID")]
    pub id: ItemId,

    /// Location of the item's feature vector file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_features: Option<PathBuf>,

    /// Image-based similar products, ranked by descending similarity
    #[serde(rename = "IBSP", default, skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<Vec<NeighborEntry>>,

    /// Catalog fields this pipeline does not interpret (e.g. `imPath`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            image_features: None,
            neighbors: None,
            extra: Map::new(),
        }
    }

    pub fn with_features(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_features = Some(path.into());
        self
    }

    /// File name of this record in the metadata store.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_keeps_json_form() {
        let numeric: ItemId = serde_json::from_str("42").unwrap();
        let text: ItemId = serde_json::from_str("\"42\"").unwrap();

        assert_eq!(numeric, ItemId::Numeric(42));
        assert_eq!(text, ItemId::Text("42".to_string()));
        assert_eq!(numeric.to_string(), text.to_string());
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"42\"");
    }

    #[test]
    fn test_item_id_from_str() {
        assert_eq!("17".parse::<ItemId>().unwrap(), ItemId::Numeric(17));
        assert_eq!("B00X".parse::<ItemId>().unwrap(), ItemId::from("B00X"));
    }

    #[test]
    fn test_path_safety() {
        assert!(ItemId::from("sku-1").is_path_safe());
        assert!(!ItemId::from("../etc").is_path_safe());
        assert!(!ItemId::from("").is_path_safe());
    }

    #[test]
    fn test_record_preserves_unknown_fields() {
        let json = r#"{"ID": 7, "imPath": "images/7.jpg", "image_features": "feat/7.npz"}"#;
        let mut record: ItemRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, ItemId::Numeric(7));
        assert_eq!(record.image_features, Some(PathBuf::from("feat/7.npz")));
        assert!(record.neighbors.is_none());

        record.neighbors = Some(vec![NeighborEntry {
            id: ItemId::Numeric(3),
            similarity: 0.8766,
        }]);

        let value: Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["imPath"], "images/7.jpg");
        assert_eq!(value["IBSP"][0]["id"], 3);
        assert_eq!(value["IBSP"][0]["sim"], 0.8766);
    }

    #[test]
    fn test_neighbor_entry_reads_both_keys() {
        let sim: NeighborEntry = serde_json::from_str(r#"{"id": 2, "sim": 0.1}"#).unwrap();
        let long: NeighborEntry = serde_json::from_str(r#"{"id": 2, "similarity": 0.1}"#).unwrap();
        assert_eq!(sim, long);
        assert_eq!(sim.similarity, 0.1);
    }

    #[test]
    fn test_record_requires_id() {
        let result: std::result::Result<ItemRecord, _> =
            serde_json::from_str(r#"{"imPath": "x.jpg"}"#);
        assert!(result.is_err());
    }
}
