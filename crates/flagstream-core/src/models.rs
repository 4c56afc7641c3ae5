//! Data model for replicated flags

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full dataset keyed by flag key
pub type AllFlags = HashMap<String, FeatureFlag>;

/// A single versioned record in the replicated dataset
///
/// Only `key`, `version` and `deleted` are interpreted here. Everything else
/// the server sends is carried through untouched in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    #[serde(default)]
    pub key: String,

    /// Ordering field; stale writes are rejected by the store
    #[serde(default)]
    pub version: u64,

    /// Tombstone marker
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl FeatureFlag {
    /// Create a flag with no extra attributes
    pub fn new(key: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
            deleted: false,
            attributes: Map::new(),
        }
    }

    /// Create a deletion marker at the given version
    pub fn tombstone(key: impl Into<String>, version: u64) -> Self {
        Self {
            deleted: true,
            ..Self::new(key, version)
        }
    }

    /// Attach an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_keeps_unknown_fields() {
        let flag: FeatureFlag = serde_json::from_value(json!({
            "key": "beta",
            "version": 4,
            "on": true,
            "variations": [true, false]
        }))
        .unwrap();

        assert_eq!(flag.key, "beta");
        assert_eq!(flag.version, 4);
        assert!(!flag.deleted);
        assert_eq!(flag.attribute("on"), Some(&json!(true)));
        assert_eq!(flag.attribute("variations"), Some(&json!([true, false])));
    }

    #[test]
    fn test_missing_version_defaults_to_zero() {
        let flag: FeatureFlag = serde_json::from_value(json!({"key": "a"})).unwrap();
        assert_eq!(flag.version, 0);
    }

    #[test]
    fn test_tombstone() {
        let flag = FeatureFlag::tombstone("gone", 7);
        assert!(flag.deleted);
        assert_eq!(flag.version, 7);

        let value = serde_json::to_value(&flag).unwrap();
        assert_eq!(value["deleted"], json!(true));
    }

    #[test]
    fn test_live_flag_omits_deleted_field() {
        let flag = FeatureFlag::new("a", 1).with_attribute("on", json!(false));
        let value = serde_json::to_value(&flag).unwrap();

        assert!(value.get("deleted").is_none());
        assert_eq!(value["on"], json!(false));
    }
}
