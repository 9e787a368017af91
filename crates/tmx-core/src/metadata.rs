//! Open, ordered metadata carried by migration records
//!
//! Writes are additive merges: keys are inserted or updated, never removed.
//! [`BACKUP_PATH`] is write-once.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Location of the pre-apply snapshot; set by apply
pub const BACKUP_PATH: &str = "backup_path";
/// Free-text reason given for a rollback; set by rollback
pub const ROLLBACK_REASON: &str = "rollback_reason";
/// RFC 3339 time at which the payload went live; set by apply
pub const APPLIED_AT: &str = "applied_at";

const WRITE_ONCE: &[&str] = &[BACKUP_PATH];

/// String-keyed map of JSON values, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(IndexMap<String, Value>);

impl Metadata {
    /// Create empty metadata
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for constructing fresh maps
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a value as text
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Check for a key
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge one entry.
    ///
    /// # Errors
    /// Returns `MetadataError::WriteOnce` when `key` is write-once, already
    /// present, and `value` differs from the stored value
    pub fn merge_entry(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), MetadataError> {
        let key = key.into();
        let value = value.into();
        if WRITE_ONCE.contains(&key.as_str()) {
            if let Some(existing) = self.0.get(&key) {
                if *existing != value {
                    return Err(MetadataError::WriteOnce { key });
                }
                return Ok(());
            }
        }
        self.0.insert(key, value);
        Ok(())
    }

    /// Merge every entry of `other`, keeping keys absent from it.
    ///
    /// Validation happens before any write: on error `self` is unchanged.
    ///
    /// # Errors
    /// See [`Metadata::merge_entry`]
    pub fn merge(&mut self, other: Metadata) -> Result<(), MetadataError> {
        for (key, value) in &other.0 {
            if WRITE_ONCE.contains(&key.as_str()) {
                if let Some(existing) = self.0.get(key) {
                    if existing != value {
                        return Err(MetadataError::WriteOnce { key: key.clone() });
                    }
                }
            }
        }
        self.0.extend(other.0);
        Ok(())
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Metadata write errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Attempt to overwrite a write-once key
    #[error("metadata key '{key}' is write-once and already set")]
    WriteOnce { key: String },
}
