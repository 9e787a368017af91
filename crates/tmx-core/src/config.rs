//! Engine configuration

use serde::{Deserialize, Serialize};
use tmx_content::ContentFormat;

/// Storage conventions used by the migration engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base name of the live artifact in each interface namespace
    pub current_artifact: String,
    /// Format of the live artifact
    pub current_format: ContentFormat,
    /// Label of the snapshot taken before an apply
    pub backup_label: String,
    /// Format of pre-apply snapshots
    pub backup_format: ContentFormat,
    /// Snapshot content used when an interface has no live artifact yet
    pub empty_snapshot: String,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With live artifact base name
    #[inline]
    #[must_use]
    pub fn with_current_artifact(mut self, name: impl Into<String>) -> Self {
        self.current_artifact = name.into();
        self
    }

    /// With backup label
    #[inline]
    #[must_use]
    pub fn with_backup_label(mut self, label: impl Into<String>) -> Self {
        self.backup_label = label.into();
        self
    }

    /// With empty-interface snapshot content
    #[inline]
    #[must_use]
    pub fn with_empty_snapshot(mut self, content: impl Into<String>) -> Self {
        self.empty_snapshot = content.into();
        self
    }

    /// File name of the live artifact, e.g. `current.json`
    #[inline]
    #[must_use]
    pub fn current_file_name(&self) -> String {
        format!(
            "{}.{}",
            self.current_artifact,
            self.current_format.extension()
        )
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            current_artifact: "current".to_string(),
            current_format: ContentFormat::Json,
            backup_label: "before-apply-migration".to_string(),
            backup_format: ContentFormat::Json,
            empty_snapshot: "{}".to_string(),
        }
    }
}
