//! Error types for the migration engine
//!
//! [`EngineError`] is reserved for conditions the caller cannot be expected
//! to branch on: an unknown migration id, storage faults, corrupt records.
//! Anticipated outcomes (checksum mismatch, wrong status, missing backup,
//! failed writes) are reported as failed
//! [`MigrationResult`](crate::dto::MigrationResult)s instead.

use crate::record::{MigrationId, RecordError};
use crate::repository::RepositoryError;
use tmx_content::Interface;
use tmx_store::StoreError;

/// Propagating engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No migration with this id
    #[error("migration not found: {0}")]
    NotFound(MigrationId),

    /// Tracking a file the content store does not hold
    #[error("migration file does not exist in store: {interface}/{filename}")]
    MissingArtifact {
        interface: Interface,
        filename: String,
    },

    /// Content store fault
    #[error("content store error: {0}")]
    Store(#[from] StoreError),

    /// Record persistence fault
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Record mutation refused
    #[error("record error: {0}")]
    Record(#[from] RecordError),
}

impl EngineError {
    /// Check if the error is an unknown migration id
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the error is a transient fault worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable(_) | StoreError::Io { .. })
                | Self::Repository(RepositoryError::Io { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        let err = EngineError::NotFound(MigrationId(99999));
        assert_eq!(err.to_string(), "migration not found: 99999");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_faults_are_retryable() {
        let err = EngineError::from(StoreError::Unavailable("timeout".to_string()));
        assert!(err.is_retryable());

        let err = EngineError::from(StoreError::NotFound("k".to_string()));
        assert!(!err.is_retryable());
    }
}
