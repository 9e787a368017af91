//! Requests and results exchanged with callers

use crate::metadata::Metadata;
use crate::record::MigrationId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Request to promote a migration's payload to live content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub migration_id: MigrationId,
    /// Snapshot the live content first, enabling rollback
    pub create_backup: bool,
    /// Re-check the payload digest against the recorded checksum
    pub validate_checksum: bool,
}

impl ApplyRequest {
    /// Request with backup and checksum validation enabled
    #[inline]
    #[must_use]
    pub fn new(migration_id: MigrationId) -> Self {
        Self {
            migration_id,
            create_backup: true,
            validate_checksum: true,
        }
    }

    /// Set backup flag
    #[inline]
    #[must_use]
    pub fn create_backup(mut self, enabled: bool) -> Self {
        self.create_backup = enabled;
        self
    }

    /// Set checksum flag
    #[inline]
    #[must_use]
    pub fn validate_checksum(mut self, enabled: bool) -> Self {
        self.validate_checksum = enabled;
        self
    }
}

/// Request to restore the content replaced by an applied migration
///
/// Bounds on `reason` are enforced by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub migration_id: MigrationId,
    pub reason: String,
}

impl RollbackRequest {
    /// Create rollback request
    #[inline]
    #[must_use]
    pub fn new(migration_id: MigrationId, reason: impl Into<String>) -> Self {
        Self {
            migration_id,
            reason: reason.into(),
        }
    }
}

/// Anticipated reasons an apply or rollback does not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Payload digest differs from the recorded checksum
    ChecksumMismatch,
    /// Writing the payload as live content failed
    ApplyFailed,
    /// Apply on a completed record
    AlreadyApplied,
    /// Apply or rollback on a rolled-back record
    AlreadyRolledBack,
    /// Apply on a record that is neither pending nor already handled
    NotPending,
    /// Rollback on a record that is not completed
    NotCompleted,
    /// Rollback without a recorded snapshot
    NoBackup,
    /// Restoring the snapshot failed
    RollbackFailed,
}

impl FailureKind {
    /// Human-readable message reported to callers
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            FailureKind::ChecksumMismatch => "Checksum validation failed",
            FailureKind::ApplyFailed => "Migration application failed",
            FailureKind::AlreadyApplied => "Migration has already been applied",
            FailureKind::AlreadyRolledBack => "Migration has already been rolled back",
            FailureKind::NotPending => "Only pending migrations can be applied",
            FailureKind::NotCompleted => "Only completed migrations can be rolled back",
            FailureKind::NoBackup => "No backup found",
            FailureKind::RollbackFailed => "Rollback failed",
        }
    }

    /// Failures that leave the record untouched because a precondition was
    /// not met. No event is emitted for these.
    #[inline]
    #[must_use]
    pub const fn is_precondition(self) -> bool {
        matches!(
            self,
            FailureKind::AlreadyApplied
                | FailureKind::AlreadyRolledBack
                | FailureKind::NotPending
                | FailureKind::NotCompleted
                | FailureKind::NoBackup
        )
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Structured outcome of an apply or rollback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    pub migration_id: MigrationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl MigrationResult {
    /// Successful outcome
    #[must_use]
    pub fn success(migration_id: MigrationId, backup_path: Option<String>) -> Self {
        Self {
            success: true,
            migration_id,
            backup_path,
            error: None,
            failure: None,
            metadata: Metadata::new(),
        }
    }

    /// Failed outcome carrying the failure's message
    #[must_use]
    pub fn failure(migration_id: MigrationId, failure: FailureKind) -> Self {
        Self {
            success: false,
            migration_id,
            backup_path: None,
            error: Some(failure.message().to_string()),
            failure: Some(failure),
            metadata: Metadata::new(),
        }
    }

    /// Attach display metadata
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Error message, empty on success
    #[inline]
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_carries_exact_message() {
        let result = MigrationResult::failure(MigrationId(3), FailureKind::ChecksumMismatch);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Checksum validation failed"));
        assert_eq!(result.failure, Some(FailureKind::ChecksumMismatch));
        assert!(result.backup_path.is_none());
    }

    #[test]
    fn already_rolled_back_message_names_the_condition() {
        assert!(FailureKind::AlreadyRolledBack
            .message()
            .ends_with("already been rolled back"));
        assert!(FailureKind::AlreadyRolledBack.is_precondition());
        assert!(!FailureKind::ApplyFailed.is_precondition());
    }

    #[test]
    fn apply_request_defaults_are_safe() {
        let request = ApplyRequest::new(MigrationId(1));
        assert!(request.create_backup);
        assert!(request.validate_checksum);

        let request = request.create_backup(false);
        assert!(!request.create_backup);
    }

    #[test]
    fn success_result_serializes_compactly() {
        let result =
            MigrationResult::success(MigrationId(5), Some("backups/mobile/b.json".to_string()));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["backup_path"], "backups/mobile/b.json");
        assert!(json.get("error").is_none());
        assert!(json.get("metadata").is_none());
    }
}
