//! Migration records
//!
//! A [`MigrationRecord`] is the versioned unit of content change and the
//! engine's audit trail. Status changes go through the methods here, which
//! consult the state machine before touching any field.

use crate::metadata::{Metadata, MetadataError, APPLIED_AT, BACKUP_PATH, ROLLBACK_REASON};
use crate::status::{validate_transition, MigrationStatus, TransitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use tmx_content::Interface;

/// Unique migration identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(pub u64);

impl Display for MigrationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MigrationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for MigrationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Fields supplied when a migration is first tracked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMigration {
    /// Versioned artifact name in the interface namespace
    pub filename: String,
    /// Owning interface
    pub interface_origin: Interface,
    /// Version label, for display
    pub version: String,
    /// Hex digest of the payload at discovery time
    pub checksum: String,
    /// Facts attached at discovery
    pub metadata: Metadata,
}

impl NewMigration {
    /// Create new migration fields with empty metadata
    #[must_use]
    pub fn new(
        interface_origin: Interface,
        filename: impl Into<String>,
        version: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            interface_origin,
            version: version.into(),
            checksum: checksum.into(),
            metadata: Metadata::new(),
        }
    }

    /// With discovery metadata
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Persisted migration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: MigrationId,
    pub interface_origin: Interface,
    pub filename: String,
    pub version: String,
    pub status: MigrationStatus,
    pub checksum: String,
    pub batch_number: Option<u64>,
    pub executed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Materialize a freshly tracked migration. Status starts `pending`.
    #[must_use]
    pub fn from_new(id: MigrationId, new: NewMigration, now: DateTime<Utc>) -> Self {
        Self {
            id,
            interface_origin: new.interface_origin,
            filename: new.filename,
            version: new.version,
            status: MigrationStatus::Pending,
            checksum: new.checksum,
            batch_number: None,
            executed_at: None,
            rolled_back_at: None,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Location of the pre-apply snapshot, if one was taken
    #[inline]
    #[must_use]
    pub fn backup_path(&self) -> Option<&str> {
        self.metadata.get_str(BACKUP_PATH)
    }

    /// Reason recorded by rollback
    #[inline]
    #[must_use]
    pub fn rollback_reason(&self) -> Option<&str> {
        self.metadata.get_str(ROLLBACK_REASON)
    }

    /// Check if the record can still be applied
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == MigrationStatus::Pending
    }

    /// Fail early if `to` is not reachable from the current status
    ///
    /// # Errors
    /// `TransitionError::Illegal`
    #[inline]
    pub fn ensure_transition(&self, to: MigrationStatus) -> Result<(), TransitionError> {
        validate_transition(self.status, to)
    }

    /// `pending → completed`: stamp execution time and batch.
    ///
    /// An existing batch number is kept.
    ///
    /// # Errors
    /// Returns error if the record is not pending. Nothing is modified.
    pub fn mark_completed(
        &mut self,
        batch_number: u64,
        now: DateTime<Utc>,
    ) -> Result<(), RecordError> {
        self.ensure_transition(MigrationStatus::Completed)?;
        self.metadata.merge_entry(APPLIED_AT, now.to_rfc3339())?;
        self.status = MigrationStatus::Completed;
        self.executed_at = Some(now);
        self.batch_number.get_or_insert(batch_number);
        self.updated_at = now;
        Ok(())
    }

    /// Check that no backup path is recorded yet
    ///
    /// # Errors
    /// `RecordError::Metadata` when one is
    pub fn ensure_backup_unset(&self) -> Result<(), RecordError> {
        if self.backup_path().is_some() {
            return Err(MetadataError::WriteOnce {
                key: BACKUP_PATH.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Attach the pre-apply snapshot location.
    ///
    /// # Errors
    /// Returns error if a different backup path is already recorded
    pub fn record_backup(&mut self, backup_path: &str) -> Result<(), RecordError> {
        self.metadata.merge_entry(BACKUP_PATH, backup_path)?;
        Ok(())
    }

    /// `completed → rolled_back`: record the reason.
    ///
    /// # Errors
    /// Returns error if the record is not completed. Nothing is modified.
    pub fn mark_rolled_back(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RecordError> {
        self.ensure_transition(MigrationStatus::RolledBack)?;
        self.metadata.merge_entry(ROLLBACK_REASON, reason)?;
        self.status = MigrationStatus::RolledBack;
        self.rolled_back_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Bump `updated_at`
    #[inline]
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Record mutation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Illegal status change
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Metadata write refused
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}
