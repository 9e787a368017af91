//! Migration service
//!
//! Mechanical operations over a single migration record and the content
//! store. No locking, no persistence, no events: orchestrators own those.
//!
//! Write failures against the content store are reported as `Ok(false)`.
//! Faults reading a migration's own payload propagate as errors.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metadata::Metadata;
use crate::record::{MigrationRecord, NewMigration, RecordError};
use crate::repository::MigrationRepository;
use crate::status::MigrationStatus;
use chrono::Utc;
use std::sync::Arc;
use serde::de::IgnoredAny;
use tmx_content::{ContentFormat, ContentHash, Interface};
use tmx_store::ContentStore;

/// Checksum, apply and rollback mechanics
#[derive(Debug, Clone)]
pub struct MigrationService {
    store: Arc<dyn ContentStore>,
    repository: Arc<dyn MigrationRepository>,
    config: EngineConfig,
}

impl MigrationService {
    /// Create service
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        repository: Arc<dyn MigrationRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            repository,
            config,
        }
    }

    /// Content store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recompute the payload digest and compare it with `record.checksum`.
    ///
    /// # Errors
    /// Store errors reading the payload
    pub async fn validate_checksum(&self, record: &MigrationRecord) -> Result<bool, EngineError> {
        let actual = self
            .store
            .checksum(record.interface_origin, &record.filename)
            .await?;
        let valid = actual.matches(&record.checksum);
        tracing::debug!(
            migration_id = %record.id,
            expected = %record.checksum,
            actual = %actual.short(),
            valid,
            "checksum validated"
        );
        Ok(valid)
    }

    /// Write the record's payload as the live content of its interface,
    /// then mark the record completed.
    ///
    /// A record without a batch number joins the batch after the latest one.
    /// Returns `Ok(false)` without touching `record` when the payload is
    /// empty or the write is refused.
    ///
    /// # Errors
    /// - Record is not pending (checked before any write)
    /// - Payload cannot be read
    /// - Batch number lookup fails
    pub async fn apply(&self, record: &mut MigrationRecord) -> Result<bool, EngineError> {
        record
            .ensure_transition(MigrationStatus::Completed)
            .map_err(RecordError::from)?;

        let batch_number = match record.batch_number {
            Some(batch) => batch,
            None => self.repository.latest_batch_number().await? + 1,
        };
        self.apply_in_batch(record, batch_number).await
    }

    /// [`MigrationService::apply`] with an explicit batch number.
    ///
    /// # Errors
    /// Same as [`MigrationService::apply`]
    pub async fn apply_in_batch(
        &self,
        record: &mut MigrationRecord,
        batch_number: u64,
    ) -> Result<bool, EngineError> {
        record
            .ensure_transition(MigrationStatus::Completed)
            .map_err(RecordError::from)?;

        let interface = record.interface_origin;
        let payload = self.store.download(interface, &record.filename).await?;
        tracing::debug!(
            migration_id = %record.id,
            interface = %interface,
            size = payload.len(),
            "migration payload downloaded"
        );

        if payload.is_empty() {
            tracing::warn!(
                migration_id = %record.id,
                filename = %record.filename,
                "migration payload is empty; nothing to apply"
            );
            return Ok(false);
        }

        let current = self.config.current_file_name();
        if let Err(error) = self
            .store
            .upload(interface, &current, &payload, self.config.current_format)
            .await
        {
            tracing::warn!(
                migration_id = %record.id,
                interface = %interface,
                error = %error,
                "writing live content failed"
            );
            return Ok(false);
        }

        record.mark_completed(batch_number, Utc::now())?;
        tracing::debug!(
            migration_id = %record.id,
            batch_number,
            "live content replaced"
        );
        Ok(true)
    }

    /// Restore the snapshot at `record.metadata.backup_path` as live content.
    ///
    /// The record itself is not modified. Returns `Ok(false)` when there is
    /// no backup path, the snapshot cannot be read or written back, or live
    /// content is JSON and the snapshot does not parse.
    ///
    /// # Errors
    /// Currently infallible; read and write failures are `Ok(false)`
    pub async fn rollback(&self, record: &MigrationRecord) -> Result<bool, EngineError> {
        let Some(backup_path) = record.backup_path() else {
            tracing::warn!(migration_id = %record.id, "no backup path recorded");
            return Ok(false);
        };

        let snapshot = match self.store.read_path(backup_path).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(
                    migration_id = %record.id,
                    backup_path,
                    error = %error,
                    "reading backup failed"
                );
                return Ok(false);
            }
        };

        if self.config.current_format == ContentFormat::Json {
            if let Err(error) = serde_json::from_slice::<IgnoredAny>(&snapshot) {
                tracing::warn!(
                    migration_id = %record.id,
                    backup_path,
                    error = %error,
                    "backup is not valid JSON"
                );
                return Ok(false);
            }
        }

        let interface = record.interface_origin;
        if let Err(error) = self
            .store
            .upload(
                interface,
                &self.config.current_file_name(),
                &snapshot,
                self.config.current_format,
            )
            .await
        {
            tracing::warn!(
                migration_id = %record.id,
                interface = %interface,
                error = %error,
                "restoring live content failed"
            );
            return Ok(false);
        }

        tracing::debug!(
            migration_id = %record.id,
            backup_path,
            size = snapshot.len(),
            "live content restored from backup"
        );
        Ok(true)
    }

    /// Snapshot the live content of `interface` and return the backup path.
    ///
    /// An interface without live content yet is snapshotted as
    /// [`EngineConfig::empty_snapshot`].
    ///
    /// # Errors
    /// Store errors other than a missing live artifact
    pub async fn snapshot_current(&self, interface: Interface) -> Result<String, EngineError> {
        let current = match self
            .store
            .download(interface, &self.config.current_file_name())
            .await
        {
            Ok(content) => content,
            Err(error) if error.is_not_found() => {
                tracing::warn!(
                    interface = %interface,
                    "live content not found; snapshotting empty content"
                );
                self.config.empty_snapshot.clone().into_bytes()
            }
            Err(error) => return Err(error.into()),
        };

        let path = self
            .store
            .backup(
                interface,
                &self.config.backup_label,
                &current,
                self.config.backup_format,
            )
            .await?;
        Ok(path)
    }

    /// Start tracking one artifact already present in the store.
    ///
    /// The checksum is computed from the stored bytes.
    ///
    /// # Errors
    /// - `EngineError::MissingArtifact` if the store does not hold the file
    /// - Duplicate filename
    pub async fn track(
        &self,
        interface: Interface,
        filename: &str,
        version: &str,
        metadata: Metadata,
    ) -> Result<MigrationRecord, EngineError> {
        if !self.store.exists(interface, filename).await? {
            return Err(EngineError::MissingArtifact {
                interface,
                filename: filename.to_string(),
            });
        }
        let checksum: ContentHash = self.store.checksum(interface, filename).await?;
        let record = self
            .repository
            .insert(
                NewMigration::new(interface, filename, version, checksum.to_string())
                    .with_metadata(metadata),
            )
            .await?;
        tracing::info!(
            migration_id = %record.id,
            interface = %interface,
            filename,
            checksum = %checksum.short(),
            "migration tracked"
        );
        Ok(record)
    }
}
