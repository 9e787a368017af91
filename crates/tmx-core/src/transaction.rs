//! Unit of work over one migration record
//!
//! A [`UnitOfWork`] holds the record's exclusive lock, a working copy of the
//! record loaded *after* the lock was taken, and nothing else. Mutations go
//! to the working copy; only [`UnitOfWork::commit`] writes it back. Dropping
//! an uncommitted unit of work discards every change, which is how errors
//! raised mid-operation leave the persisted record as it was on entry.

use crate::error::EngineError;
use crate::record::{MigrationId, MigrationRecord};
use crate::repository::{MigrationRepository, RecordLock};
use chrono::Utc;

/// Locked working copy of a migration record
#[derive(Debug)]
pub struct UnitOfWork<'r> {
    repository: &'r dyn MigrationRepository,
    record: MigrationRecord,
    committed: bool,
    _lock: RecordLock,
}

impl<'r> UnitOfWork<'r> {
    /// Lock record `id` and load it.
    ///
    /// Waits while another unit of work holds the same record, so the loaded
    /// copy reflects any change that unit committed.
    ///
    /// # Errors
    /// `EngineError::NotFound` if no record has this id
    pub async fn begin(
        repository: &'r dyn MigrationRepository,
        id: MigrationId,
    ) -> Result<UnitOfWork<'r>, EngineError> {
        let lock = repository.lock(id).await?;
        let record = repository
            .find(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        tracing::trace!(migration_id = %id, status = %record.status, "unit of work started");
        Ok(Self {
            repository,
            record,
            committed: false,
            _lock: lock,
        })
    }

    /// Working copy
    #[inline]
    #[must_use]
    pub fn record(&self) -> &MigrationRecord {
        &self.record
    }

    /// Mutable working copy
    #[inline]
    pub fn record_mut(&mut self) -> &mut MigrationRecord {
        &mut self.record
    }

    /// Persist the working copy and release the lock
    ///
    /// # Errors
    /// Repository errors; the persisted record is then unchanged
    pub async fn commit(mut self) -> Result<MigrationRecord, EngineError> {
        self.record.touch(Utc::now());
        self.repository.save(&self.record).await?;
        self.committed = true;
        tracing::trace!(migration_id = %self.record.id, status = %self.record.status, "unit of work committed");
        Ok(self.record.clone())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::trace!(migration_id = %self.record.id, "unit of work discarded");
        }
    }
}
