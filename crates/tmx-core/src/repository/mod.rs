//! Persistence of migration records
//!
//! [`MigrationRepository`] is the relational side of the engine. Besides
//! plain reads and writes it hands out [`RecordLock`]s: exclusive, per-record
//! guards held for the whole of an apply or rollback, the equivalent of
//! locking the record's row for the duration of a transaction.

mod file;
mod memory;

pub use file::JsonFileRepository;
pub use memory::InMemoryMigrationRepository;

use crate::record::{MigrationId, MigrationRecord, NewMigration};
use crate::status::MigrationStatus;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;
use std::fs::File;
use std::sync::Arc;
use tmx_content::Interface;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Record selection for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationFilter {
    /// Only records of this interface
    pub interface: Option<Interface>,
    /// Only records in this status
    pub status: Option<MigrationStatus>,
}

impl MigrationFilter {
    /// Match every record
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Only pending records
    #[inline]
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: Some(MigrationStatus::Pending),
            ..Self::default()
        }
    }

    /// Restrict to an interface
    #[inline]
    #[must_use]
    pub fn for_interface(mut self, interface: Interface) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Restrict to a status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: MigrationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Check a record against the filter
    #[must_use]
    pub fn matches(&self, record: &MigrationRecord) -> bool {
        self.interface.map_or(true, |i| record.interface_origin == i)
            && self.status.map_or(true, |s| record.status == s)
    }
}

/// Storage of migration records
#[async_trait]
pub trait MigrationRepository: Send + Sync + Debug {
    /// Insert a new `pending` record, assigning its id
    ///
    /// # Errors
    /// `RepositoryError::DuplicateFilename` if the filename is already tracked
    async fn insert(&self, new: NewMigration) -> Result<MigrationRecord, RepositoryError>;

    /// Load a record
    async fn find(&self, id: MigrationId) -> Result<Option<MigrationRecord>, RepositoryError>;

    /// Persist a record over its previous version
    ///
    /// # Errors
    /// `RepositoryError::Missing` if no record has this id
    async fn save(&self, record: &MigrationRecord) -> Result<(), RepositoryError>;

    /// Acquire the exclusive lock for one record, waiting for any holder
    async fn lock(&self, id: MigrationId) -> Result<RecordLock, RepositoryError>;

    /// Records matching `filter`, ordered by id
    async fn list(&self, filter: MigrationFilter) -> Result<Vec<MigrationRecord>, RepositoryError>;

    /// Check if a filename is already tracked
    async fn exists_by_filename(&self, filename: &str) -> Result<bool, RepositoryError>;

    /// Highest batch number assigned so far, 0 when none
    async fn latest_batch_number(&self) -> Result<u64, RepositoryError>;

    /// Pending records, ordered by id
    async fn pending(&self) -> Result<Vec<MigrationRecord>, RepositoryError> {
        self.list(MigrationFilter::pending()).await
    }

    /// Records of one interface, ordered by id
    async fn for_interface(
        &self,
        interface: Interface,
    ) -> Result<Vec<MigrationRecord>, RepositoryError> {
        self.list(MigrationFilter::all().for_interface(interface)).await
    }
}

/// Exclusive hold on one migration record
///
/// Released on drop.
#[derive(Debug)]
pub struct RecordLock {
    id: MigrationId,
    guard: Option<OwnedMutexGuard<()>>,
    file: Option<File>,
    table: LockTable,
}

impl RecordLock {
    /// Locked record
    #[inline]
    #[must_use]
    pub fn id(&self) -> MigrationId {
        self.id
    }

    /// Also hold an OS lock on `file` until release
    pub(crate) fn with_file(mut self, file: File) -> Self {
        self.file = Some(file);
        self
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        self.file.take();
        self.guard.take();
        // Waiters hold their own clone, so a count of one means nobody needs the entry.
        self.table
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

type LockTable = Arc<DashMap<MigrationId, Arc<Mutex<()>>>>;

/// Lock table shared by repository implementations
///
/// Entries exist only while a lock is held or awaited.
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: LockTable,
}

impl RecordLocks {
    /// Create empty lock table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of `id`
    pub async fn acquire(&self, id: MigrationId) -> RecordLock {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = Arc::clone(self.locks.entry(id).or_default().value());
        let guard = mutex.lock_owned().await;
        RecordLock {
            id,
            guard: Some(guard),
            file: None,
            table: Arc::clone(&self.locks),
        }
    }

    /// Check whether `id` is currently held
    #[must_use]
    pub fn is_locked(&self, id: MigrationId) -> bool {
        self.locks
            .get(&id)
            .is_some_and(|mutex| mutex.try_lock().is_err())
    }

    /// Ids currently held or awaited
    #[must_use]
    pub fn entries(&self) -> usize {
        self.locks.len()
    }
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Filename already tracked
    #[error("migration already tracked: {0}")]
    DuplicateFilename(String),

    /// Save of a record that was never inserted
    #[error("no migration record with id {0}")]
    Missing(MigrationId),

    /// Backing file could not be read or written
    #[error("repository io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Backing file is not valid
    #[error("repository data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Blocking file task panicked or was cancelled
    #[error("repository task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
