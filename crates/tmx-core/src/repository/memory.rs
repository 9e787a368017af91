//! In-memory migration repository

use super::{MigrationFilter, MigrationRepository, RecordLock, RecordLocks, RepositoryError};
use crate::record::{MigrationId, MigrationRecord, NewMigration};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Repository keeping records in a process-local ordered map
#[derive(Debug, Default)]
pub struct InMemoryMigrationRepository {
    records: RwLock<BTreeMap<MigrationId, MigrationRecord>>,
    locks: RecordLocks,
}

impl InMemoryMigrationRepository {
    /// Create empty repository
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create repository holding `records` as-is
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = MigrationRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            records: RwLock::new(records),
            locks: RecordLocks::new(),
        }
    }

    /// Synchronous snapshot of one record
    #[must_use]
    pub fn get(&self, id: MigrationId) -> Option<MigrationRecord> {
        self.records.read().get(&id).cloned()
    }

    /// Check whether a record is locked by an in-flight operation
    #[inline]
    #[must_use]
    pub fn is_locked(&self, id: MigrationId) -> bool {
        self.locks.is_locked(id)
    }
}

#[async_trait]
impl MigrationRepository for InMemoryMigrationRepository {
    async fn insert(&self, new: NewMigration) -> Result<MigrationRecord, RepositoryError> {
        let mut records = self.records.write();
        if records.values().any(|r| r.filename == new.filename) {
            return Err(RepositoryError::DuplicateFilename(new.filename));
        }
        let next = records.keys().next_back().map_or(1, |id| id.0 + 1);
        let record = MigrationRecord::from_new(MigrationId(next), new, Utc::now());
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: MigrationId) -> Result<Option<MigrationRecord>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn save(&self, record: &MigrationRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write();
        match records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(RepositoryError::Missing(record.id)),
        }
    }

    async fn lock(&self, id: MigrationId) -> Result<RecordLock, RepositoryError> {
        Ok(self.locks.acquire(id).await)
    }

    async fn list(&self, filter: MigrationFilter) -> Result<Vec<MigrationRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn exists_by_filename(&self, filename: &str) -> Result<bool, RepositoryError> {
        Ok(self.records.read().values().any(|r| r.filename == filename))
    }

    async fn latest_batch_number(&self) -> Result<u64, RepositoryError> {
        Ok(self
            .records
            .read()
            .values()
            .filter_map(|r| r.batch_number)
            .max()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::MigrationStatus;
    use tmx_content::Interface;

    fn new_migration(interface: Interface, filename: &str) -> NewMigration {
        NewMigration::new(interface, filename, "v1.0.0", "abc")
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let repo = InMemoryMigrationRepository::new();
        let a = repo.insert(new_migration(Interface::Mobile, "a.json")).await.unwrap();
        let b = repo.insert(new_migration(Interface::Mobile, "b.json")).await.unwrap();

        assert_eq!(a.id, MigrationId(1));
        assert_eq!(b.id, MigrationId(2));
        assert_eq!(a.status, MigrationStatus::Pending);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_filenames() {
        let repo = InMemoryMigrationRepository::new();
        repo.insert(new_migration(Interface::WebFinancer, "web_financer_v1.0.0_2025-08-27.json"))
            .await
            .unwrap();

        let err = repo
            .insert(new_migration(Interface::WebFinancer, "web_financer_v1.0.0_2025-08-27.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateFilename(_)));
        assert!(repo
            .exists_by_filename("web_financer_v1.0.0_2025-08-27.json")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn save_requires_existing_record() {
        let repo = InMemoryMigrationRepository::new();
        let mut record = repo.insert(new_migration(Interface::Mobile, "a.json")).await.unwrap();
        record.batch_number = Some(3);
        repo.save(&record).await.unwrap();
        assert_eq!(repo.get(record.id).unwrap().batch_number, Some(3));

        record.id = MigrationId(99);
        assert!(matches!(
            repo.save(&record).await,
            Err(RepositoryError::Missing(MigrationId(99)))
        ));
    }

    #[tokio::test]
    async fn queries_filter_and_report_batches() {
        let repo = InMemoryMigrationRepository::new();
        assert_eq!(repo.latest_batch_number().await.unwrap(), 0);

        let mut a = repo.insert(new_migration(Interface::Mobile, "a.json")).await.unwrap();
        repo.insert(new_migration(Interface::WebBeneficiary, "b.json"))
            .await
            .unwrap();
        a.mark_completed(3, Utc::now()).unwrap();
        repo.save(&a).await.unwrap();

        assert_eq!(repo.latest_batch_number().await.unwrap(), 3);
        assert_eq!(repo.pending().await.unwrap().len(), 1);
        assert_eq!(repo.for_interface(Interface::Mobile).await.unwrap()[0].id, a.id);
        assert!(repo.for_interface(Interface::WebFinancer).await.unwrap().is_empty());
    }
}
