//! JSON-file migration repository
//!
//! Keeps every record in one JSON document that is read from disk on every
//! access, so several handles (or processes) on the same file agree. Writers
//! hold an exclusive lock on a sidecar `.lock` file for the whole
//! read-modify-write and replace the document through a temporary file and a
//! rename. Record locks pair the in-process lock with an OS lock on a
//! per-record lock file.

use super::{MigrationFilter, MigrationRepository, RecordLock, RecordLocks, RepositoryError};
use crate::record::{MigrationId, MigrationRecord, NewMigration};
use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    records: Vec<MigrationRecord>,
}

impl Document {
    fn contains(&self, id: MigrationId) -> bool {
        self.records.iter().any(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Shared,
    Exclusive,
}

/// Repository persisted as a single JSON file
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    locks: RecordLocks,
}

impl JsonFileRepository {
    /// Open the repository at `path`; a missing file is an empty repository
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let repository = Self {
            path: path.into(),
            locks: RecordLocks::new(),
        };
        let records = repository.read(|document| Ok(document.records.len())).await?;
        tracing::debug!(
            path = %repository.path.display(),
            records,
            "migration repository opened"
        );
        Ok(repository)
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document_lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn record_lock_path(&self, id: MigrationId) -> PathBuf {
        self.path.with_extension("locks").join(format!("{id}.lock"))
    }

    async fn read<T, F>(&self, operation: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(Document) -> Result<T, RepositoryError> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.document_lock_path();
        tokio::task::spawn_blocking(move || {
            let _lock = lock_file(&lock_path, Access::Shared)?;
            operation(load(&path)?)
        })
        .await?
    }

    async fn update<T, F>(&self, operation: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> Result<T, RepositoryError> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.document_lock_path();
        tokio::task::spawn_blocking(move || {
            let _lock = lock_file(&lock_path, Access::Exclusive)?;
            let mut document = load(&path)?;
            let output = operation(&mut document)?;
            store(&path, &document)?;
            Ok(output)
        })
        .await?
    }
}

fn lock_file(path: &Path, access: Access) -> Result<File, RepositoryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    match access {
        Access::Shared => FileExt::lock_shared(&file),
        Access::Exclusive => FileExt::lock_exclusive(&file),
    }
    .map_err(|e| io_error(path, e))?;
    Ok(file)
}

fn load(path: &Path) -> Result<Document, RepositoryError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::default()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn store(path: &Path, document: &Document) -> Result<(), RepositoryError> {
    let bytes = serde_json::to_vec_pretty(document)?;
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, bytes).map_err(|e| io_error(&staging, e))?;
    std::fs::rename(&staging, path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> RepositoryError {
    RepositoryError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl MigrationRepository for JsonFileRepository {
    async fn insert(&self, new: NewMigration) -> Result<MigrationRecord, RepositoryError> {
        self.update(move |document| {
            if document.records.iter().any(|r| r.filename == new.filename) {
                return Err(RepositoryError::DuplicateFilename(new.filename));
            }
            let next = document.records.iter().map(|r| r.id.0).max().map_or(1, |id| id + 1);
            let record = MigrationRecord::from_new(MigrationId(next), new, Utc::now());
            document.records.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn find(&self, id: MigrationId) -> Result<Option<MigrationRecord>, RepositoryError> {
        self.read(move |document| Ok(document.records.into_iter().find(|r| r.id == id)))
            .await
    }

    async fn save(&self, record: &MigrationRecord) -> Result<(), RepositoryError> {
        let record = record.clone();
        self.update(move |document| {
            match document.records.iter_mut().find(|r| r.id == record.id) {
                Some(slot) => {
                    *slot = record;
                    Ok(())
                }
                None => Err(RepositoryError::Missing(record.id)),
            }
        })
        .await
    }

    async fn lock(&self, id: MigrationId) -> Result<RecordLock, RepositoryError> {
        let lock = self.locks.acquire(id).await;
        // Records are never removed, so an id absent now needs no file lock.
        if !self.read(move |document| Ok(document.contains(id))).await? {
            return Ok(lock);
        }
        let path = self.record_lock_path(id);
        let file = tokio::task::spawn_blocking(move || lock_file(&path, Access::Exclusive)).await??;
        Ok(lock.with_file(file))
    }

    async fn list(&self, filter: MigrationFilter) -> Result<Vec<MigrationRecord>, RepositoryError> {
        self.read(move |document| {
            let mut records: Vec<_> = document
                .records
                .into_iter()
                .filter(|r| filter.matches(r))
                .collect();
            records.sort_by_key(|r| r.id);
            Ok(records)
        })
        .await
    }

    async fn exists_by_filename(&self, filename: &str) -> Result<bool, RepositoryError> {
        let filename = filename.to_string();
        self.read(move |document| Ok(document.records.iter().any(|r| r.filename == filename)))
            .await
    }

    async fn latest_batch_number(&self) -> Result<u64, RepositoryError> {
        self.read(|document| {
            Ok(document
                .records
                .iter()
                .filter_map(|r| r.batch_number)
                .max()
                .unwrap_or(0))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use std::time::Duration;
    use tmx_content::Interface;

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let repo = JsonFileRepository::open(&path).await.unwrap();
        let mut record = repo
            .insert(
                NewMigration::new(Interface::Mobile, "mobile_v1.0.0_2025-08-27.json", "v1.0.0", "abc")
                    .with_metadata(Metadata::new().with("source", "sync")),
            )
            .await
            .unwrap();
        record.mark_completed(1, Utc::now()).unwrap();
        repo.save(&record).await.unwrap();
        drop(repo);

        let reopened = JsonFileRepository::open(&path).await.unwrap();
        let loaded = reopened.find(record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(reopened.latest_batch_number().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::open(dir.path().join("nested/records.json"))
            .await
            .unwrap();
        assert!(repo.list(MigrationFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn handles_on_one_file_see_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let first = JsonFileRepository::open(&path).await.unwrap();
        let second = JsonFileRepository::open(&path).await.unwrap();

        let a = first
            .insert(NewMigration::new(Interface::Mobile, "mobile_a.json", "a", "abc"))
            .await
            .unwrap();
        let b = second
            .insert(NewMigration::new(Interface::Mobile, "mobile_b.json", "b", "abc"))
            .await
            .unwrap();
        assert_eq!(b.id, MigrationId(a.id.0 + 1));

        let mut completed = second.find(a.id).await.unwrap().unwrap();
        completed.mark_completed(1, Utc::now()).unwrap();
        second.save(&completed).await.unwrap();

        assert_eq!(first.find(a.id).await.unwrap().unwrap(), completed);
        assert_eq!(first.list(MigrationFilter::all()).await.unwrap().len(), 2);
        assert_eq!(first.latest_batch_number().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn record_lock_excludes_other_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let first = JsonFileRepository::open(&path).await.unwrap();
        let second = JsonFileRepository::open(&path).await.unwrap();
        let id = first
            .insert(NewMigration::new(Interface::Mobile, "mobile_a.json", "a", "abc"))
            .await
            .unwrap()
            .id;

        let held = first.lock(id).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(100), second.lock(id)).await;
        assert!(blocked.is_err());

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_secs(5), second.lock(id)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = JsonFileRepository::open(&path).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt(_)));
    }
}
