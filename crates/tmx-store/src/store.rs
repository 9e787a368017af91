//! The content store contract
//!
//! Backends implement four object primitives ([`ContentStore::get`],
//! [`ContentStore::put`], [`ContentStore::contains`], [`ContentStore::keys`]).
//! The interface-level operations the engine consumes are provided on top
//! of them, so every backend shares one key convention.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use tmx_content::{ContentFormat, ContentHash, Interface, ObjectKey};

/// Upper bound on same-second backup name collisions before giving up
const MAX_BACKUP_ATTEMPTS: u32 = 1000;

/// Key/blob storage holding live content, migration payloads and backups
#[async_trait]
pub trait ContentStore: Send + Sync + Debug {
    /// Read the blob stored under `key`
    ///
    /// # Errors
    /// `StoreError::NotFound` if absent, backend errors otherwise
    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError>;

    /// Store `content` under `key`, replacing any previous blob
    async fn put(
        &self,
        key: &ObjectKey,
        content: &[u8],
        format: ContentFormat,
    ) -> Result<(), StoreError>;

    /// Check whether a blob exists under `key`
    async fn contains(&self, key: &ObjectKey) -> Result<bool, StoreError>;

    /// Keys directly under `prefix`, sorted
    async fn keys(&self, prefix: &str) -> Result<Vec<ObjectKey>, StoreError>;

    /// Download a named artifact from an interface's namespace
    async fn download(&self, interface: Interface, name: &str) -> Result<Vec<u8>, StoreError> {
        let key = ObjectKey::migration(interface, name)?;
        self.get(&key).await
    }

    /// Upload a named artifact into an interface's namespace
    async fn upload(
        &self,
        interface: Interface,
        name: &str,
        content: &[u8],
        format: ContentFormat,
    ) -> Result<(), StoreError> {
        let key = ObjectKey::migration(interface, name)?;
        tracing::debug!(key = %key, size = content.len(), "uploading artifact");
        self.put(&key, content, format).await
    }

    /// Store a backup snapshot and return its path
    ///
    /// The path is `backups/<interface>/<interface>_<label>_<timestamp>.<ext>`.
    /// An existing snapshot is never overwritten: a numeric suffix is added
    /// when the same label is used twice within one second.
    async fn backup(
        &self,
        interface: Interface,
        label: &str,
        content: &[u8],
        format: ContentFormat,
    ) -> Result<String, StoreError> {
        let taken_at = Utc::now();
        for attempt in 0..MAX_BACKUP_ATTEMPTS {
            let key = ObjectKey::backup(interface, label, taken_at, format, attempt)?;
            if self.contains(&key).await? {
                continue;
            }
            self.put(&key, content, format).await?;
            tracing::info!(
                interface = %interface,
                backup_path = %key,
                size = content.len(),
                "backup snapshot stored"
            );
            return Ok(key.to_string());
        }
        Err(StoreError::write_rejected(
            ObjectKey::backups_prefix(interface),
            format!("too many '{label}' backups within one second"),
        ))
    }

    /// Read a blob by the path returned from [`ContentStore::backup`]
    async fn read_path(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let key: ObjectKey = path.parse()?;
        self.get(&key).await
    }

    /// Check whether a named artifact exists in an interface's namespace
    async fn exists(&self, interface: Interface, name: &str) -> Result<bool, StoreError> {
        let key = ObjectKey::migration(interface, name)?;
        self.contains(&key).await
    }

    /// Names of the artifacts in an interface's namespace, sorted
    async fn list_migrations(&self, interface: Interface) -> Result<Vec<String>, StoreError> {
        let keys = self.keys(&ObjectKey::migrations_prefix(interface)).await?;
        Ok(keys
            .iter()
            .map(|key| key.file_name().to_string())
            .collect())
    }

    /// Paths of an interface's backups, sorted by name
    async fn list_backups(&self, interface: Interface) -> Result<Vec<String>, StoreError> {
        let keys = self.keys(&ObjectKey::backups_prefix(interface)).await?;
        Ok(keys.iter().map(ToString::to_string).collect())
    }

    /// Digest of a named artifact as currently stored
    async fn checksum(&self, interface: Interface, name: &str) -> Result<ContentHash, StoreError> {
        let content = self.download(interface, name).await?;
        Ok(ContentHash::compute(&content))
    }
}
