//! In-memory content store
//!
//! Concurrent map of object keys to blobs. Used by tests and by embedders
//! that keep content in process.

use crate::error::StoreError;
use crate::store::ContentStore;
use async_trait::async_trait;
use dashmap::DashMap;
use tmx_content::{ContentFormat, Interface, ObjectKey};

/// A stored blob and its declared format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Raw bytes
    pub content: Vec<u8>,
    /// Declared serialization
    pub format: ContentFormat,
}

/// Content store backed by a concurrent hash map
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    objects: DashMap<ObjectKey, StoredObject>,
}

impl InMemoryContentStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a named artifact in an interface's namespace without going
    /// through the async contract. Intended for fixtures.
    ///
    /// # Errors
    /// Returns error if `name` is not a valid key segment
    pub fn seed(
        &self,
        interface: Interface,
        name: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<ObjectKey, StoreError> {
        let key = ObjectKey::migration(interface, name)?;
        self.objects.insert(
            key.clone(),
            StoredObject {
                content: content.into(),
                format: ContentFormat::Json,
            },
        );
        Ok(key)
    }

    /// Synchronous read of a stored object
    #[must_use]
    pub fn object(&self, key: &ObjectKey) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        self.objects
            .get(key)
            .map(|entry| entry.content.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        key: &ObjectKey,
        content: &[u8],
        format: ContentFormat,
    ) -> Result<(), StoreError> {
        self.objects.insert(
            key.clone(),
            StoredObject {
                content: content.to_vec(),
                format,
            },
        );
        Ok(())
    }

    async fn contains(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        Ok(self.objects.contains_key(key))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<ObjectKey>, StoreError> {
        let mut keys: Vec<ObjectKey> = self
            .objects
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| {
                key.as_str()
                    .strip_prefix(prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn download_returns_seeded_content() {
        let store = InMemoryContentStore::new();
        store
            .seed(Interface::Mobile, "current.json", b"{\"a\":1}".to_vec())
            .unwrap();

        let content = store.download(Interface::Mobile, "current.json").await.unwrap();
        assert_eq!(content, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn download_missing_is_not_found() {
        let store = InMemoryContentStore::new();
        let err = store
            .download(Interface::WebFinancer, "current.json")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn interfaces_do_not_share_namespaces() {
        let store = InMemoryContentStore::new();
        store
            .upload(Interface::Mobile, "current.json", b"m", ContentFormat::Json)
            .await
            .unwrap();

        assert!(store.exists(Interface::Mobile, "current.json").await.unwrap());
        assert!(!store
            .exists(Interface::WebBeneficiary, "current.json")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn backup_is_readable_by_returned_path() {
        let store = InMemoryContentStore::new();
        let path = store
            .backup(
                Interface::WebBeneficiary,
                "before-apply-migration",
                b"snapshot",
                ContentFormat::Json,
            )
            .await
            .unwrap();

        assert!(path.starts_with("backups/web_beneficiary/web_beneficiary_before-apply-migration_"));
        assert!(path.ends_with(".json"));
        assert_eq!(store.read_path(&path).await.unwrap(), b"snapshot");
    }

    #[tokio::test]
    async fn repeated_backups_never_overwrite_each_other() {
        let store = InMemoryContentStore::new();
        let first = store
            .backup(Interface::Mobile, "label", b"one", ContentFormat::Json)
            .await
            .unwrap();
        let second = store
            .backup(Interface::Mobile, "label", b"two", ContentFormat::Json)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(store.read_path(&first).await.unwrap(), b"one");
        assert_eq!(store.read_path(&second).await.unwrap(), b"two");
        assert_eq!(store.list_backups(Interface::Mobile).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_migrations_is_sorted_and_scoped() {
        let store = InMemoryContentStore::new();
        store
            .seed(Interface::Mobile, "mobile_v1.1.0_2025-09-01.json", "b")
            .unwrap();
        store
            .seed(Interface::Mobile, "mobile_v1.0.0_2025-08-27.json", "a")
            .unwrap();
        store
            .seed(Interface::WebFinancer, "web_financer_v1.0.0_2025-08-27.json", "c")
            .unwrap();

        let names = store.list_migrations(Interface::Mobile).await.unwrap();
        assert_eq!(
            names,
            vec![
                "mobile_v1.0.0_2025-08-27.json".to_string(),
                "mobile_v1.1.0_2025-09-01.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn checksum_tracks_current_bytes() {
        let store = InMemoryContentStore::new();
        store.seed(Interface::Mobile, "m.json", "before").unwrap();
        let before = store.checksum(Interface::Mobile, "m.json").await.unwrap();

        store.seed(Interface::Mobile, "m.json", "after").unwrap();
        let after = store.checksum(Interface::Mobile, "m.json").await.unwrap();

        assert_ne!(before, after);
        assert_eq!(after, tmx_content::ContentHash::compute(b"after"));
    }

    #[tokio::test]
    async fn read_path_rejects_malformed_paths() {
        let store = InMemoryContentStore::new();
        let err = store.read_path("backups/../etc").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
