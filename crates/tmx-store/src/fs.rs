//! Filesystem content store
//!
//! Maps object keys onto files below a root directory. Writes go to a
//! sibling temporary file first and are renamed into place, so readers never
//! observe a partially written blob.

use crate::error::StoreError;
use crate::store::ContentStore;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tmx_content::{ContentFormat, ObjectKey};

const PARTIAL_SUFFIX: &str = ".partial";

/// Content store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Create store rooted at `root`. The directory is created lazily.
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &ObjectKey) -> PathBuf {
        key.segments()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(StoreError::io(key.as_str(), e)),
        }
    }

    async fn put(
        &self,
        key: &ObjectKey,
        content: &[u8],
        format: ContentFormat,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(key.as_str(), e))?;
        }

        let mut partial = path.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        tokio::fs::write(&partial, content)
            .await
            .map_err(|e| StoreError::io(key.as_str(), e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| StoreError::io(key.as_str(), e))?;

        tracing::trace!(key = %key, format = %format, size = content.len(), "blob written");
        Ok(())
    }

    async fn contains(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .map_err(|e| StoreError::io(key.as_str(), e))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<ObjectKey>, StoreError> {
        let dir = prefix
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment));

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(prefix, e)),
        };

        let mut keys: Vec<ObjectKey> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(prefix, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io(prefix, e))?
                .is_file();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_file || name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            let key: ObjectKey = format!("{prefix}{name}").parse()?;
            keys.push(key);
        }
        keys.sort();
        Ok(keys)
    }
}
