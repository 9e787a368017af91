//! Content store with switchable faults

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tmx_content::{ContentFormat, ObjectKey};
use tmx_store::{ContentStore, InMemoryContentStore, StoreError};

const LIVE_ARTIFACT: &str = "current.json";

/// In-memory store whose reads and writes can be made to fail on demand.
///
/// - `reject_live_writes`: writes to the live artifact return `WriteRejected`
/// - `fault_payload_reads`: reads of migration payloads return `Unavailable`
/// - `fault_backup_reads`: reads under `backups/` return `Unavailable`
/// - `fault_backup_writes`: writes under `backups/` return `Unavailable`
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryContentStore,
    reject_live_writes: AtomicBool,
    fault_payload_reads: AtomicBool,
    fault_backup_reads: AtomicBool,
    fault_backup_writes: AtomicBool,
    write_delay_ms: AtomicU64,
    live_writes: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backing store, for seeding and inspection
    pub fn inner(&self) -> &InMemoryContentStore {
        &self.inner
    }

    pub fn reject_live_writes(&self, enabled: bool) {
        self.reject_live_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn fault_payload_reads(&self, enabled: bool) {
        self.fault_payload_reads.store(enabled, Ordering::SeqCst);
    }

    pub fn fault_backup_reads(&self, enabled: bool) {
        self.fault_backup_reads.store(enabled, Ordering::SeqCst);
    }

    pub fn fault_backup_writes(&self, enabled: bool) {
        self.fault_backup_writes.store(enabled, Ordering::SeqCst);
    }

    /// Sleep before every write, widening race windows
    pub fn delay_writes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of successful writes to a live artifact
    pub fn live_writes(&self) -> usize {
        self.live_writes.load(Ordering::SeqCst)
    }

    fn is_backup(key: &ObjectKey) -> bool {
        key.as_str().starts_with("backups/")
    }

    fn is_live(key: &ObjectKey) -> bool {
        !Self::is_backup(key) && key.file_name() == LIVE_ARTIFACT
    }
}

#[async_trait]
impl ContentStore for FaultyStore {
    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        if Self::is_backup(key) && self.fault_backup_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected read fault: {key}")));
        }
        if !Self::is_backup(key)
            && !Self::is_live(key)
            && self.fault_payload_reads.load(Ordering::SeqCst)
        {
            return Err(StoreError::Unavailable(format!("injected read fault: {key}")));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &ObjectKey, content: &[u8], format: ContentFormat) -> Result<(), StoreError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if Self::is_backup(key) && self.fault_backup_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected write fault: {key}")));
        }
        if Self::is_live(key) {
            if self.reject_live_writes.load(Ordering::SeqCst) {
                return Err(StoreError::write_rejected(key.as_str(), "injected rejection"));
            }
            self.live_writes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.put(key, content, format).await
    }

    async fn contains(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        self.inner.contains(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<ObjectKey>, StoreError> {
        self.inner.keys(prefix).await
    }
}
