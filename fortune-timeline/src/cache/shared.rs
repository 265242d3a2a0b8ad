//! Shared cache tier
//!
//! The shared tier is visible to every request handler (and, in a deployment,
//! every process). Implementations store opaque JSON payloads with a TTL.
//! Any method may fail; the cache layer treats failures as recoverable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared store failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Store cannot be reached (network down, closed client)
    #[error("Store unreachable: {0}")]
    Unreachable(String),

}

/// Distributed key/value store backing the shared tier
#[async_trait]
pub trait SharedCacheStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Connectivity probe used at startup
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release connections; later calls may fail with `Unreachable`
    async fn close(&self) {}
}

/// Writes between full sweeps of expired entries
const SWEEP_INTERVAL: usize = 64;

/// Stored payload; `expires_at` of `None` never expires
struct StoredEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// In-process shared store
///
/// Shared across all handlers of one process. Stands in for a distributed
/// store in single-node deployments and tests. Expired entries are dropped
/// when read, on every `SWEEP_INTERVAL`-th write, and by `purge_expired`.
pub struct InMemorySharedStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    closed: AtomicBool,
    writes: AtomicUsize,
}

impl InMemorySharedStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unreachable("store closed".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemorySharedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedCacheStore for InMemorySharedStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it
        let mut entries = self.entries.write().await;
        if matches!(entries.get(key), Some(entry) if !entry.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        // A TTL past the clock's range means the entry never expires
        let expires_at = Instant::now().checked_add(ttl);

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            let purged = self.purge_expired().await;
            if purged > 0 {
                debug!(purged, "Swept expired shared cache entries");
            }
        }

        self.entries
            .write()
            .await
            .insert(key.to_string(), StoredEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.entries.write().await.clear();
    }
}
