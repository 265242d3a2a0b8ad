//! Local (in-process) cache tier
//!
//! Small bounded map of decoded charts keyed by cache key. Reads go through
//! `DashMap` shards without a global lock, so concurrent requests for
//! different profiles never contend.

use crate::types::RawChart;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

struct LocalEntry {
    value: Arc<RawChart>,
    inserted_at: Instant,
}

/// Bounded, TTL-expiring local tier
pub struct LocalTier {
    entries: DashMap<String, LocalEntry>,
    capacity: usize,
    ttl: Duration,
}

impl LocalTier {
    /// A capacity of zero disables the tier
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<RawChart>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries
                .remove_if(key, |_, entry| entry.inserted_at.elapsed() >= self.ttl);
        }
        None
    }

    pub fn insert(&self, key: &str, value: Arc<RawChart>) {
        if self.capacity == 0 {
            return;
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.purge_expired();
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            key.to_string(),
            LocalEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            debug!(cache_key = %key, "Evicting oldest local cache entry");
            self.entries.remove(&key);
        }
    }
}
