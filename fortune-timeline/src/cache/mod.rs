//! Two-tier read-through cache for date-independent chart data
//!
//! # Architecture
//! - **Local tier** (`local`): bounded in-process map of decoded `Arc<RawChart>`
//! - **Shared tier** (`shared`): `SharedCacheStore` holding JSON payloads,
//!   visible to every request handler
//!
//! Lookups try local, then shared, then compute. Only the raw chart is cached:
//! it depends on the birth profile alone, so keys never include the reference
//! date and entries stay valid for the full raw TTL. Rankings are rebuilt from
//! the cached chart on every request.
//!
//! # Stampede Protection
//! Concurrent misses on the same key share one computation through a per-key
//! `OnceCell`. Late arrivals wait for the running computation instead of
//! starting their own. The cell is deregistered when its request finishes or
//! is cancelled; a waiter whose leader was cancelled runs the computation itself.
//!
//! # Failure Semantics
//! Shared-tier errors and undecodable payloads are logged as recoverable
//! `CacheUnavailable` warnings and the layer computes directly. A cache failure
//! never fails the request; only the computation's own error propagates.

pub mod local;
pub mod shared;

pub use local::LocalTier;
pub use shared::{InMemorySharedStore, SharedCacheStore, StoreError};

use crate::error::{FortuneError, FortuneResult};
use crate::types::{BirthProfile, RawChart};
use dashmap::DashMap;
use fortune_common::config::{CacheConfig, RankingConfig};
use fortune_common::time::secs_to_duration;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Prefix of every raw chart cache key; bump the version when `RawChart` changes shape
pub const KEY_PREFIX: &str = "fortune:raw:v1:";

/// Digest-based cache key for one birth profile and output shape
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key over the normalized profile plus the shape parameters
    pub fn for_profile(profile: &BirthProfile, ranking: &RankingConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(profile.normalized().as_bytes());
        hasher.update(
            format!(
                "|periods={}|cap={}",
                ranking.period_count, ranking.years_per_period_cap
            )
            .as_bytes(),
        );
        CacheKey(format!("{}{:x}", KEY_PREFIX, hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct Counters {
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    computations: AtomicU64,
    shared_failures: AtomicU64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub local_hits: u64,
    pub shared_hits: u64,
    pub computations: u64,
    pub shared_failures: u64,
}

type InflightMap = DashMap<CacheKey, Arc<OnceCell<Arc<RawChart>>>>;

/// Removes a key's in-flight cell when the owning request finishes or is dropped
struct InflightGuard<'a> {
    inflight: &'a InflightMap,
    key: &'a CacheKey,
    cell: Arc<OnceCell<Arc<RawChart>>>,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight
            .remove_if(self.key, |_, current| Arc::ptr_eq(current, &self.cell));
    }
}

/// Two-tier read-through cache with per-key computation guard
pub struct CacheLayer {
    local: LocalTier,
    shared: Arc<dyn SharedCacheStore>,
    raw_ttl: Duration,
    inflight: InflightMap,
    stats: Counters,
}

impl CacheLayer {
    pub fn new(config: &CacheConfig, shared: Arc<dyn SharedCacheStore>) -> Self {
        let raw_ttl = secs_to_duration(config.raw_cache_ttl_seconds);
        let local_ttl = secs_to_duration(config.local_ttl_seconds).min(raw_ttl);

        Self {
            local: LocalTier::new(config.local_capacity, local_ttl),
            shared,
            raw_ttl,
            inflight: DashMap::new(),
            stats: Counters::default(),
        }
    }

    /// Cache backed by a process-local shared store
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(config, Arc::new(InMemorySharedStore::new()))
    }

    /// Construct and probe the shared store
    ///
    /// An unreachable store does not prevent startup; requests fall back to
    /// direct computation until it recovers.
    pub async fn connect(config: &CacheConfig, shared: Arc<dyn SharedCacheStore>) -> Self {
        let layer = Self::new(config, shared);
        match layer.shared.ping().await {
            Ok(()) => info!(store = layer.shared.name(), "Shared cache tier connected"),
            Err(e) => warn!(
                store = layer.shared.name(),
                error = %e,
                "Shared cache tier unreachable at startup, running degraded"
            ),
        }
        layer
    }

    /// Return the cached chart for `key`, computing it at most once on a miss
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> FortuneResult<Arc<RawChart>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FortuneResult<RawChart>>,
    {
        if let Some(chart) = self.lookup(key).await {
            return Ok(chart);
        }

        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        // Deregisters the cell on completion and on cancellation alike
        let guard = InflightGuard {
            inflight: &self.inflight,
            key,
            cell,
        };

        let result = guard
            .cell
            .get_or_try_init(|| async move {
                // A computation that finished while we queued may have stored it
                if let Some(chart) = self.lookup(key).await {
                    return Ok(chart);
                }
                self.compute_and_store(key, compute).await
            })
            .await
            .map(Arc::clone);
        result
    }

    /// Drop `key` from both tiers
    pub async fn invalidate(&self, key: &CacheKey) {
        self.local.remove(key.as_str());
        if let Err(e) = self.shared.delete(key.as_str()).await {
            self.record_shared_failure(key, "delete", &e);
        }
    }

    /// Drop expired local entries
    pub fn purge_expired(&self) -> usize {
        self.local.purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            local_hits: self.stats.local_hits.load(Ordering::Relaxed),
            shared_hits: self.stats.shared_hits.load(Ordering::Relaxed),
            computations: self.stats.computations.load(Ordering::Relaxed),
            shared_failures: self.stats.shared_failures.load(Ordering::Relaxed),
        }
    }

    /// Release local entries and close the shared store
    pub async fn shutdown(&self) {
        self.local.clear();
        self.inflight.clear();
        self.shared.close().await;
        info!(store = self.shared.name(), "Cache layer shut down");
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Arc<RawChart>> {
        if let Some(chart) = self.local.get(key.as_str()) {
            self.stats.local_hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache_key = %key, "Local cache hit");
            return Some(chart);
        }

        let payload = match self.shared.get(key.as_str()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                self.record_shared_failure(key, "get", &e);
                return None;
            }
        };

        match serde_json::from_slice::<RawChart>(&payload) {
            Ok(chart) => {
                self.stats.shared_hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = %key, "Shared cache hit");
                let chart = Arc::new(chart);
                self.local.insert(key.as_str(), Arc::clone(&chart));
                Some(chart)
            }
            Err(e) => {
                let error = FortuneError::CacheUnavailable(format!("undecodable payload: {}", e));
                self.stats.shared_failures.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = %key, error = %error, "Ignoring shared cache entry");
                None
            }
        }
    }

    async fn compute_and_store<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> FortuneResult<Arc<RawChart>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FortuneResult<RawChart>>,
    {
        self.stats.computations.fetch_add(1, Ordering::Relaxed);
        debug!(cache_key = %key, "Cache miss, computing raw chart");

        let chart = Arc::new(compute().await?);
        self.local.insert(key.as_str(), Arc::clone(&chart));

        match serde_json::to_vec(chart.as_ref()) {
            Ok(payload) => {
                if let Err(e) = self.shared.set(key.as_str(), payload, self.raw_ttl).await {
                    self.record_shared_failure(key, "set", &e);
                }
            }
            Err(e) => warn!(cache_key = %key, error = %e, "Failed to encode raw chart for shared tier"),
        }

        Ok(chart)
    }

    fn record_shared_failure(&self, key: &CacheKey, operation: &str, e: &StoreError) {
        self.stats.shared_failures.fetch_add(1, Ordering::Relaxed);
        let error = FortuneError::CacheUnavailable(e.to_string());
        warn!(
            cache_key = %key,
            store = self.shared.name(),
            operation,
            error = %error,
            "Shared cache tier failed, falling back to direct computation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::mock::sample_chart;
    use async_trait::async_trait;

    fn profile(date: &str) -> BirthProfile {
        BirthProfile::parse(date, "14:30", "male", "solar").unwrap()
    }

    /// Store whose every call fails
    struct DownStore;

    #[async_trait]
    impl SharedCacheStore for DownStore {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::Unreachable("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unreachable("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unreachable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unreachable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_key_is_stable_and_prefixed() {
        let ranking = RankingConfig::default();
        let a = CacheKey::for_profile(&profile("1990-05-15"), &ranking);
        let b = CacheKey::for_profile(&profile("1990-05-15"), &ranking);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with(KEY_PREFIX));
        assert_eq!(a.as_str().len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn test_key_varies_with_profile_and_shape() {
        let ranking = RankingConfig::default();
        let base = CacheKey::for_profile(&profile("1990-05-15"), &ranking);
        assert_ne!(base, CacheKey::for_profile(&profile("1990-05-16"), &ranking));

        let capped = RankingConfig {
            years_per_period_cap: 5,
            ..RankingConfig::default()
        };
        assert_ne!(base, CacheKey::for_profile(&profile("1990-05-15"), &capped));
    }

    #[tokio::test]
    async fn test_second_read_hits_local_tier() {
        let cache = CacheLayer::in_memory(&CacheConfig::default());
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());

        let first = cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();
        let second = cache
            .get_or_compute(&key, || async { panic!("must not recompute") })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.local_hits, 1);
    }

    #[tokio::test]
    async fn test_shared_tier_serves_fresh_local_tier() {
        let shared: Arc<dyn SharedCacheStore> = Arc::new(InMemorySharedStore::new());
        let config = CacheConfig::default();
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());

        let writer = CacheLayer::new(&config, Arc::clone(&shared));
        writer.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();

        // A second handler with an empty local tier reads the shared entry
        let reader = CacheLayer::new(&config, shared);
        let chart = reader
            .get_or_compute(&key, || async { panic!("must not recompute") })
            .await
            .unwrap();
        assert_eq!(*chart, sample_chart());
        assert_eq!(reader.stats().shared_hits, 1);
    }

    #[tokio::test]
    async fn test_unreachable_shared_tier_falls_back_to_compute() {
        let cache = CacheLayer::connect(&CacheConfig::default(), Arc::new(DownStore)).await;
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());

        let chart = cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();
        assert_eq!(*chart, sample_chart());

        let stats = cache.stats();
        assert_eq!(stats.computations, 1);
        // get before compute, get re-check inside the guard, set after compute
        assert_eq!(stats.shared_failures, 3);
    }

    #[tokio::test]
    async fn test_undecodable_shared_payload_is_recomputed() {
        let shared = Arc::new(InMemorySharedStore::new());
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());
        shared
            .set(key.as_str(), b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let cache = CacheLayer::new(&CacheConfig::default(), shared);
        let chart = cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();
        assert_eq!(*chart, sample_chart());
        assert_eq!(cache.stats().computations, 1);
    }

    #[tokio::test]
    async fn test_compute_error_propagates_and_is_not_cached() {
        let cache = CacheLayer::in_memory(&CacheConfig::default());
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());

        let result = cache
            .get_or_compute(&key, || async {
                Err(FortuneError::MissingBaseChart("engine down".to_string()))
            })
            .await;
        assert!(matches!(result, Err(FortuneError::MissingBaseChart(_))));

        let chart = cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();
        assert_eq!(*chart, sample_chart());
        assert_eq!(cache.stats().computations, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache = CacheLayer::in_memory(&CacheConfig::default());
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());

        cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();
        cache.invalidate(&key).await;
        cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();

        assert_eq!(cache.stats().computations, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_compute_once() {
        let cache = Arc::new(CacheLayer::in_memory(&CacheConfig::default()));
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());

        let mut join_set = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            join_set.spawn(async move {
                cache
                    .get_or_compute(&key, || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(sample_chart())
                    })
                    .await
                    .unwrap()
            });
        }

        while let Some(result) = join_set.join_next().await {
            assert_eq!(*result.expect("Task panicked"), sample_chart());
        }
        assert_eq!(cache.stats().computations, 1);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_requests_release_inflight_cells() {
        let cache = CacheLayer::in_memory(&CacheConfig::default());
        let ranking = RankingConfig::default();

        for day in 1..=20 {
            let key = CacheKey::for_profile(&profile(&format!("1990-05-{:02}", day)), &ranking);
            let result = tokio::time::timeout(
                Duration::from_millis(5),
                cache.get_or_compute(&key, || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(sample_chart())
                }),
            )
            .await;
            assert!(result.is_err(), "Computation should have been cancelled");
        }

        assert!(cache.inflight.is_empty());
        assert_eq!(cache.stats().computations, 20);
    }

    #[tokio::test]
    async fn test_waiter_takes_over_after_leader_cancelled() {
        let cache = Arc::new(CacheLayer::in_memory(&CacheConfig::default()));
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());

        let leader = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(&key, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(sample_chart())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move {
                cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let chart = waiter.await.expect("Task panicked").unwrap();
        assert_eq!(*chart, sample_chart());
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_store_and_degrades() {
        let cache = CacheLayer::in_memory(&CacheConfig::default());
        let key = CacheKey::for_profile(&profile("1990-05-15"), &RankingConfig::default());
        cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();

        cache.shutdown().await;

        // Still answers, by recomputing
        let chart = cache.get_or_compute(&key, || async { Ok(sample_chart()) }).await.unwrap();
        assert_eq!(*chart, sample_chart());
        assert_eq!(cache.stats().computations, 2);
    }
}
