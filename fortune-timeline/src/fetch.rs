//! Parallel fetch coordinator
//!
//! Fans one request out to the chart engine's three computations and joins
//! them. The base chart goes through the cache layer and is required; the two
//! analysis sections are optional and degrade to `Section::Absent`.
//!
//! Every upstream call holds a permit from a semaphore shared by all requests,
//! which bounds total in-flight engine work for the process.

use crate::cache::{CacheKey, CacheLayer};
use crate::error::{FortuneError, FortuneResult};
use crate::types::{BalanceAnalysis, BirthProfile, PillarAnalysis, RawChart, Section};
use crate::upstream::{ChartEngine, UpstreamError};
use fortune_common::config::RankingConfig;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Joined upstream results for one request
#[derive(Debug, Clone)]
pub struct UpstreamBundle {
    pub chart: Arc<RawChart>,
    pub balance: Section<BalanceAnalysis>,
    pub pillar_analysis: Section<PillarAnalysis>,
}

pub struct ParallelFetchCoordinator {
    engine: Arc<dyn ChartEngine>,
    cache: Arc<CacheLayer>,
    ranking: RankingConfig,
    permits: Arc<Semaphore>,
}

impl ParallelFetchCoordinator {
    pub fn new(
        engine: Arc<dyn ChartEngine>,
        cache: Arc<CacheLayer>,
        ranking: RankingConfig,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            engine,
            cache,
            ranking,
            permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        }
    }

    /// Fetch the base chart and both analysis sections concurrently
    ///
    /// # Errors
    /// - `MissingBaseChart` if the engine fails to produce a base chart
    /// - `EmptyPeriodSequence` if the base chart has no major periods
    pub async fn fetch(&self, profile: &BirthProfile) -> FortuneResult<UpstreamBundle> {
        let key = CacheKey::for_profile(profile, &self.ranking);

        let (chart, balance, pillar_analysis) = tokio::join!(
            self.fetch_base(&key, profile),
            self.fetch_optional("balance", || self.engine.balance_analysis(profile)),
            self.fetch_optional("pillar_analysis", || self.engine.pillar_analysis(profile)),
        );

        let chart = chart?;
        // Shared-tier entries may come from another writer
        if chart.periods.is_empty() {
            return Err(FortuneError::EmptyPeriodSequence);
        }

        debug!(
            cache_key = %key,
            periods = chart.periods.len(),
            years = chart.years.len(),
            balance = balance.is_present(),
            pillar_analysis = pillar_analysis.is_present(),
            "Upstream fetch complete"
        );

        Ok(UpstreamBundle {
            chart,
            balance,
            pillar_analysis,
        })
    }

    async fn fetch_base(
        &self,
        key: &CacheKey,
        profile: &BirthProfile,
    ) -> FortuneResult<Arc<RawChart>> {
        self.cache
            .get_or_compute(key, || async {
                let _permit = self.permits.acquire().await.map_err(|_| {
                    FortuneError::MissingBaseChart("fetch coordinator closed".to_string())
                })?;

                let chart = self.engine.base_chart(profile).await.map_err(|e| {
                    warn!(engine = self.engine.name(), error = %e, "Base chart computation failed");
                    FortuneError::MissingBaseChart(e.to_string())
                })?;

                if chart.periods.is_empty() {
                    return Err(FortuneError::EmptyPeriodSequence);
                }
                Ok(chart)
            })
            .await
    }

    async fn fetch_optional<T, F, Fut>(&self, section: &'static str, call: F) -> Section<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Section::Absent {
                    reason: "fetch coordinator closed".to_string(),
                }
            }
        };

        match call().await {
            Ok(data) => Section::Present { data },
            Err(e) => {
                let error = FortuneError::PartialUpstreamFailure {
                    section,
                    reason: e.to_string(),
                };
                warn!(
                    engine = self.engine.name(),
                    section,
                    error = %error,
                    "Optional upstream section unavailable"
                );
                Section::Absent {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Stop handing out permits; later fetches fail fast
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::mock::{sample_chart, MockEngine};
    use fortune_common::config::CacheConfig;

    fn profile() -> BirthProfile {
        BirthProfile::parse("1990-05-15", "14:30", "male", "solar").unwrap()
    }

    fn coordinator(engine: MockEngine) -> (Arc<MockEngine>, ParallelFetchCoordinator) {
        let engine = Arc::new(engine);
        let cache = Arc::new(CacheLayer::in_memory(&CacheConfig::default()));
        let coordinator = ParallelFetchCoordinator::new(
            Arc::clone(&engine) as Arc<dyn ChartEngine>,
            cache,
            RankingConfig::default(),
            4,
        );
        (engine, coordinator)
    }

    #[tokio::test]
    async fn test_all_sections_present() {
        let (_, coordinator) = coordinator(MockEngine::new());
        let bundle = coordinator.fetch(&profile()).await.unwrap();

        assert_eq!(*bundle.chart, sample_chart());
        assert!(bundle.balance.is_present());
        assert!(bundle.pillar_analysis.is_present());
    }

    #[tokio::test]
    async fn test_optional_failures_become_absent() {
        let (_, coordinator) = coordinator(MockEngine {
            fail_balance: true,
            fail_pillars: true,
            ..MockEngine::new()
        });
        let bundle = coordinator.fetch(&profile()).await.unwrap();

        assert!(!bundle.balance.is_present());
        match &bundle.pillar_analysis {
            Section::Absent { reason } => assert!(reason.contains("mock pillar failure")),
            Section::Present { .. } => panic!("Expected absent pillar analysis"),
        }
    }

    #[tokio::test]
    async fn test_base_failure_is_fatal() {
        let (_, coordinator) = coordinator(MockEngine {
            fail_base: true,
            ..MockEngine::new()
        });
        let result = coordinator.fetch(&profile()).await;
        assert!(matches!(result, Err(FortuneError::MissingBaseChart(_))));
    }

    #[tokio::test]
    async fn test_empty_periods_are_fatal_and_not_cached() {
        let mut chart = sample_chart();
        chart.periods.clear();
        let (engine, coordinator) = coordinator(MockEngine {
            chart,
            ..MockEngine::new()
        });

        for _ in 0..2 {
            let result = coordinator.fetch(&profile()).await;
            assert!(matches!(result, Err(FortuneError::EmptyPeriodSequence)));
        }
        assert_eq!(engine.base_calls(), 2);
    }

    #[tokio::test]
    async fn test_base_chart_served_from_cache() {
        let (engine, coordinator) = coordinator(MockEngine::new());
        let first = coordinator.fetch(&profile()).await.unwrap();
        let second = coordinator.fetch(&profile()).await.unwrap();

        assert!(Arc::ptr_eq(&first.chart, &second.chart));
        assert_eq!(engine.base_calls(), 1);
    }

    #[tokio::test]
    async fn test_closed_coordinator_fails_fast() {
        let (_, coordinator) = coordinator(MockEngine::new());
        coordinator.close();

        let result = coordinator.fetch(&profile()).await;
        assert!(matches!(result, Err(FortuneError::MissingBaseChart(_))));
    }
}
