//! Request pipeline
//!
//! Composes fetch, cache and ranking under one deadline:
//!
//! ```text
//! BirthProfile ──► ParallelFetchCoordinator ──► UpstreamBundle
//!                  (CacheLayer for base chart)        │
//!                                                     ▼
//!                 FortuneReport ◄── rank_timeline(reference_date)
//! ```
//!
//! The pipeline owns no global state. Callers construct the cache layer and
//! engine and hand them in; one pipeline serves any number of concurrent
//! requests.

use crate::cache::{CacheLayer, CacheStats};
use crate::error::{FortuneError, FortuneResult};
use crate::fetch::ParallelFetchCoordinator;
use crate::ranking::rank_timeline;
use crate::types::{BirthProfile, FortuneReport};
use crate::upstream::ChartEngine;
use chrono::NaiveDate;
use fortune_common::config::{RankingConfig, TomlConfig};
use fortune_common::time::millis_to_duration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

pub struct FortunePipeline {
    fetcher: ParallelFetchCoordinator,
    cache: Arc<CacheLayer>,
    ranking: RankingConfig,
    deadline: Duration,
}

impl FortunePipeline {
    pub fn new(engine: Arc<dyn ChartEngine>, cache: Arc<CacheLayer>, config: &TomlConfig) -> Self {
        let fetcher = ParallelFetchCoordinator::new(
            engine,
            Arc::clone(&cache),
            config.ranking.clone(),
            config.pipeline.max_concurrent_fetches,
        );

        Self {
            fetcher,
            cache,
            ranking: config.ranking.clone(),
            deadline: millis_to_duration(config.pipeline.deadline_ms),
        }
    }

    /// Produce the ranked report for `profile`
    ///
    /// `reference_date` defaults to today's local date. The whole request,
    /// upstream fetches included, must finish within the configured deadline.
    pub async fn generate(
        &self,
        profile: &BirthProfile,
        reference_date: Option<NaiveDate>,
    ) -> FortuneResult<FortuneReport> {
        self.generate_within(profile, reference_date, None).await
    }

    /// Like [`generate`](Self::generate), bounded by the caller's remaining budget
    ///
    /// The effective deadline is the shorter of `budget` and the configured one.
    pub async fn generate_within(
        &self,
        profile: &BirthProfile,
        reference_date: Option<NaiveDate>,
        budget: Option<Duration>,
    ) -> FortuneResult<FortuneReport> {
        let reference_date = reference_date.unwrap_or_else(fortune_common::time::today);
        profile.check_reference_date(reference_date)?;

        let deadline = budget.map_or(self.deadline, |budget| budget.min(self.deadline));
        let span = info_span!(
            "fortune_request",
            request_id = %Uuid::new_v4(),
            reference_date = %reference_date,
            deadline_ms = deadline.as_millis() as u64
        );

        tokio::time::timeout(deadline, self.run(profile, reference_date))
            .instrument(span)
            .await
            .map_err(|_| FortuneError::DeadlineExceeded(deadline))?
    }

    async fn run(
        &self,
        profile: &BirthProfile,
        reference_date: NaiveDate,
    ) -> FortuneResult<FortuneReport> {
        let bundle = self.fetcher.fetch(profile).await?;
        let view = rank_timeline(
            &bundle.chart,
            profile.birth_date(),
            reference_date,
            &self.ranking,
        )?;

        debug!(
            nominal_age = view.nominal_age,
            current_period = view.current_period.period.index,
            total_years = view.total_years(),
            "Fortune report assembled"
        );

        Ok(FortuneReport {
            view,
            pillars: bundle.chart.pillars.clone(),
            balance: bundle.balance,
            pillar_analysis: bundle.pillar_analysis,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stop accepting fetches and release cache resources
    pub async fn shutdown(&self) {
        self.fetcher.close();
        self.cache.shutdown().await;
        info!("Fortune pipeline shut down");
    }
}
