//! Upstream chart engine interface
//!
//! The calendar/astrology engine lives outside this crate. Everything the
//! ranking layer needs from it goes through the `ChartEngine` trait, whose
//! methods are pure functions of a `BirthProfile`.
//!
//! `JsonChartEngine` serves precomputed engine output from a JSON file; the
//! CLI uses it, and it doubles as a fixture source in tests.

use crate::error::FortuneResult;
use crate::types::{BalanceAnalysis, BirthProfile, PillarAnalysis, RawChart};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Failure reported by an upstream computation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Engine could not be reached or timed out
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// Engine has no data for this profile
    #[error("No upstream data: {0}")]
    NotFound(String),

    /// Engine returned data that failed validation
    #[error("Invalid upstream data: {0}")]
    Invalid(String),
}

/// Upstream chart engine
///
/// # Example
/// ```rust,ignore
/// struct RemoteEngine { client: reqwest::Client }
///
/// #[async_trait::async_trait]
/// impl ChartEngine for RemoteEngine {
///     fn name(&self) -> &'static str { "remote" }
///     async fn base_chart(&self, profile: &BirthProfile) -> Result<RawChart, UpstreamError> { ... }
///     async fn balance_analysis(&self, profile: &BirthProfile) -> Result<BalanceAnalysis, UpstreamError> { ... }
///     async fn pillar_analysis(&self, profile: &BirthProfile) -> Result<PillarAnalysis, UpstreamError> { ... }
/// }
/// ```
#[async_trait]
pub trait ChartEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Pillars plus the raw ordered period list and flat notable-year list
    async fn base_chart(&self, profile: &BirthProfile) -> Result<RawChart, UpstreamError>;

    /// Day-master balance / strength analysis
    async fn balance_analysis(
        &self,
        profile: &BirthProfile,
    ) -> Result<BalanceAnalysis, UpstreamError>;

    /// Detailed per-pillar analysis
    async fn pillar_analysis(&self, profile: &BirthProfile)
        -> Result<PillarAnalysis, UpstreamError>;
}

/// On-disk form of precomputed engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSnapshot {
    pub chart: RawChart,
    #[serde(default)]
    pub balance: Option<BalanceAnalysis>,
    #[serde(default)]
    pub pillars: Option<PillarAnalysis>,
}

/// Chart engine backed by a precomputed JSON snapshot
pub struct JsonChartEngine {
    snapshot: UpstreamSnapshot,
}

impl JsonChartEngine {
    pub fn new(snapshot: UpstreamSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot file
    pub async fn load(path: &Path) -> FortuneResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(fortune_common::Error::from)?;
        let snapshot: UpstreamSnapshot = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            periods = snapshot.chart.periods.len(),
            years = snapshot.chart.years.len(),
            "Loaded upstream snapshot"
        );
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl ChartEngine for JsonChartEngine {
    fn name(&self) -> &'static str {
        "json-snapshot"
    }

    async fn base_chart(&self, _profile: &BirthProfile) -> Result<RawChart, UpstreamError> {
        Ok(self.snapshot.chart.clone())
    }

    async fn balance_analysis(
        &self,
        _profile: &BirthProfile,
    ) -> Result<BalanceAnalysis, UpstreamError> {
        self.snapshot
            .balance
            .clone()
            .ok_or_else(|| UpstreamError::NotFound("snapshot has no balance analysis".to_string()))
    }

    async fn pillar_analysis(
        &self,
        _profile: &BirthProfile,
    ) -> Result<PillarAnalysis, UpstreamError> {
        self.snapshot
            .pillars
            .clone()
            .ok_or_else(|| UpstreamError::NotFound("snapshot has no pillar analysis".to_string()))
    }
}

// ============================================================================
// Mock Engine for Testing
// ============================================================================
