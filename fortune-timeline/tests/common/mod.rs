//! Shared fixtures for fortune-timeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use fortune_timeline::cache::{SharedCacheStore, StoreError};
use fortune_timeline::types::{
    BalanceAnalysis, FourPillars, Period, PillarAnalysis, PillarDetail, RawChart, SpecialYear,
    YearDetail,
};
use fortune_timeline::{BirthProfile, ChartEngine, UpstreamError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BIRTH_YEAR: i32 = 1990;

pub fn profile() -> BirthProfile {
    BirthProfile::parse("1990-05-15", "14:30", "male", "solar").unwrap()
}

/// `count` consecutive ten-year periods starting at nominal age `first_start_age`
pub fn periods(count: u32, first_start_age: u32) -> Vec<Arc<Period>> {
    (0..count)
        .map(|index| {
            let start_age = first_start_age + index * 10;
            let start_year = BIRTH_YEAR + start_age as i32 - 1;
            Arc::new(Period {
                index,
                label: format!("运{}", index),
                start_year,
                end_year: start_year + 9,
                start_age,
                end_age: start_age + 9,
                influence: "偏财".to_string(),
            })
        })
        .collect()
}

pub fn special_year(year: i32, period_index: u32, relation: &str) -> SpecialYear {
    SpecialYear {
        year,
        label: "丙午".to_string(),
        age: (year - BIRTH_YEAR + 1) as u32,
        relation: relation.to_string(),
        period_index,
        detail: YearDetail {
            notes: vec![format!("{} in period {}", relation, period_index)],
            ..YearDetail::default()
        },
    }
}

/// Nine periods from age 6, with notable years spread across every period
pub fn rich_chart() -> RawChart {
    let relations = [
        "critical_clash",
        "other",
        "harmonious_combination",
        "coincident_cycle",
        "other",
    ];
    let periods = periods(9, 6);
    let mut years = Vec::new();
    for period in &periods {
        for (offset, relation) in relations.iter().enumerate() {
            years.push(special_year(
                period.start_year + offset as i32 * 2,
                period.index,
                relation,
            ));
        }
    }

    RawChart {
        pillars: FourPillars {
            year: "庚午".to_string(),
            month: "辛巳".to_string(),
            day: "甲子".to_string(),
            hour: "辛未".to_string(),
        },
        day_master: "甲".to_string(),
        periods,
        years,
    }
}

/// Engine serving a fixed chart, with per-section failure switches
pub struct StaticEngine {
    pub chart: RawChart,
    pub fail_base: bool,
    pub fail_balance: bool,
    pub fail_pillars: bool,
    pub delay: Duration,
    pub base_calls: AtomicUsize,
}

impl StaticEngine {
    pub fn new(chart: RawChart) -> Self {
        Self {
            chart,
            fail_base: false,
            fail_balance: false,
            fail_pillars: false,
            delay: Duration::ZERO,
            base_calls: AtomicUsize::new(0),
        }
    }

    pub fn base_calls(&self) -> usize {
        self.base_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartEngine for StaticEngine {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn base_chart(&self, _profile: &BirthProfile) -> Result<RawChart, UpstreamError> {
        self.base_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_base {
            return Err(UpstreamError::Unavailable("engine offline".to_string()));
        }
        Ok(self.chart.clone())
    }

    async fn balance_analysis(
        &self,
        _profile: &BirthProfile,
    ) -> Result<BalanceAnalysis, UpstreamError> {
        if self.fail_balance {
            return Err(UpstreamError::Unavailable("balance timed out".to_string()));
        }
        Ok(BalanceAnalysis {
            day_master_strength: "balanced".to_string(),
            strength_score: 51.0,
            favorable_elements: vec!["fire".to_string()],
            unfavorable_elements: vec!["water".to_string()],
        })
    }

    async fn pillar_analysis(
        &self,
        _profile: &BirthProfile,
    ) -> Result<PillarAnalysis, UpstreamError> {
        if self.fail_pillars {
            return Err(UpstreamError::Invalid("pillar payload rejected".to_string()));
        }
        Ok(PillarAnalysis {
            pillars: vec![PillarDetail {
                position: "year".to_string(),
                stem: "庚".to_string(),
                branch: "午".to_string(),
                ten_god: "七杀".to_string(),
                hidden_stems: vec!["丁".to_string(), "己".to_string()],
            }],
        })
    }
}

/// Shared store that is always unreachable
pub struct UnreachableStore;

#[async_trait]
impl SharedCacheStore for UnreachableStore {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unreachable("no route to host".to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("no route to host".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("no route to host".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("no route to host".to_string()))
    }
}
