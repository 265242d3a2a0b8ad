//! Date-dependent ranking stages
//!
//! Turns a cached, date-independent `RawChart` into an `EnhancedFortuneView`
//! for one reference date. Everything here is pure and synchronous; it runs on
//! every request and its output is never cached.
//!
//! # Stages
//! 1. **age** - nominal age at the reference date
//! 2. **locator** - period containing that age
//! 3. **selector** - N periods ranked outward from the current one
//! 4. **aggregator** - per-period notable years, ranked and truncated
//!    (type priorities from **classifier**)
//! 5. **builder** - tiers, life stages and the priority policy block

pub mod age;
pub mod aggregator;
pub mod builder;
pub mod classifier;
pub mod locator;
pub mod selector;

use crate::error::{FortuneError, FortuneResult};
use crate::types::{EnhancedFortuneView, RawChart};
use builder::ViewContext;
use chrono::NaiveDate;
use fortune_common::config::RankingConfig;
use tracing::debug;

/// Rank a raw chart for `reference_date`
pub fn rank_timeline(
    chart: &RawChart,
    birth_date: NaiveDate,
    reference_date: NaiveDate,
    config: &RankingConfig,
) -> FortuneResult<EnhancedFortuneView> {
    let nominal_age = age::virtual_age(birth_date, reference_date);
    let location = locator::locate_current_period(&chart.periods, nominal_age)?;

    // The current period is always returned, whatever the configured count
    let stubs = selector::select_periods(&chart.periods, location.position, config.period_count.max(1));

    let mut populated = stubs
        .into_iter()
        .map(|stub| aggregator::attach_years(stub, &chart.years, config.years_per_period_cap));
    let current = populated.next().ok_or(FortuneError::EmptyPeriodSequence)?;
    let key_periods: Vec<_> = populated.collect();

    debug!(
        nominal_age,
        current_index = current.stub.period.index,
        placement = ?location.placement,
        key_periods = key_periods.len(),
        "Ranked fortune timeline"
    );

    Ok(builder::build_view(
        current,
        key_periods,
        ViewContext {
            reference_date,
            nominal_age,
            placement: location.placement,
            period_count: config.period_count,
            years_per_period_cap: config.years_per_period_cap,
        },
    ))
}

// ============================================================================
// Test Fixtures
// ============================================================================


#[cfg(test)]
mod tests {
    use super::test_support::{periods, year};
    use super::*;
    use crate::types::{FourPillars, Placement};

    fn chart() -> RawChart {
        RawChart {
            pillars: FourPillars {
                year: "庚午".to_string(),
                month: "辛巳".to_string(),
                day: "甲子".to_string(),
                hour: "辛未".to_string(),
            },
            day_master: "甲".to_string(),
            periods: periods(9, 6),
            years: vec![
                year(2025, 3, "critical_clash"),
                year(2028, 3, "other"),
                year(2038, 4, "harmonious_combination"),
                year(2020, 2, "coincident_cycle"),
            ],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reference_scenario_priorities() {
        let config = RankingConfig::default();
        let view = rank_timeline(&chart(), date(1990, 5, 15), date(2025, 6, 1), &config).unwrap();

        assert_eq!(view.nominal_age, 36);
        assert!(view.current_period.period.contains_age(36));
        assert_eq!(view.current_period.period.index, 3);
        assert_eq!(view.key_periods[0].period.index, 4);
        assert_eq!(view.key_periods[0].priority, 2);
        assert_eq!(view.key_periods[1].period.index, 2);
        assert_eq!(view.key_periods[1].priority, 3);
    }

    #[test]
    fn test_period_count_clamped_to_available() {
        let config = RankingConfig {
            period_count: 20,
            years_per_period_cap: 3,
        };
        let view = rank_timeline(&chart(), date(1990, 5, 15), date(2025, 6, 1), &config).unwrap();
        assert_eq!(view.key_periods.len() + 1, 9);
    }

    #[test]
    fn test_years_stay_with_their_period() {
        let view = rank_timeline(
            &chart(),
            date(1990, 5, 15),
            date(2025, 6, 1),
            &RankingConfig::default(),
        )
        .unwrap();

        for ranked in view.ranked_periods() {
            for y in &ranked.years {
                assert_eq!(y.summary.period_index, ranked.period.index);
            }
        }
        assert_eq!(view.total_years(), 4);
    }

    #[test]
    fn test_placement_recorded_when_clamped() {
        let view = rank_timeline(
            &chart(),
            date(1990, 5, 15),
            date(1992, 1, 1),
            &RankingConfig::default(),
        )
        .unwrap();
        assert_eq!(view.current_period.period.index, 0);
        assert_eq!(view.priority_policy.current_placement, Placement::BeforeFirst);
    }

    #[test]
    fn test_empty_chart_is_error() {
        let mut empty = chart();
        empty.periods.clear();
        let result = rank_timeline(
            &empty,
            date(1990, 5, 15),
            date(2025, 6, 1),
            &RankingConfig::default(),
        );
        assert!(matches!(result, Err(FortuneError::EmptyPeriodSequence)));
    }
}
