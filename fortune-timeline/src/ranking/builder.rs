//! Enhanced structure builder
//!
//! Composes populated periods into the `EnhancedFortuneView` and attaches the
//! human-facing labels: a life stage per period and a narrative tier per period
//! and year. Tiers are metadata only. The verbosity decision belongs to the
//! narrative generator, which relies on the `priority_policy` block below
//! staying stable.
//!
//! # Tier Contract
//! | Priority | Tier |
//! |---|---|
//! | 1 | detailed |
//! | 2-3 | moderate |
//! | 4-6 | brief |
//! | 7+ | minimal |
//!
//! Years carry the tier of their owning period.

use super::aggregator::{PopulatedPeriod, ScoredYear, COMPOSITE_PERIOD_WEIGHT};
use super::classifier::RelationType;
use crate::types::{
    EnhancedFortuneView, LifeStage, NarrativeTier, Placement, PriorityPolicy, RankedPeriod,
    RankedYear, TierBand, TypePriorityEntry,
};
use chrono::NaiveDate;

/// Request-level facts recorded alongside the ranked periods
#[derive(Debug, Clone, Copy)]
pub struct ViewContext {
    pub reference_date: NaiveDate,
    pub nominal_age: u32,
    pub placement: Placement,
    pub period_count: usize,
    pub years_per_period_cap: usize,
}

/// Assemble the final view from the current and remaining periods
///
/// `key_periods` must already be in ascending priority order.
pub fn build_view(
    current: PopulatedPeriod,
    key_periods: Vec<PopulatedPeriod>,
    ctx: ViewContext,
) -> EnhancedFortuneView {
    EnhancedFortuneView {
        reference_date: ctx.reference_date,
        nominal_age: ctx.nominal_age,
        current_period: rank_period(current),
        key_periods: key_periods.into_iter().map(rank_period).collect(),
        priority_policy: priority_policy(&ctx),
    }
}

fn rank_period(populated: PopulatedPeriod) -> RankedPeriod {
    let PopulatedPeriod { stub, years } = populated;
    let tier = NarrativeTier::for_priority(stub.priority);
    let life_stage = LifeStage::for_age(stub.period.start_age);

    RankedPeriod {
        life_stage,
        life_stage_label: life_stage.label().to_string(),
        tier,
        years: years.into_iter().map(|y| rank_year(y, tier)).collect(),
        priority: stub.priority,
        period: stub.period,
    }
}

fn rank_year(scored: ScoredYear, tier: NarrativeTier) -> RankedYear {
    RankedYear {
        summary: scored.summary,
        type_priority: scored.type_priority,
        composite_priority: scored.composite_priority,
        tier,
    }
}

/// The documented tier-to-verbosity policy
pub fn priority_policy(ctx: &ViewContext) -> PriorityPolicy {
    PriorityPolicy {
        tiers: tier_bands(),
        composite_formula: format!(
            "period_priority * {} + type_priority",
            COMPOSITE_PERIOD_WEIGHT
        ),
        type_priorities: RelationType::ALL
            .iter()
            .map(|relation| TypePriorityEntry {
                relation: *relation,
                priority: relation.type_priority(),
            })
            .collect(),
        period_count: ctx.period_count,
        years_per_period_cap: ctx.years_per_period_cap,
        current_placement: ctx.placement,
    }
}

fn tier_bands() -> Vec<TierBand> {
    let band = |tier: NarrativeTier, min: u32, max: Option<u32>, guidance: &str| TierBand {
        tier,
        min_priority: min,
        max_priority: max,
        guidance: guidance.to_string(),
    };

    vec![
        band(
            NarrativeTier::Detailed,
            1,
            Some(1),
            "full treatment: period overview plus every retained year",
        ),
        band(
            NarrativeTier::Moderate,
            2,
            Some(3),
            "paragraph per period, short note per retained year",
        ),
        band(
            NarrativeTier::Brief,
            4,
            Some(6),
            "two or three sentences per period, years mentioned by name",
        ),
        band(NarrativeTier::Minimal, 7, None, "one sentence per period"),
    ]
}
