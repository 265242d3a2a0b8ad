//! Liunian aggregator
//!
//! Attaches each selected period's notable years, ranks them by composite
//! priority and truncates to the per-period cap. Retained years are reduced to
//! their year-level summary; monthly and daily breakdowns never leave this
//! stage. Truncation is unconditional.

use super::classifier::RelationType;
use super::selector::PeriodStub;
use crate::types::{SpecialYear, YearSummary};
use tracing::debug;

/// Multiplier separating period priority from type priority
pub const COMPOSITE_PERIOD_WEIGHT: u32 = 100;

/// A retained year with its ranking keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredYear {
    pub summary: YearSummary,
    pub type_priority: u32,
    pub composite_priority: u32,
}

/// A selected period with its retained years attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatedPeriod {
    pub stub: PeriodStub,
    pub years: Vec<ScoredYear>,
}

/// `period_priority * 100 + type_priority`
pub fn composite_priority(period_priority: u32, type_priority: u32) -> u32 {
    period_priority * COMPOSITE_PERIOD_WEIGHT + type_priority
}

/// Attach up to `cap` of the stub's years, lowest composite priority first
///
/// Ties break on calendar year, so output is deterministic for a given input.
pub fn attach_years(stub: PeriodStub, years: &[SpecialYear], cap: usize) -> PopulatedPeriod {
    let mut scored: Vec<ScoredYear> = years
        .iter()
        .filter(|year| year.period_index == stub.period.index)
        .map(|year| score_year(year, stub.priority))
        .collect();

    scored.sort_by_key(|y| (y.composite_priority, y.summary.year));

    let available = scored.len();
    scored.truncate(cap);

    if available > scored.len() {
        debug!(
            period_index = stub.period.index,
            priority = stub.priority,
            kept = scored.len(),
            dropped = available - scored.len(),
            "Truncated notable years"
        );
    }

    PopulatedPeriod { stub, years: scored }
}

fn score_year(year: &SpecialYear, period_priority: u32) -> ScoredYear {
    let relation = RelationType::from_tag(&year.relation);
    let type_priority = relation.type_priority();
    ScoredYear {
        summary: strip_detail(year, relation),
        type_priority,
        composite_priority: composite_priority(period_priority, type_priority),
    }
}

/// Keep only the year-level relation summary
fn strip_detail(year: &SpecialYear, relation: RelationType) -> YearSummary {
    YearSummary {
        year: year.year,
        label: year.label.clone(),
        age: year.age,
        period_index: year.period_index,
        relation,
        relation_tag: year.relation.clone(),
        notes: year.detail.notes.clone(),
    }
}
