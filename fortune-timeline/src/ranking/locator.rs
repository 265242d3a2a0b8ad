//! Current period locator
//!
//! Finds the major period whose inclusive age range contains the nominal age.
//! Periods are scanned in sequence order and the first containing range wins,
//! matching how the chart display walks the same list. Ages outside every
//! range clamp to the nearest boundary period.

use crate::error::{FortuneError, FortuneResult};
use crate::types::{Period, Placement};
use std::sync::Arc;

/// Position of the current period within the period list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodLocation {
    pub position: usize,
    pub placement: Placement,
}

/// Locate the period containing `age`
pub fn locate_current_period(periods: &[Arc<Period>], age: u32) -> FortuneResult<PeriodLocation> {
    let (first, last) = match (periods.first(), periods.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(FortuneError::EmptyPeriodSequence),
    };

    if let Some(position) = periods.iter().position(|p| p.contains_age(age)) {
        return Ok(PeriodLocation {
            position,
            placement: Placement::Within,
        });
    }

    if age < first.start_age {
        return Ok(PeriodLocation {
            position: 0,
            placement: Placement::BeforeFirst,
        });
    }

    if age > last.end_age {
        return Ok(PeriodLocation {
            position: periods.len() - 1,
            placement: Placement::AfterLast,
        });
    }

    // Age sits in a gap between two ranges: take the last period that
    // started at or before it
    let position = periods
        .iter()
        .rposition(|p| p.start_age <= age)
        .unwrap_or(0);
    Ok(PeriodLocation {
        position,
        placement: Placement::Within,
    })
}
