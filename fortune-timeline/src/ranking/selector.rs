//! Period selector
//!
//! Ranks periods outward from the current one, alternating forward and
//! backward: 1 = current, 2 = next, 3 = previous, 4 = next+1, 5 = previous+1, ...
//!
//! Each round advances the forward cursor before retreating the backward one.
//! Once either end of the list is reached, the remaining side is consumed alone
//! until the requested count is met or the list is exhausted.

use crate::types::Period;
use std::sync::Arc;

/// A selected period with its priority, before years are attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodStub {
    pub period: Arc<Period>,
    pub priority: u32,
}

/// Select up to `count` periods around `current` in priority order
///
/// Returns an empty selection when `count` is zero or `current` is out of range.
pub fn select_periods(periods: &[Arc<Period>], current: usize, count: usize) -> Vec<PeriodStub> {
    let target = count.min(periods.len());
    let mut stubs = Vec::with_capacity(target);
    if target == 0 || current >= periods.len() {
        return stubs;
    }

    let push = |stubs: &mut Vec<PeriodStub>, position: usize| {
        let priority = stubs.len() as u32 + 1;
        stubs.push(PeriodStub {
            period: Arc::clone(&periods[position]),
            priority,
        });
    };

    push(&mut stubs, current);

    let mut forward = current;
    let mut backward = current;
    while stubs.len() < target {
        let mut advanced = false;

        if forward + 1 < periods.len() {
            forward += 1;
            push(&mut stubs, forward);
            advanced = true;
            if stubs.len() == target {
                break;
            }
        }

        if backward > 0 {
            backward -= 1;
            push(&mut stubs, backward);
            advanced = true;
        }

        if !advanced {
            break;
        }
    }

    stubs
}
