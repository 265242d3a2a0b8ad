//! Nominal ("virtual") age
//!
//! Age is counted as `reference_year - birth_year + 1`: one at birth, plus one
//! at every calendar new year. This is not elapsed years.

use chrono::{Datelike, NaiveDate};

/// Virtual age at `reference_date`
///
/// Saturates at zero for reference years before the birth year; the pipeline
/// rejects such dates before ranking.
pub fn virtual_age(birth_date: NaiveDate, reference_date: NaiveDate) -> u32 {
    let age = reference_date.year() - birth_date.year() + 1;
    age.max(0) as u32
}
