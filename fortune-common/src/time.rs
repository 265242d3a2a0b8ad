//! Date and duration utilities

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Today's calendar date in the local timezone
///
/// Used as the default reference date for age computation. Ranking depends on
/// the calendar day, so callers must not reuse a value across day boundaries.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

/// Parse an ISO-8601 calendar date (`YYYY-MM-DD`)
pub fn parse_date(value: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| crate::Error::InvalidInput(format!("Invalid date '{}': {}", value, e)))
}
