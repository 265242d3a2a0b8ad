//! Error types for fortune-timeline
//!
//! Errors fall in two groups:
//! - **Fatal**: abort the request with a structured error
//!   (`InvalidBirthProfile`, `MissingBaseChart`, `EmptyPeriodSequence`, `DeadlineExceeded`)
//! - **Recovered**: logged and reflected in the output, never returned to callers
//!   (`CacheUnavailable`, `PartialUpstreamFailure`)

use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Fortune pipeline error type
#[derive(Debug, Error)]
pub enum FortuneError {
    /// Malformed or out-of-range birth input
    #[error("Invalid birth profile: {0}")]
    InvalidBirthProfile(String),

    /// The required base chart computation failed or returned nothing
    #[error("Base chart unavailable: {0}")]
    MissingBaseChart(String),

    /// Shared cache tier failed; the layer recomputes directly
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// An optional analysis task failed; its section is marked absent
    #[error("Upstream section '{section}' failed: {reason}")]
    PartialUpstreamFailure {
        section: &'static str,
        reason: String,
    },

    /// Upstream returned zero major periods
    #[error("Upstream returned no major periods")]
    EmptyPeriodSequence,

    /// The caller's deadline expired before the view was complete
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// fortune-common error
    #[error("Common error: {0}")]
    Common(#[from] fortune_common::Error),
}

impl FortuneError {
    /// Whether the pipeline degrades and continues instead of aborting
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FortuneError::CacheUnavailable(_) | FortuneError::PartialUpstreamFailure { .. }
        )
    }

    /// Stable machine-readable code for boundary layers
    pub fn error_code(&self) -> &'static str {
        match self {
            FortuneError::InvalidBirthProfile(_) => "INVALID_BIRTH_PROFILE",
            FortuneError::MissingBaseChart(_) => "MISSING_BASE_CHART",
            FortuneError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            FortuneError::PartialUpstreamFailure { .. } => "PARTIAL_UPSTREAM_FAILURE",
            FortuneError::EmptyPeriodSequence => "EMPTY_PERIOD_SEQUENCE",
            FortuneError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            FortuneError::Serialization(_) => "SERIALIZATION_ERROR",
            FortuneError::Common(_) => "COMMON_ERROR",
        }
    }

    /// Structured error body (`{"error": {"code", "message"}}`)
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        })
    }
}

/// Result type for fortune pipeline operations
pub type FortuneResult<T> = Result<T, FortuneError>;
