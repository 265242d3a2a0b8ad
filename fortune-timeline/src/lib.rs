//! fortune-timeline library
//!
//! Ranks a birth chart's major periods and notable years against a reference
//! date and packages them for narrative report generation.
//!
//! Entry point is [`FortunePipeline`]; the ranking stages in [`ranking`] are
//! pure and usable on their own.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod ranking;
pub mod types;
pub mod upstream;

pub use crate::cache::{CacheKey, CacheLayer, CacheStats, InMemorySharedStore, SharedCacheStore};
pub use crate::error::{FortuneError, FortuneResult};
pub use crate::fetch::{ParallelFetchCoordinator, UpstreamBundle};
pub use crate::pipeline::FortunePipeline;
pub use crate::ranking::rank_timeline;
pub use crate::types::{BirthProfile, EnhancedFortuneView, FortuneReport, RawChart};
pub use crate::upstream::{ChartEngine, JsonChartEngine, UpstreamError};
