//! Core data model for the fortune timeline
//!
//! Two families of records live here:
//! - **Upstream records** produced by the chart engine and cached as-is
//!   (`BirthProfile`, `Period`, `SpecialYear`, `RawChart`, analysis sections)
//! - **Ranked records** produced fresh on every request by the ranking stages
//!   (`RankedPeriod`, `RankedYear`, `EnhancedFortuneView`)
//!
//! Periods are shared by `Arc` between the cached `RawChart` and every ranked
//! view built from it; a ranked view never holds a physical copy of a period.

use crate::error::{FortuneError, FortuneResult};
use crate::ranking::classifier::RelationType;
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Earliest accepted birth year
pub const MIN_BIRTH_YEAR: i32 = 1900;

/// Latest accepted birth year
pub const MAX_BIRTH_YEAR: i32 = 2100;

// ============================================================================
// Birth Profile
// ============================================================================

/// Gender of the chart subject (drives period direction upstream)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = FortuneError;

    fn from_str(s: &str) -> FortuneResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "男" => Ok(Gender::Male),
            "female" | "f" | "女" => Ok(Gender::Female),
            other => Err(FortuneError::InvalidBirthProfile(format!(
                "unknown gender '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// Calendar the birth date was given in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarKind {
    #[default]
    Solar,
    Lunar,
}

impl FromStr for CalendarKind {
    type Err = FortuneError;

    fn from_str(s: &str) -> FortuneResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solar" | "gregorian" | "公历" | "阳历" => Ok(CalendarKind::Solar),
            "lunar" | "农历" | "阴历" => Ok(CalendarKind::Lunar),
            other => Err(FortuneError::InvalidBirthProfile(format!(
                "unknown calendar kind '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarKind::Solar => write!(f, "solar"),
            CalendarKind::Lunar => write!(f, "lunar"),
        }
    }
}

/// Validated birth input for one request
///
/// Immutable once built; only the validating constructors create it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BirthProfile {
    birth_date: NaiveDate,
    birth_time: NaiveTime,
    gender: Gender,
    calendar: CalendarKind,
}

impl BirthProfile {
    /// Build a profile, rejecting out-of-range birth years
    pub fn new(
        birth_date: NaiveDate,
        birth_time: NaiveTime,
        gender: Gender,
        calendar: CalendarKind,
    ) -> FortuneResult<Self> {
        let year = birth_date.year();
        if !(MIN_BIRTH_YEAR..=MAX_BIRTH_YEAR).contains(&year) {
            return Err(FortuneError::InvalidBirthProfile(format!(
                "birth year {} outside supported range {}-{}",
                year, MIN_BIRTH_YEAR, MAX_BIRTH_YEAR
            )));
        }

        Ok(Self {
            birth_date,
            birth_time,
            gender,
            calendar,
        })
    }

    /// Parse textual input (`YYYY-MM-DD`, `HH:MM`, gender, calendar kind)
    pub fn parse(date: &str, time: &str, gender: &str, calendar: &str) -> FortuneResult<Self> {
        let birth_date = fortune_common::time::parse_date(date)
            .map_err(|e| FortuneError::InvalidBirthProfile(e.to_string()))?;
        let birth_time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
            .map_err(|e| {
                FortuneError::InvalidBirthProfile(format!("invalid birth time '{}': {}", time, e))
            })?;

        Self::new(birth_date, birth_time, gender.parse()?, calendar.parse()?)
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn birth_time(&self) -> NaiveTime {
        self.birth_time
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn calendar(&self) -> CalendarKind {
        self.calendar
    }

    /// Canonical text form used for cache key digests
    ///
    /// Seconds are dropped from the birth time: upstream charts resolve to the
    /// two-hour branch, and minute precision is what callers supply.
    pub fn normalized(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.calendar,
            self.birth_date.format("%Y-%m-%d"),
            self.birth_time.format("%H:%M"),
            self.gender
        )
    }

    /// Reject reference dates that precede the birth date
    pub fn check_reference_date(&self, reference_date: NaiveDate) -> FortuneResult<()> {
        if reference_date < self.birth_date {
            return Err(FortuneError::InvalidBirthProfile(format!(
                "reference date {} precedes birth date {}",
                reference_date, self.birth_date
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Upstream Records
// ============================================================================

/// Major period (dayun) as produced by the chart engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Sequence index within the chart (years refer back to it)
    pub index: u32,
    /// Stem/branch label, e.g. "庚午"
    pub label: String,
    pub start_year: i32,
    pub end_year: i32,
    /// First nominal age covered (inclusive)
    pub start_age: u32,
    /// Last nominal age covered (inclusive)
    pub end_age: u32,
    /// Dominant influence tag (ten-god or element)
    pub influence: String,
}

impl Period {
    pub fn contains_age(&self, age: u32) -> bool {
        (self.start_age..=self.end_age).contains(&age)
    }
}

/// One month inside a notable year's detail breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthFortune {
    pub month: u8,
    pub label: String,
    pub note: String,
}

/// Day-level highlight inside a notable year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHighlight {
    pub date: NaiveDate,
    pub note: String,
}

/// Supporting detail attached to a notable year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct YearDetail {
    /// Year-level relational notes (kept after stripping)
    pub notes: Vec<String>,
    /// Per-month breakdown (stripped before delivery)
    pub monthly: Vec<MonthFortune>,
    /// Per-day highlights (stripped before delivery)
    pub daily: Vec<DayHighlight>,
}

/// Notable year (liunian) as produced by the chart engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialYear {
    pub year: i32,
    /// Stem/branch label, e.g. "甲辰"
    pub label: String,
    pub age: u32,
    /// Relation tag assigned upstream (see `RelationType::from_tag`)
    pub relation: String,
    /// Sequence index of the owning period (lookup, not ownership)
    pub period_index: u32,
    #[serde(default)]
    pub detail: YearDetail,
}

/// The four stem/branch pillars of the natal chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FourPillars {
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
}

/// Date-independent base chart: pillars plus raw period and year lists
///
/// This is the unit memoized by the cache layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChart {
    pub pillars: FourPillars,
    pub day_master: String,
    /// Major periods in sequence order
    pub periods: Vec<Arc<Period>>,
    /// Flat list of notable years across all periods
    pub years: Vec<SpecialYear>,
}

/// Day-master balance / strength analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceAnalysis {
    /// e.g. "strong", "weak", "balanced"
    pub day_master_strength: String,
    pub strength_score: f64,
    pub favorable_elements: Vec<String>,
    pub unfavorable_elements: Vec<String>,
}

/// Detail for one pillar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarDetail {
    /// "year", "month", "day" or "hour"
    pub position: String,
    pub stem: String,
    pub branch: String,
    pub ten_god: String,
    #[serde(default)]
    pub hidden_stems: Vec<String>,
}

/// Detailed per-pillar analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarAnalysis {
    pub pillars: Vec<PillarDetail>,
}

/// Optional report section that may be absent after a tolerated failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Present { data: T },
    Absent { reason: String },
}

impl<T> Section<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Section::Present { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Present { data } => Some(data),
            Section::Absent { .. } => None,
        }
    }
}

// ============================================================================
// Ranked Records
// ============================================================================

/// Verbosity hint for the narrative generator, banded by priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeTier {
    Detailed,
    Moderate,
    Brief,
    Minimal,
}

impl NarrativeTier {
    /// 1 → detailed, 2-3 → moderate, 4-6 → brief, 7+ → minimal
    pub fn for_priority(priority: u32) -> Self {
        match priority {
            0 | 1 => NarrativeTier::Detailed,
            2..=3 => NarrativeTier::Moderate,
            4..=6 => NarrativeTier::Brief,
            _ => NarrativeTier::Minimal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeTier::Detailed => "detailed",
            NarrativeTier::Moderate => "moderate",
            NarrativeTier::Brief => "brief",
            NarrativeTier::Minimal => "minimal",
        }
    }
}

/// Life stage of a period, a pure function of age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    Childhood,
    Adolescence,
    YoungAdulthood,
    Prime,
    MiddleAge,
    Elder,
}

impl LifeStage {
    pub fn for_age(age: u32) -> Self {
        match age {
            0..=12 => LifeStage::Childhood,
            13..=18 => LifeStage::Adolescence,
            19..=30 => LifeStage::YoungAdulthood,
            31..=45 => LifeStage::Prime,
            46..=60 => LifeStage::MiddleAge,
            _ => LifeStage::Elder,
        }
    }

    /// Label used in report headings
    pub fn label(&self) -> &'static str {
        match self {
            LifeStage::Childhood => "童年",
            LifeStage::Adolescence => "少年",
            LifeStage::YoungAdulthood => "青年",
            LifeStage::Prime => "壮年",
            LifeStage::MiddleAge => "中年",
            LifeStage::Elder => "晚年",
        }
    }
}

/// Year-level summary left after heavy detail is stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub label: String,
    pub age: u32,
    pub period_index: u32,
    pub relation: RelationType,
    /// Original upstream tag, kept for traceability
    pub relation_tag: String,
    pub notes: Vec<String>,
}

/// A retained notable year with its ranking keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedYear {
    #[serde(flatten)]
    pub summary: YearSummary,
    pub type_priority: u32,
    /// `period_priority * 100 + type_priority`
    pub composite_priority: u32,
    pub tier: NarrativeTier,
}

/// A selected period with priority, labels and its retained years
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPeriod {
    pub period: Arc<Period>,
    pub priority: u32,
    pub life_stage: LifeStage,
    /// Heading label for the life stage, e.g. "壮年"
    pub life_stage_label: String,
    pub tier: NarrativeTier,
    pub years: Vec<RankedYear>,
}

/// Where the nominal age fell relative to the period list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Within,
    BeforeFirst,
    AfterLast,
}

/// One row of the tier-to-verbosity contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBand {
    pub tier: NarrativeTier,
    pub min_priority: u32,
    /// `None` means unbounded
    pub max_priority: Option<u32>,
    pub guidance: String,
}

/// One row of the relation-type priority table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePriorityEntry {
    pub relation: RelationType,
    pub priority: u32,
}

/// Metadata block documenting how priorities map to verbosity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityPolicy {
    pub tiers: Vec<TierBand>,
    pub composite_formula: String,
    pub type_priorities: Vec<TypePriorityEntry>,
    pub period_count: usize,
    pub years_per_period_cap: usize,
    pub current_placement: Placement,
}

/// Top-level ranked output consumed by report generators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedFortuneView {
    pub reference_date: NaiveDate,
    pub nominal_age: u32,
    pub current_period: RankedPeriod,
    /// Remaining periods in ascending priority order
    pub key_periods: Vec<RankedPeriod>,
    pub priority_policy: PriorityPolicy,
}

impl EnhancedFortuneView {
    /// Current period followed by key periods, in priority order
    pub fn ranked_periods(&self) -> impl Iterator<Item = &RankedPeriod> {
        std::iter::once(&self.current_period).chain(self.key_periods.iter())
    }

    /// Look up a ranked period by its sequence index
    pub fn period_by_index(&self, index: u32) -> Option<&RankedPeriod> {
        self.ranked_periods().find(|p| p.period.index == index)
    }

    pub fn total_years(&self) -> usize {
        self.ranked_periods().map(|p| p.years.len()).sum()
    }
}

/// Full response: ranked view plus optional analysis sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FortuneReport {
    pub view: EnhancedFortuneView,
    pub pillars: FourPillars,
    pub balance: Section<BalanceAnalysis>,
    pub pillar_analysis: Section<PillarAnalysis>,
}
