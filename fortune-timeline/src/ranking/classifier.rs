//! Liunian classifier
//!
//! Maps the relation tag the chart engine attached to a notable year onto one
//! of four priority buckets. Relations are never derived here.

use serde::{Deserialize, Serialize};

/// Priority bucket of a notable year's relation to the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Stem clash with branch clash (天克地冲)
    CriticalClash,
    /// Stem combination with branch combination (天合地合)
    HarmoniousCombination,
    /// Year pillar identical to the period pillar (岁运并临)
    CoincidentCycle,
    Other,
}

impl RelationType {
    /// All buckets in priority order
    pub const ALL: [RelationType; 4] = [
        RelationType::CriticalClash,
        RelationType::HarmoniousCombination,
        RelationType::CoincidentCycle,
        RelationType::Other,
    ];

    /// Classify an upstream tag; unknown tags fall into `Other`
    pub fn from_tag(tag: &str) -> Self {
        let normalized: String = tag
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "critical_clash" | "clash" | "tian_ke_di_chong" | "天克地冲" => {
                RelationType::CriticalClash
            }
            "harmonious_combination" | "combination" | "tian_he_di_he" | "天合地合" => {
                RelationType::HarmoniousCombination
            }
            "coincident_cycle" | "sui_yun_bing_lin" | "岁运并临" => {
                RelationType::CoincidentCycle
            }
            _ => RelationType::Other,
        }
    }

    /// Type priority (lower is more important)
    pub fn type_priority(&self) -> u32 {
        match self {
            RelationType::CriticalClash => 1,
            RelationType::HarmoniousCombination => 2,
            RelationType::CoincidentCycle => 3,
            RelationType::Other => 4,
        }
    }
}

/// Type priority straight from an upstream tag
pub fn type_priority_for_tag(tag: &str) -> u32 {
    RelationType::from_tag(tag).type_priority()
}
