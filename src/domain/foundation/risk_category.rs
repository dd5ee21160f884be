//! RiskCategory enum for AI-assigned stroke risk.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk bucket derived upstream from the stroke and LVO probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskCategory {
    /// Ordering key, higher is more severe.
    pub fn severity_rank(&self) -> u8 {
        match self {
            RiskCategory::Low => 0,
            RiskCategory::Moderate => 1,
            RiskCategory::High => 2,
            RiskCategory::Critical => 3,
        }
    }

    /// Returns true for categories that warrant immediate escalation.
    pub fn is_urgent(&self) -> bool {
        matches!(self, RiskCategory::High | RiskCategory::Critical)
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskCategory::Low => "LOW",
            RiskCategory::Moderate => "MODERATE",
            RiskCategory::High => "HIGH",
            RiskCategory::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}
