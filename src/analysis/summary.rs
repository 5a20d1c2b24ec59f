//! Per-commit summary produced by the service or by the rule-based fallback.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
    Critical,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Impact {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_lowercase().as_str() {
            "low" | "minimal" | "none" => Ok(Impact::Low),
            "medium" | "moderate" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            "critical" => Ok(Impact::Critical),
            _ => Err(de::Error::unknown_variant(
                &s,
                &["low", "medium", "high", "critical"],
            )),
        }
    }
}

/// Semver-style scope of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseScope {
    Patch,
    Minor,
    Major,
}

impl<'de> Deserialize<'de> for ReleaseScope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_lowercase().as_str() {
            "major" => Ok(ReleaseScope::Major),
            "minor" => Ok(ReleaseScope::Minor),
            "patch" => Ok(ReleaseScope::Patch),
            _ => Err(de::Error::unknown_variant(&s, &["major", "minor", "patch"])),
        }
    }
}

/// Where a summary came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummarySource {
    Service { model: String },
    RuleBased,
}

/// Fully populated summary of one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSummary {
    pub summary: String,
    pub technical_summary: String,
    pub category: String,
    pub impact: Impact,
    pub scope: ReleaseScope,
    pub user_facing: bool,
    pub breaking: bool,
    pub business_impact: String,
    pub technical_impact: String,
    pub highlights: Vec<String>,
    pub migration_notes: Option<String>,
    pub tags: Vec<String>,
    pub related_areas: Vec<String>,
    pub risk_level: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub source: SummarySource,
}

impl AiSummary {
    pub fn is_rule_based(&self) -> bool {
        self.source == SummarySource::RuleBased
    }
}
