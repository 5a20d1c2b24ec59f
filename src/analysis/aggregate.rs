//! Commit-level complexity and risk scoring.
//!
//! Every number in [`ScoringPolicy`] is a tunable heuristic, not a
//! calibrated constant. The defaults reproduce the original scoring.

use std::collections::BTreeSet;
use std::fmt;

use lazy_static::lazy_static;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::git::CommitRecord;

use super::classify::{ComplexityLevel, FileCategory, FileChange, ensure_ascending};
use super::patterns::tags;
use super::summary::AiSummary;

lazy_static! {
    static ref SECURITY_KEYWORDS: Regex = Regex::new(
        r"(?i)\b(security|vulnerab\w*|cve-\d+|xss|csrf|injection|exploit\w*|sanitiz\w*|encrypt\w*|password|secret|credential\w*)\b"
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    LowMedium,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    const ALL: [RiskLevel; 5] = [
        Self::Low,
        Self::LowMedium,
        Self::Medium,
        Self::High,
        Self::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::LowMedium => "low-medium",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complexity {
    pub score: u32,
    pub level: ComplexityLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub level: RiskLevel,
    /// Human-readable names of the factors that fired.
    pub factors: Vec<String>,
}

/// A commit (or the working tree) with its classified files and scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitAnalysis {
    pub record: CommitRecord,
    pub files: Vec<FileChange>,
    pub complexity: Complexity,
    pub risk_assessment: RiskAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<AiSummary>,
}

impl CommitAnalysis {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn lines_changed(&self) -> usize {
        self.files.iter().map(FileChange::lines_changed).sum()
    }

    /// Breaking by commit message or by any file's diff.
    pub fn is_breaking(&self) -> bool {
        self.record.breaking || self.files.iter().any(|f| f.functional_impact.breaking)
    }

    pub fn categories(&self) -> BTreeSet<FileCategory> {
        self.files.iter().map(|f| f.category).collect()
    }

    pub fn touches_database(&self) -> bool {
        self.files.iter().any(|f| {
            f.category == FileCategory::Database
                || f.functional_impact.data_changes
                || (f.category != FileCategory::Docs && f.has_tag(tags::DATABASE_SCHEMA))
        })
    }

    pub fn touches_config(&self) -> bool {
        self.files
            .iter()
            .any(|f| f.category == FileCategory::Config || f.has_tag(tags::CONFIGURATION))
    }

    pub fn migration_required(&self) -> bool {
        self.files.iter().any(|f| f.functional_impact.migration_required)
    }

    pub fn security_related(&self) -> bool {
        SECURITY_KEYWORDS.is_match(&self.record.subject)
            || SECURITY_KEYWORDS.is_match(&self.record.body)
            || self.files.iter().any(|f| f.functional_impact.security_related)
    }

    pub fn user_facing(&self) -> bool {
        self.files.iter().any(|f| f.functional_impact.user_facing)
    }
}

/// Ascending score thresholds mapping onto a five-step scale.
///
/// `bounds[i]` is the minimum score for step `i + 1`; anything below
/// `bounds[0]` is the first step. Ascending bounds make the mapping
/// monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelThresholds([u32; 4]);

impl LevelThresholds {
    pub fn new(name: &'static str, bounds: [u32; 4]) -> Result<Self, PolicyError> {
        ensure_ascending(name, &bounds)?;
        Ok(Self(bounds))
    }

    pub fn step(&self, score: u32) -> usize {
        self.0.iter().filter(|bound| score >= **bound).count()
    }
}

/// Ascending thresholds where each one crossed adds a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketThresholds([u32; 5]);

impl BucketThresholds {
    pub fn new(name: &'static str, bounds: [u32; 5]) -> Result<Self, PolicyError> {
        ensure_ascending(name, &bounds)?;
        Ok(Self(bounds))
    }

    pub fn points(&self, value: usize) -> u32 {
        let value = u32::try_from(value).unwrap_or(u32::MAX);
        self.0.iter().filter(|bound| value >= **bound).count() as u32
    }
}

/// Point values for each risk factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskWeights {
    pub breaking: u32,
    pub database: u32,
    pub configuration: u32,
    pub large_scale: u32,
    pub security: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            breaking: 5,
            database: 3,
            configuration: 2,
            large_scale: 2,
            security: 3,
        }
    }
}

/// All tunables for commit scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub file_buckets: BucketThresholds,
    pub line_buckets: BucketThresholds,
    /// Distinct categories needed for one and two bonus points.
    pub category_bonus_at: (usize, usize),
    pub complexity_levels: LevelThresholds,
    pub risk_weights: RiskWeights,
    /// Files or changed lines at which a commit counts as large-scale.
    pub large_scale_files: usize,
    pub large_scale_lines: usize,
    pub risk_levels: LevelThresholds,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            file_buckets: BucketThresholds([2, 5, 10, 20, 50]),
            line_buckets: BucketThresholds([20, 100, 300, 1000, 2000]),
            category_bonus_at: (2, 3),
            complexity_levels: LevelThresholds([2, 5, 8, 10]),
            risk_weights: RiskWeights::default(),
            large_scale_files: 20,
            large_scale_lines: 500,
            risk_levels: LevelThresholds([3, 5, 7, 10]),
        }
    }
}

impl ScoringPolicy {
    pub fn complexity(&self, files: &[FileChange]) -> Complexity {
        let lines: usize = files.iter().map(FileChange::lines_changed).sum();
        let categories: BTreeSet<FileCategory> = files.iter().map(|f| f.category).collect();

        let (one, two) = self.category_bonus_at;
        let bonus = if categories.len() >= two {
            2
        } else if categories.len() >= one {
            1
        } else {
            0
        };

        let score = self.file_buckets.points(files.len()) + self.line_buckets.points(lines) + bonus;
        Complexity {
            score,
            level: ComplexityLevel::ALL[self.complexity_levels.step(score)],
        }
    }

    pub fn risk(&self, analysis: &CommitAnalysis) -> RiskAssessment {
        let weights = &self.risk_weights;
        let large_scale = analysis.file_count() >= self.large_scale_files
            || analysis.lines_changed() >= self.large_scale_lines;

        let checks = [
            (analysis.is_breaking(), weights.breaking, "Breaking change"),
            (analysis.touches_database(), weights.database, "Database/schema change"),
            (analysis.touches_config(), weights.configuration, "Configuration change"),
            (large_scale, weights.large_scale, "Large-scale change"),
            (analysis.security_related(), weights.security, "Security-sensitive change"),
        ];

        let mut score = 0;
        let mut factors = Vec::new();
        for (fired, points, name) in checks {
            if fired {
                score += points;
                factors.push(name.to_string());
            }
        }

        RiskAssessment {
            score,
            level: RiskLevel::ALL[self.risk_levels.step(score)],
            factors,
        }
    }
}

/// Build a [`CommitAnalysis`] from a record and its classified files.
pub fn aggregate(record: CommitRecord, files: Vec<FileChange>, policy: &ScoringPolicy) -> CommitAnalysis {
    let complexity = policy.complexity(&files);
    let mut analysis = CommitAnalysis {
        record,
        files,
        complexity,
        risk_assessment: RiskAssessment {
            score: 0,
            level: RiskLevel::Low,
            factors: Vec::new(),
        },
        ai_summary: None,
    };
    analysis.risk_assessment = policy.risk(&analysis);
    analysis
}
