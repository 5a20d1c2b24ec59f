//! Release-level rollup of analyzed commits.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::git::CommitType;

use super::aggregate::{CommitAnalysis, RiskLevel};

/// Highlights kept in [`ReleaseInsights::key_highlights`].
pub const MAX_KEY_HIGHLIGHTS: usize = 5;

pub const MIGRATION_REQUIRED: &str = "Database migration required";
pub const BREAKING_REVIEW: &str = "Breaking changes - review migration notes";
pub const CONFIG_UPDATE: &str = "Configuration update required";
pub const SECURITY_REVIEW: &str = "Security review recommended";

lazy_static! {
    static ref REVENUE_PATHS: Regex =
        Regex::new(r"(?i)(payment|billing|checkout|subscription|pricing|invoice)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseComplexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessImpact {
    Minor,
    Moderate,
    Major,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInsights {
    pub summary: String,
    pub commit_type_counts: BTreeMap<CommitType, usize>,
    pub risk_level: RiskLevel,
    pub affected_areas: BTreeSet<String>,
    pub breaking: bool,
    pub complexity: ReleaseComplexity,
    pub business_impact: BusinessImpact,
    /// One entry per triggering commit; duplicates are kept.
    pub deployment_requirements: Vec<String>,
    pub headline: String,
    pub key_highlights: Vec<String>,
}

fn is_breaking(commit: &CommitAnalysis) -> bool {
    commit.is_breaking() || commit.ai_summary.as_ref().is_some_and(|s| s.breaking)
}

fn is_user_facing(commit: &CommitAnalysis) -> bool {
    commit.user_facing() || commit.ai_summary.as_ref().is_some_and(|s| s.user_facing)
}

fn touches_revenue(commit: &CommitAnalysis) -> bool {
    commit.files.iter().any(|f| REVENUE_PATHS.is_match(&f.path))
}

fn highlight_text(commit: &CommitAnalysis) -> String {
    commit
        .ai_summary
        .as_ref()
        .map(|s| s.summary.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| commit.record.subject.clone())
}

fn count_of(n: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", n, if n == 1 { singular } else { plural })
}

/// Roll a run's commits up into release insights.
///
/// An empty slice is valid and yields a low-risk, minor release.
pub fn synthesize(commits: &[CommitAnalysis]) -> ReleaseInsights {
    let mut commit_type_counts = BTreeMap::new();
    for commit in commits {
        *commit_type_counts
            .entry(commit.record.conventional_type)
            .or_insert(0) += 1;
    }

    let breaking_count = commits.iter().filter(|c| is_breaking(c)).count();
    let breaking = breaking_count > 0;

    let risk_level = commits
        .iter()
        .map(|c| c.risk_assessment.level)
        .max()
        .unwrap_or(RiskLevel::Low);

    let mut affected_areas = BTreeSet::new();
    for commit in commits {
        if let Some(summary) = &commit.ai_summary {
            affected_areas.extend(summary.related_areas.iter().cloned());
        }
        if let Some(scope) = &commit.record.scope {
            affected_areas.insert(scope.clone());
        }
        affected_areas.extend(commit.categories().iter().map(|c| c.as_str().to_string()));
    }

    let average_files = if commits.is_empty() {
        0.0
    } else {
        commits.iter().map(CommitAnalysis::file_count).sum::<usize>() as f64 / commits.len() as f64
    };
    let complexity = if average_files > 10.0 || breaking {
        ReleaseComplexity::High
    } else if average_files > 5.0 {
        ReleaseComplexity::Medium
    } else {
        ReleaseComplexity::Low
    };

    let business_impact = if breaking || commits.iter().any(touches_revenue) {
        BusinessImpact::Major
    } else if commits.iter().any(is_user_facing) {
        BusinessImpact::Moderate
    } else {
        BusinessImpact::Minor
    };

    let mut deployment_requirements = Vec::new();
    for commit in commits {
        if commit.migration_required() {
            deployment_requirements.push(MIGRATION_REQUIRED.to_string());
        }
        if is_breaking(commit) {
            deployment_requirements.push(BREAKING_REVIEW.to_string());
        }
        if commit.touches_config() {
            deployment_requirements.push(CONFIG_UPDATE.to_string());
        }
        if commit.security_related() {
            deployment_requirements.push(SECURITY_REVIEW.to_string());
        }
    }

    let features = commit_type_counts.get(&CommitType::Feat).copied().unwrap_or(0);
    let fixes = commit_type_counts.get(&CommitType::Fix).copied().unwrap_or(0);

    let headline = if commits.is_empty() {
        "No changes".to_string()
    } else if breaking {
        format!(
            "{} across {}",
            count_of(breaking_count, "breaking change", "breaking changes"),
            count_of(commits.len(), "commit", "commits")
        )
    } else if features > 0 {
        format!(
            "{} and {}",
            count_of(features, "new feature", "new features"),
            count_of(fixes, "fix", "fixes")
        )
    } else if fixes > 0 {
        count_of(fixes, "fix", "fixes")
    } else {
        format!("Maintenance release ({})", count_of(commits.len(), "commit", "commits"))
    };

    let summary = if commits.is_empty() {
        "No commits analyzed".to_string()
    } else {
        let counts: Vec<String> = commit_type_counts
            .iter()
            .map(|(ty, n)| format!("{} {}", n, ty))
            .collect();
        format!("{}: {}", count_of(commits.len(), "commit", "commits"), counts.join(", "))
    };

    // Stable sort keeps history order within each rank.
    let mut ranked: Vec<&CommitAnalysis> = commits.iter().collect();
    ranked.sort_by_key(|c| {
        if is_breaking(c) {
            0
        } else if c.record.conventional_type == CommitType::Feat {
            1
        } else {
            2
        }
    });
    let key_highlights = ranked
        .into_iter()
        .take(MAX_KEY_HIGHLIGHTS)
        .map(highlight_text)
        .collect();

    ReleaseInsights {
        summary,
        commit_type_counts,
        risk_level,
        affected_areas,
        breaking,
        complexity,
        business_impact,
        deployment_requirements,
        headline,
        key_highlights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::{ScoringPolicy, aggregate};
    use crate::analysis::classify::{ClassifyInput, DiffClassifier};
    use crate::git::{Author, ChangeStatus, CommitId, CommitRecord, parse_commit_message};
    use chrono::{TimeZone, Utc};

    fn commit(subject: &str, files: &[(&str, &str)]) -> CommitAnalysis {
        let parts = parse_commit_message(subject, "");
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = CommitRecord {
            id: CommitId::new("a".repeat(40), "aaaaaaa"),
            author: Author {
                name: "Grace".into(),
                email: "grace@example.com".into(),
            },
            author_timestamp: ts,
            commit_timestamp: ts,
            subject: subject.into(),
            body: String::new(),
            conventional_type: parts.commit_type,
            scope: parts.scope,
            breaking: parts.breaking,
        };
        let classifier = DiffClassifier::default();
        let files = files
            .iter()
            .map(|(path, diff)| classifier.classify(&ClassifyInput::new(ChangeStatus::Modified, path, Some(diff))))
            .collect();
        aggregate(record, files, &ScoringPolicy::default())
    }

    #[test]
    fn test_empty_input_is_valid() {
        let insights = synthesize(&[]);
        assert!(insights.commit_type_counts.is_empty());
        assert_eq!(insights.risk_level, RiskLevel::Low);
        assert!(!insights.breaking);
        assert_eq!(insights.complexity, ReleaseComplexity::Low);
        assert_eq!(insights.business_impact, BusinessImpact::Minor);
        assert!(insights.deployment_requirements.is_empty());
        assert!(insights.key_highlights.is_empty());
    }

    #[test]
    fn test_counts_and_breaking() {
        let commits = vec![
            commit("feat(ui): add dark mode", &[("src/theme.rs", "+x\n")]),
            commit("fix: handle empty input", &[("src/parse.rs", "+y\n")]),
            commit("feat!: drop v1 endpoints", &[("src/api.rs", "-z\n")]),
        ];
        let insights = synthesize(&commits);
        assert_eq!(insights.commit_type_counts[&CommitType::Feat], 2);
        assert_eq!(insights.commit_type_counts[&CommitType::Fix], 1);
        assert!(insights.breaking);
        assert_eq!(insights.complexity, ReleaseComplexity::High);
        assert_eq!(insights.business_impact, BusinessImpact::Major);
        assert!(insights.affected_areas.contains("ui"));
        assert!(insights.affected_areas.contains("source"));
        assert_eq!(insights.key_highlights[0], "feat!: drop v1 endpoints");
        assert_eq!(insights.key_highlights[1], "feat(ui): add dark mode");
        assert!(insights.headline.starts_with("1 breaking change"));
    }

    #[test]
    fn test_revenue_paths_are_major() {
        let commits = vec![commit("fix: rounding", &[("src/billing/totals.rs", "+a\n")])];
        assert_eq!(synthesize(&commits).business_impact, BusinessImpact::Major);
    }

    #[test]
    fn test_deployment_requirements_allow_duplicates() {
        let commits = vec![
            commit("chore: tune pool", &[("config/app.yaml", "+pool: 5\n")]),
            commit("chore: tune timeout", &[("config/app.yaml", "+timeout: 5\n")]),
        ];
        let insights = synthesize(&commits);
        let config_entries = insights
            .deployment_requirements
            .iter()
            .filter(|r| r.as_str() == CONFIG_UPDATE)
            .count();
        assert_eq!(config_entries, 2);
    }

    #[test]
    fn test_highlights_are_capped() {
        let commits: Vec<_> = (0..8)
            .map(|i| commit(&format!("fix: bug {}", i), &[("src/a.rs", "+a\n")]))
            .collect();
        let insights = synthesize(&commits);
        assert_eq!(insights.key_highlights.len(), MAX_KEY_HIGHLIGHTS);
        assert_eq!(insights.headline, "8 fixes");
    }
}
