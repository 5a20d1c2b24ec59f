//! Deterministic rule-based summaries.

use std::collections::BTreeSet;

use crate::analysis::{AiSummary, CommitAnalysis, Impact, ReleaseScope, RiskLevel, SummarySource};
use crate::git::{CommitType, parse_commit_message};

/// Confidence reported for rule-based summaries of conventional commits.
pub const CONVENTIONAL_CONFIDENCE: f64 = 0.6;
/// Confidence when the type had to be inferred from free text.
pub const INFERRED_CONFIDENCE: f64 = 0.4;

pub fn category_for(commit_type: CommitType) -> &'static str {
    match commit_type {
        CommitType::Feat => "feature",
        CommitType::Fix => "bugfix",
        CommitType::Docs => "documentation",
        CommitType::Style => "styling",
        CommitType::Refactor => "refactoring",
        CommitType::Perf => "performance",
        CommitType::Test => "testing",
        CommitType::Chore => "maintenance",
        CommitType::Ci => "ci",
        CommitType::Build => "build",
        CommitType::Security => "security",
        CommitType::Config => "configuration",
        CommitType::Other => "other",
    }
}

fn impact_for(risk: RiskLevel, breaking: bool) -> Impact {
    let impact = match risk {
        RiskLevel::Critical => Impact::Critical,
        RiskLevel::High => Impact::High,
        RiskLevel::Medium => Impact::Medium,
        RiskLevel::LowMedium | RiskLevel::Low => Impact::Low,
    };
    if breaking { impact.max(Impact::High) } else { impact }
}

/// Subject without its `type(scope)!:` prefix, first letter capitalized.
fn description(subject: &str, explicit: bool) -> String {
    let text = match subject.split_once(':') {
        Some((_, rest)) if explicit => rest.trim(),
        _ => subject.trim(),
    };
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Update".to_string(),
    }
}

fn business_impact_text(impact: Impact, user_facing: bool) -> String {
    let audience = if user_facing { "user-facing" } else { "internal" };
    match impact {
        Impact::Critical => format!("Critical {} change; coordinate the rollout", audience),
        Impact::High => format!("Significant {} change", audience),
        Impact::Medium => format!("Moderate {} change", audience),
        Impact::Low => format!("Minor {} change", audience),
    }
}

/// Summarize a commit from its deterministic analysis alone.
///
/// Total: every field is populated for any input, including commits with
/// no files.
pub fn rule_based_summary(analysis: &CommitAnalysis) -> AiSummary {
    let record = &analysis.record;
    let parts = parse_commit_message(&record.subject, &record.body);
    let breaking = analysis.is_breaking();
    let risk = analysis.risk_assessment.level;
    let impact = impact_for(risk, breaking);
    let user_facing = analysis.user_facing() || record.conventional_type == CommitType::Feat;

    let scope = if breaking {
        ReleaseScope::Major
    } else if record.conventional_type == CommitType::Feat {
        ReleaseScope::Minor
    } else {
        ReleaseScope::Patch
    };

    let summary = description(&record.subject, parts.explicit);

    let technical_summary = format!(
        "{} file(s) changed (+{}/-{}); complexity {}, risk {}",
        analysis.file_count(),
        analysis.files.iter().map(|f| f.lines_added).sum::<usize>(),
        analysis.files.iter().map(|f| f.lines_removed).sum::<usize>(),
        analysis.complexity.level,
        risk
    );

    let technical_impact = if analysis.risk_assessment.factors.is_empty() {
        "No elevated risk factors".to_string()
    } else {
        analysis.risk_assessment.factors.join(", ")
    };

    let mut highlights = vec![summary.clone()];
    if breaking {
        highlights.push("Contains breaking changes".to_string());
    }
    if analysis.migration_required() {
        highlights.push("Requires a database migration".to_string());
    }

    let mut notes = Vec::new();
    if analysis.migration_required() {
        notes.push("Run database migrations before deploying.");
    }
    if breaking {
        notes.push("Review breaking changes before upgrading.");
    }
    let migration_notes = (!notes.is_empty()).then(|| notes.join(" "));

    let mut tags: BTreeSet<String> = analysis
        .files
        .iter()
        .flat_map(|f| f.semantic_tags.iter().cloned())
        .collect();
    tags.insert(record.conventional_type.as_str().to_string());

    let mut related_areas: BTreeSet<String> =
        analysis.categories().iter().map(|c| c.as_str().to_string()).collect();
    if let Some(scope) = &record.scope {
        related_areas.insert(scope.clone());
    }

    AiSummary {
        summary,
        technical_summary,
        category: category_for(record.conventional_type).to_string(),
        impact,
        scope,
        user_facing,
        breaking,
        business_impact: business_impact_text(impact, user_facing),
        technical_impact,
        highlights,
        migration_notes,
        tags: tags.into_iter().collect(),
        related_areas: related_areas.into_iter().collect(),
        risk_level: risk.as_str().to_string(),
        confidence: if parts.explicit {
            CONVENTIONAL_CONFIDENCE
        } else {
            INFERRED_CONFIDENCE
        },
        source: SummarySource::RuleBased,
    }
}
