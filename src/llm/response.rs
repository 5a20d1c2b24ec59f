//! Parsing of summary completions into [`AiSummary`].

use serde::Deserialize;

use crate::analysis::{AiSummary, Impact, ReleaseScope, SummarySource};
use crate::error::LlmError;

use super::json::extract_json_object;

/// Summary as the service returns it.
///
/// Only `summary` is required; anything missing is completed from a
/// rule-based summary so the result is always fully populated.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceSummary {
    pub summary: String,
    #[serde(alias = "technicalSummary")]
    pub technical_summary: Option<String>,
    pub category: Option<String>,
    pub impact: Option<Impact>,
    pub scope: Option<ReleaseScope>,
    #[serde(alias = "userFacing")]
    pub user_facing: Option<bool>,
    pub breaking: Option<bool>,
    #[serde(alias = "businessImpact")]
    pub business_impact: Option<String>,
    #[serde(alias = "technicalImpact")]
    pub technical_impact: Option<String>,
    pub highlights: Option<Vec<String>>,
    #[serde(alias = "migrationNotes")]
    pub migration_notes: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(alias = "relatedAreas")]
    pub related_areas: Option<Vec<String>>,
    #[serde(alias = "riskLevel")]
    pub risk_level: Option<String>,
    pub confidence: Option<f64>,
}

impl ServiceSummary {
    /// Fill gaps from `fallback` and stamp the answering model.
    pub fn complete(self, fallback: AiSummary, model: &str) -> AiSummary {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        AiSummary {
            summary: self.summary.trim().to_string(),
            technical_summary: non_empty(self.technical_summary).unwrap_or(fallback.technical_summary),
            category: non_empty(self.category)
                .map(|c| c.to_lowercase())
                .unwrap_or(fallback.category),
            impact: self.impact.unwrap_or(fallback.impact),
            scope: self.scope.unwrap_or(fallback.scope),
            user_facing: self.user_facing.unwrap_or(fallback.user_facing),
            // A deterministic breaking signal is never downgraded by the service.
            breaking: self.breaking.unwrap_or(false) || fallback.breaking,
            business_impact: non_empty(self.business_impact).unwrap_or(fallback.business_impact),
            technical_impact: non_empty(self.technical_impact).unwrap_or(fallback.technical_impact),
            highlights: self.highlights.unwrap_or(fallback.highlights),
            migration_notes: non_empty(self.migration_notes).or(fallback.migration_notes),
            tags: self.tags.unwrap_or(fallback.tags),
            related_areas: self.related_areas.unwrap_or(fallback.related_areas),
            risk_level: non_empty(self.risk_level)
                .map(|r| r.to_lowercase())
                .unwrap_or(fallback.risk_level),
            confidence: self
                .confidence
                .filter(|c| c.is_finite())
                .map_or(fallback.confidence, |c| c.clamp(0.0, 1.0)),
            source: SummarySource::Service {
                model: model.to_string(),
            },
        }
    }
}

/// Parse completion text into a [`ServiceSummary`].
pub fn parse_summary_response(content: &str) -> Result<ServiceSummary, LlmError> {
    let json = extract_json_object(content).ok_or_else(|| {
        let preview: String = content.chars().take(200).collect();
        LlmError::InvalidResponse(format!("no JSON object in response: {}", preview))
    })?;

    let parsed: ServiceSummary = serde_json::from_str(&json)
        .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse: {}", e)))?;

    if parsed.summary.trim().is_empty() {
        return Err(LlmError::InvalidResponse("summary is empty".to_string()));
    }
    Ok(parsed)
}
