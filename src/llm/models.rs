//! Model tier selection and availability fallback.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::analysis::{CommitAnalysis, RiskLevel};
use crate::error::{LlmError, SelectionError};

lazy_static! {
    static ref MODEL_ID: Regex = Regex::new(r"^[A-Za-z0-9._:/-]+$").unwrap();
}

/// Capability tiers, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Reasoning,
    Complex,
    Default,
    Simple,
    Legacy,
}

impl ModelTier {
    pub const ALL: [ModelTier; 5] = [
        Self::Reasoning,
        Self::Complex,
        Self::Default,
        Self::Simple,
        Self::Legacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Complex => "complex",
            Self::Default => "default",
            Self::Simple => "simple",
            Self::Legacy => "legacy",
        }
    }

    /// Tiers to try, in order, when `self` is preferred.
    pub fn fallback_order(self) -> Vec<ModelTier> {
        let mut order = vec![self];
        if self == Self::Reasoning {
            order.push(Self::Complex);
        }
        for tier in [Self::Default, Self::Simple, Self::Legacy] {
            if !order.contains(&tier) {
                order.push(tier);
            }
        }
        order
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reasoning" => Ok(Self::Reasoning),
            "complex" => Ok(Self::Complex),
            "default" => Ok(Self::Default),
            "simple" => Ok(Self::Simple),
            "legacy" => Ok(Self::Legacy),
            _ => Err(format!("Unknown model tier: {}", s)),
        }
    }
}

/// Provider model ids per tier. Unset tiers are unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    models: HashMap<ModelTier, String>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tier: ModelTier, model: impl Into<String>) -> Self {
        self.set(tier, model);
        self
    }

    pub fn set(&mut self, tier: ModelTier, model: impl Into<String>) {
        let model = model.into();
        if model.trim().is_empty() {
            self.models.remove(&tier);
        } else {
            self.models.insert(tier, model);
        }
    }

    pub fn get(&self, tier: ModelTier) -> Option<&str> {
        self.models.get(&tier).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Explicit caller choice that bypasses the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOverride {
    Tier(ModelTier),
    Model(String),
}

impl ModelOverride {
    /// Parse a tier name, or else a syntactically valid model id.
    pub fn parse(value: &str) -> Result<Self, SelectionError> {
        let value = value.trim();
        if let Ok(tier) = value.parse::<ModelTier>() {
            return Ok(Self::Tier(tier));
        }
        if MODEL_ID.is_match(value) {
            Ok(Self::Model(value.to_string()))
        } else {
            Err(SelectionError::InvalidOverride(value.to_string()))
        }
    }
}

/// Thresholds that map a commit onto a preferred tier.
///
/// The defaults are tunable heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub architectural_files: usize,
    pub architectural_lines: usize,
    /// Breaking commits touching this many files count as architectural.
    pub architectural_breaking_files: usize,
    pub complex_files: usize,
    pub complex_lines: usize,
    /// Complex commits at or above this risk are sent to the reasoning tier.
    pub reasoning_risk: RiskLevel,
    pub minimal_files: usize,
    pub minimal_lines: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            architectural_files: 50,
            architectural_lines: 2000,
            architectural_breaking_files: 10,
            complex_files: 10,
            complex_lines: 500,
            reasoning_risk: RiskLevel::High,
            minimal_files: 2,
            minimal_lines: 50,
        }
    }
}

impl SelectionPolicy {
    pub fn preferred_tier(&self, analysis: &CommitAnalysis) -> ModelTier {
        let files = analysis.file_count();
        let lines = analysis.lines_changed();
        let breaking = analysis.is_breaking();

        if files >= self.architectural_files
            || lines >= self.architectural_lines
            || (breaking && files >= self.architectural_breaking_files)
        {
            ModelTier::Reasoning
        } else if files >= self.complex_files || lines >= self.complex_lines {
            if breaking || analysis.risk_assessment.level >= self.reasoning_risk {
                ModelTier::Reasoning
            } else {
                ModelTier::Complex
            }
        } else if files <= self.minimal_files && lines <= self.minimal_lines && !breaking {
            ModelTier::Simple
        } else {
            ModelTier::Default
        }
    }
}

/// The model a commit will be summarized with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    /// `None` for an explicit model-id override.
    pub tier: Option<ModelTier>,
    pub model: String,
}

/// Walk the fallback order from `preferred`, returning the first configured
/// model for which `probe` answers `true`.
pub async fn choose_model<F, Fut>(
    preferred: ModelTier,
    catalog: &ModelCatalog,
    mut probe: F,
) -> Result<ModelChoice, SelectionError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut tried: Vec<String> = Vec::new();

    for tier in preferred.fallback_order() {
        let Some(model) = catalog.get(tier) else {
            continue;
        };
        if tried.iter().any(|m| m == model) {
            continue;
        }
        tried.push(model.to_string());

        if probe(model.to_string()).await {
            if tier != preferred {
                debug!("Preferred tier {} unavailable, using {} ({})", preferred, tier, model);
            }
            return Ok(ModelChoice {
                tier: Some(tier),
                model: model.to_string(),
            });
        }
    }

    Err(SelectionError::NoModelAvailable { tried })
}

/// Per-run memo of probe outcomes, shared by concurrent summarizations.
///
/// The lock is held across the probe so each model is probed at most once.
/// Only definitive answers are remembered; a probe that failed transiently
/// is tried again by the next commit that needs the model.
#[derive(Debug, Default)]
pub struct ProbeCache {
    results: Mutex<HashMap<String, bool>>,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, model: &str) -> Option<bool> {
        self.results.lock().await.get(model).copied()
    }

    /// Record an outcome observed outside a probe, e.g. a completion that
    /// reported the model missing.
    pub async fn record(&self, model: &str, available: bool) {
        self.results.lock().await.insert(model.to_string(), available);
    }

    /// Availability of `model`, running `probe` unless an answer is cached.
    pub async fn probe_with<F, Fut>(&self, model: &str, probe: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), LlmError>>,
    {
        let mut results = self.results.lock().await;
        if let Some(available) = results.get(model) {
            return *available;
        }

        match probe().await {
            Ok(()) => {
                results.insert(model.to_string(), true);
                true
            }
            Err(e) if e.marks_model_unavailable() => {
                warn!("Model {} failed availability probe: {}", model, e);
                results.insert(model.to_string(), false);
                false
            }
            Err(e) => {
                warn!("Availability probe for {} did not complete: {}", model, e);
                false
            }
        }
    }
}
