//! Deterministic classification, scoring and release rollup.

pub mod aggregate;
pub mod classify;
pub mod insights;
pub mod patterns;
pub mod summary;

pub use aggregate::{
    BucketThresholds, CommitAnalysis, Complexity, LevelThresholds, RiskAssessment, RiskLevel,
    RiskWeights, ScoringPolicy, aggregate,
};
pub use classify::{
    ClassifyInput, ComplexityLevel, ComplexityThresholds, DeploymentImpact, DiffClassifier,
    FileCategory, FileChange, FunctionalImpact, categorize, detect_language,
};
pub use insights::{BusinessImpact, ReleaseComplexity, ReleaseInsights, synthesize};
pub use patterns::{BreakingIndicators, PatternSpec, PatternTable, SemanticPattern};
pub use summary::{AiSummary, Impact, ReleaseScope, SummarySource};
