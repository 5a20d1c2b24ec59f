//! annalist - classifies git commits and pending changes, scores their risk,
//! and summarizes them into release insights.
//!
//! # Overview
//!
//! annalist reads commits from a git repository, classifies every changed
//! file, scores each commit's complexity and risk, asks an OpenAI-compatible
//! summarization service for a structured summary (falling back to a
//! rule-based one), and rolls everything up into release insights.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod llm;
pub mod summarize;

// Re-export commonly used types
pub use analysis::{
    AiSummary, CommitAnalysis, FileCategory, FileChange, ReleaseInsights, RiskLevel, SummarySource,
};
pub use config::Settings;
pub use engine::{AnalysisRequest, AnalysisResult, Engine};
pub use error::{AnalysisError, ConfigError, GitError, LlmError, PolicyError, SelectionError};
pub use git::{CommitFilter, CommitRecord, CommitSource, CommitType, GitRepository};
pub use llm::{CompletionClient, HttpCompletionClient, ModelCatalog, ModelOverride, ModelTier};
pub use summarize::{MetricsSnapshot, SummarizeConfig, Summarizer};
