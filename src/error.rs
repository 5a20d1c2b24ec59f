//! Error types for annalist modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {}", .path.display())]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Repository at {} has no working directory (bare repositories are not supported)", .0.display())]
    BareRepository(PathBuf),

    #[error("Failed to run git {operation}: {source}")]
    SpawnFailed {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {operation} failed: {stderr}")]
    CommandFailed { operation: String, stderr: String },

    #[error("Failed to read repository status: {0}")]
    Status(#[source] git2::Error),

    #[error("Failed to list branches: {0}")]
    Branches(#[source] git2::Error),

    #[error("Failed to read {path} at {rev}: {source}")]
    Object {
        rev: String,
        path: String,
        #[source]
        source: git2::Error,
    },
}

/// Errors from the summarization service.
///
/// The first five variants are the failure kinds the service surfaces;
/// the rest describe what the client did with them.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Summarization service rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("Rate limited by summarization service{}", .retry_after.map_or(String::new(), |s| format!(" (retry after {s}s)")))]
    RateLimited { retry_after: Option<u64> },

    #[error("Model '{0}' is not available")]
    ModelUnavailable(String),

    #[error("Summarization call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Summarization service error: {0}")]
    Unknown(String),

    #[error("Summarization service returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<LlmError>),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Timeout(_) | LlmError::Unknown(_)
        )
    }

    /// Whether the service has definitively refused `model` for this run.
    pub fn marks_model_unavailable(&self) -> bool {
        match self {
            LlmError::ModelUnavailable(_) | LlmError::Unauthorized(_) => true,
            LlmError::RetriesExhausted(inner) => inner.marks_model_unavailable(),
            _ => false,
        }
    }
}

/// Errors from model tier selection.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No summarization model is available (tried: {})", .tried.join(", "))]
    NoModelAvailable { tried: Vec<String> },

    #[error("Invalid model override '{0}'")]
    InvalidOverride(String),
}

/// Errors from scoring and classification policy tables.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Thresholds for {name} must be strictly ascending, got {values:?}")]
    NotAscending { name: &'static str, values: Vec<u32> },

    #[error("Invalid indicator pattern '{pattern}' for {name}: {message}")]
    InvalidPattern {
        name: String,
        pattern: String,
        message: String,
    },
}

/// Errors from runtime settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Invalid API base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Fatal errors from an analysis run.
///
/// Everything else is degraded locally; only a missing commit source stops a run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Repository(#[from] GitError),
}
