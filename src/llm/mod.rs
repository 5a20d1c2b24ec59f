//! Summarization service access: client, model selection and prompts.

pub mod client;
pub mod json;
pub mod models;
pub mod prompt;
pub mod response;
pub mod retry;

pub use client::{
    ChatMessage, Completion, CompletionClient, CompletionOptions, HttpCompletionClient,
    ReasoningEffort, Role, Usage,
};
pub use json::extract_json_object;
pub use models::{
    ModelCatalog, ModelChoice, ModelOverride, ModelTier, ProbeCache, SelectionPolicy, choose_model,
};
pub use prompt::{DEFAULT_MAX_PROMPT_FILES, build_summary_prompt, sanitize_for_prompt};
pub use response::{ServiceSummary, parse_summary_response};
pub use retry::{RetryPolicy, retry_with_backoff};
