//! Per-commit summaries: batched service calls with a rule-based fallback.

pub mod fallback;
pub mod metrics;
pub mod orchestrator;

pub use fallback::{category_for, rule_based_summary};
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use orchestrator::{
    DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_CALL_TIMEOUT, SummarizeConfig, Summarizer,
};
