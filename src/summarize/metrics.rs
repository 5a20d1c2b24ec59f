//! Run counters shared by concurrent summarizations.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct RunMetrics {
    commits_processed: AtomicU64,
    api_calls: AtomicU64,
    errors: AtomicU64,
    total_tokens: AtomicU64,
    batches_processed: AtomicU64,
}

/// Point-in-time copy of [`RunMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub commits_processed: u64,
    pub api_calls: u64,
    pub errors: u64,
    pub total_tokens: u64,
    pub batches_processed: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_commit(&self) {
        self.commits_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tokens(&self, tokens: u64) {
        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits_processed: self.commits_processed.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
        }
    }
}
