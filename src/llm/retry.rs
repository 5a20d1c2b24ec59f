//! Exponential backoff retry for summarization calls.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::debug;

use crate::error::LlmError;

/// Attempt budget and backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Retry `attempt` while it fails with a retryable [`LlmError`].
///
/// Non-retryable errors are returned unchanged on the spot. When the
/// attempt budget runs out the last error is wrapped in
/// [`LlmError::RetriesExhausted`]. A rate-limit `retry_after` hint longer
/// than the computed backoff is honored.
pub async fn retry_with_backoff<T, Fut, F>(policy: &RetryPolicy, mut attempt: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut backoff = policy.backoff();
    let mut attempts = 0;

    loop {
        attempts += 1;

        let error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if attempts >= policy.max_attempts.max(1) {
            return Err(LlmError::RetriesExhausted(Box::new(error)));
        }

        let mut wait = backoff.next_backoff().unwrap_or(policy.max_interval);
        if let LlmError::RateLimited {
            retry_after: Some(secs),
        } = &error
        {
            wait = wait.max(Duration::from_secs(*secs));
        }
        debug!("Attempt {} failed ({}), retrying in {:?}", attempts, error, wait);
        tokio::time::sleep(wait).await;
    }
}
