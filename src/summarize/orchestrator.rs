//! Batched summarization against the completion service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::analysis::{AiSummary, CommitAnalysis};
use crate::error::{LlmError, SelectionError};
use crate::llm::{
    CompletionClient, CompletionOptions, DEFAULT_MAX_PROMPT_FILES, ModelCatalog, ModelChoice,
    ModelOverride, ModelTier, ProbeCache, ReasoningEffort, RetryPolicy, SelectionPolicy,
    build_summary_prompt, choose_model, parse_summary_response, retry_with_backoff,
};

use super::fallback::rule_based_summary;
use super::metrics::RunMetrics;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Knobs for one summarization run.
#[derive(Debug, Clone)]
pub struct SummarizeConfig {
    pub batch_size: usize,
    /// Pause between batches, applied only while the service is in use.
    pub batch_delay: Duration,
    pub call_timeout: Duration,
    pub max_prompt_files: usize,
    pub retry: RetryPolicy,
    /// Budget for the whole run; once spent, no new service calls are made.
    pub deadline: Option<Duration>,
    pub model_override: Option<ModelOverride>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_prompt_files: DEFAULT_MAX_PROMPT_FILES,
            retry: RetryPolicy::default(),
            deadline: None,
            model_override: None,
            temperature: Some(0.2),
            max_tokens: Some(1024),
        }
    }
}

/// Attaches an [`AiSummary`] to every commit, from the service when
/// possible and from [`rule_based_summary`] otherwise.
pub struct Summarizer {
    client: Option<Arc<dyn CompletionClient>>,
    catalog: ModelCatalog,
    selection: SelectionPolicy,
    config: SummarizeConfig,
    probes: ProbeCache,
}

impl Summarizer {
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        catalog: ModelCatalog,
        config: SummarizeConfig,
    ) -> Self {
        Self {
            client,
            catalog,
            selection: SelectionPolicy::default(),
            config,
            probes: ProbeCache::new(),
        }
    }

    /// Summarizer that never calls the service.
    pub fn rule_based() -> Self {
        Self::new(None, ModelCatalog::new(), SummarizeConfig::default())
    }

    pub fn with_selection_policy(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    fn service(&self) -> Option<&dyn CompletionClient> {
        let client = self.client.as_deref()?;
        let has_model = !self.catalog.is_empty()
            || matches!(self.config.model_override, Some(ModelOverride::Model(_)));
        has_model.then_some(client)
    }

    /// Summarize `commits` in batches, preserving their order.
    pub async fn summarize_all(
        &self,
        commits: Vec<CommitAnalysis>,
        metrics: &RunMetrics,
    ) -> Vec<CommitAnalysis> {
        let total = commits.len();
        let batch_size = self.config.batch_size.max(1);
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let uses_service = self.service().is_some();

        if self.client.is_some() && !uses_service {
            warn!("No summarization models configured; using rule-based summaries");
        }

        let mut results = Vec::with_capacity(total);
        let mut remaining = commits.into_iter().enumerate().peekable();
        let mut batch_number = 0usize;

        while remaining.peek().is_some() {
            let past_deadline = deadline.is_some_and(|d| Instant::now() >= d);
            if batch_number > 0 && uses_service && !past_deadline {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            batch_number += 1;

            let batch: Vec<(usize, CommitAnalysis)> = remaining.by_ref().take(batch_size).collect();
            debug!("Summarizing batch {} ({} commits)", batch_number, batch.len());

            let mut pending: FuturesUnordered<_> = batch
                .into_iter()
                .map(|(index, commit)| async move {
                    let summary = self.summarize_one(&commit, deadline, metrics).await;
                    (index, commit, summary)
                })
                .collect();

            let mut done = Vec::with_capacity(batch_size);
            while let Some((index, mut commit, summary)) = pending.next().await {
                commit.ai_summary = Some(summary);
                done.push((index, commit));
            }
            done.sort_by_key(|(index, _)| *index);
            results.extend(done.into_iter().map(|(_, commit)| commit));

            metrics.record_batch();
        }

        info!("Summarized {} commits in {} batches", total, batch_number);
        results
    }

    /// Summary for one commit. Never fails.
    pub async fn summarize_one(
        &self,
        analysis: &CommitAnalysis,
        deadline: Option<Instant>,
        metrics: &RunMetrics,
    ) -> AiSummary {
        metrics.record_commit();
        let fallback = rule_based_summary(analysis);

        let Some(client) = self.service() else {
            return fallback;
        };
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("Deadline reached, using rule-based summary for {}", analysis.record.id);
            return fallback;
        }

        let selection = self.select_model(client, analysis, metrics);
        let choice = match before_deadline(deadline, selection).await {
            Some(Ok(choice)) => choice,
            Some(Err(e)) => {
                warn!("{}; using rule-based summary for {}", e, analysis.record.id);
                metrics.record_error();
                return fallback;
            }
            None => {
                debug!("Deadline reached while selecting a model for {}", analysis.record.id);
                return fallback;
            }
        };

        let messages = build_summary_prompt(analysis, self.config.max_prompt_files);
        let options = CompletionOptions {
            model: choice.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            reasoning_effort: (choice.tier == Some(ModelTier::Reasoning)).then_some(ReasoningEffort::Medium),
        };
        let call_timeout = self.config.call_timeout;

        let call = retry_with_backoff(&self.config.retry, || async {
            metrics.record_api_call();
            with_call_timeout(call_timeout, client.complete(&messages, &options)).await
        });

        let Some(result) = before_deadline(deadline, call).await else {
            debug!("Deadline reached while summarizing {}", analysis.record.id);
            return fallback;
        };

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                if is_model_unavailable(&e) {
                    self.probes.record(&choice.model, false).await;
                }
                warn!(
                    "Summarization failed for {} with {}: {}",
                    analysis.record.id, choice.model, e
                );
                metrics.record_error();
                return fallback;
            }
        };

        if let Some(usage) = completion.usage {
            metrics.add_tokens(usage.total_tokens.max(usage.prompt_tokens + usage.completion_tokens));
        }

        match parse_summary_response(&completion.content) {
            Ok(parsed) => parsed.complete(fallback, &completion.model),
            Err(e) => {
                warn!("Unusable summary for {}: {}", analysis.record.id, e);
                metrics.record_error();
                fallback
            }
        }
    }

    async fn select_model(
        &self,
        client: &dyn CompletionClient,
        analysis: &CommitAnalysis,
        metrics: &RunMetrics,
    ) -> Result<ModelChoice, SelectionError> {
        let preferred = match &self.config.model_override {
            Some(ModelOverride::Model(model)) => {
                return Ok(ModelChoice {
                    tier: None,
                    model: model.clone(),
                });
            }
            Some(ModelOverride::Tier(tier)) => {
                if let Some(model) = self.catalog.get(*tier) {
                    return Ok(ModelChoice {
                        tier: Some(*tier),
                        model: model.to_string(),
                    });
                }
                *tier
            }
            None => self.selection.preferred_tier(analysis),
        };

        let probes = &self.probes;
        let retry = &self.config.retry;
        let call_timeout = self.config.call_timeout;
        choose_model(preferred, &self.catalog, |model| async move {
            probes
                .probe_with(&model, || {
                    retry_with_backoff(retry, || async {
                        metrics.record_api_call();
                        with_call_timeout(call_timeout, client.probe(&model)).await
                    })
                })
                .await
        })
        .await
    }
}

/// `None` when `deadline` passes before `work` finishes.
async fn before_deadline<F: Future>(deadline: Option<Instant>, work: F) -> Option<F::Output> {
    match deadline {
        Some(d) => tokio::time::timeout_at(d, work).await.ok(),
        None => Some(work.await),
    }
}

async fn with_call_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, LlmError>>,
) -> Result<T, LlmError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(LlmError::Timeout(limit.as_secs())))
}

fn is_model_unavailable(error: &LlmError) -> bool {
    match error {
        LlmError::ModelUnavailable(_) => true,
        LlmError::RetriesExhausted(inner) => is_model_unavailable(inner),
        _ => false,
    }
}
