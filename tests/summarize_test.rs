//! Integration tests for batched summarization with a scripted service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use annalist::analysis::{CommitAnalysis, ScoringPolicy, SummarySource, aggregate};
use annalist::error::LlmError;
use annalist::llm::{CompletionClient, ModelCatalog, ModelOverride, ModelTier};
use annalist::summarize::{RunMetrics, SummarizeConfig, Summarizer, rule_based_summary};

use common::{Reply, ScriptedClient, record, service_reply};

fn commits(n: usize) -> Vec<CommitAnalysis> {
    (0..n)
        .map(|i| aggregate(record(i, &format!("fix: issue {i}")), Vec::new(), &ScoringPolicy::default()))
        .collect()
}

fn catalog() -> ModelCatalog {
    ModelCatalog::new()
        .with(ModelTier::Default, "mid-model")
        .with(ModelTier::Simple, "small-model")
}

fn summarizer(client: &Arc<ScriptedClient>, config: SummarizeConfig) -> Summarizer {
    let client: Arc<dyn CompletionClient> = client.clone();
    Summarizer::new(Some(client), catalog(), config)
}

fn unauthorized() -> Result<String, LlmError> {
    Err(LlmError::Unauthorized("bad key".into()))
}

#[tokio::test(start_paused = true)]
async fn test_every_commit_gets_a_complete_summary() {
    let client = Arc::new(
        ScriptedClient::answering(service_reply("Fixed it"))
            .then(Reply::Content("not json at all".into()))
            .then(Reply::Content(r#"{"summary": ""}"#.into())),
    );
    let summarizer = summarizer(&client, SummarizeConfig::default());
    let metrics = RunMetrics::new();

    let out = summarizer.summarize_all(commits(6), &metrics).await;

    assert_eq!(out.len(), 6);
    for commit in &out {
        let summary = commit.ai_summary.as_ref().expect("summary attached");
        assert!(!summary.summary.is_empty());
        assert!(!summary.technical_summary.is_empty());
        assert!(!summary.category.is_empty());
        assert!(!summary.business_impact.is_empty());
        assert!(!summary.technical_impact.is_empty());
        assert!(!summary.risk_level.is_empty());
        assert!((0.0..=1.0).contains(&summary.confidence));
    }
    let rule_based = out
        .iter()
        .filter(|c| c.ai_summary.as_ref().is_some_and(|s| s.is_rule_based()))
        .count();
    assert_eq!(rule_based, 2);
    assert_eq!(metrics.snapshot().errors, 2);
}

#[tokio::test(start_paused = true)]
async fn test_one_failure_does_not_affect_its_batch() {
    let client = Arc::new(
        ScriptedClient::answering(service_reply("From the service")).on_prompt("issue 2", unauthorized),
    );
    let config = SummarizeConfig {
        batch_size: 5,
        ..SummarizeConfig::default()
    };
    let summarizer = summarizer(&client, config);
    let metrics = RunMetrics::new();

    let out = summarizer.summarize_all(commits(5), &metrics).await;

    for (i, commit) in out.iter().enumerate() {
        let summary = commit.ai_summary.as_ref().unwrap();
        if i == 2 {
            assert_eq!(summary, &rule_based_summary(&commits(5)[2]));
        } else {
            assert_eq!(summary.summary, "From the service");
            assert_eq!(summary.source, SummarySource::Service { model: "small-model".into() });
        }
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.commits_processed, 5);
    // One probe plus five completions; unauthorized is not retried.
    assert_eq!(snapshot.api_calls, 6);
}

#[tokio::test(start_paused = true)]
async fn test_order_is_preserved_across_batches() {
    // Later commits in each batch answer first.
    let mut client = ScriptedClient::answering(service_reply("ok"));
    for i in 0..8u64 {
        client = client.delay_on(&format!("issue {i}"), Duration::from_millis((8 - i) * 10));
    }
    let client = Arc::new(client);
    let config = SummarizeConfig {
        batch_size: 4,
        ..SummarizeConfig::default()
    };
    let summarizer = summarizer(&client, config);
    let metrics = RunMetrics::new();

    let input = commits(8);
    let expected: Vec<String> = input.iter().map(|c| c.record.id.full.clone()).collect();
    let out = summarizer.summarize_all(input, &metrics).await;

    let finished = client.completion_order();
    assert_eq!(&finished[..4], ["issue 3", "issue 2", "issue 1", "issue 0"]);
    let actual: Vec<String> = out.iter().map(|c| c.record.id.full.clone()).collect();
    assert_eq!(actual, expected);
    assert_eq!(metrics.snapshot().batches_processed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_batches_are_spaced_by_delay() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")));
    let config = SummarizeConfig {
        batch_size: 2,
        batch_delay: Duration::from_secs(1),
        ..SummarizeConfig::default()
    };
    let summarizer = summarizer(&client, config);

    let start = tokio::time::Instant::now();
    summarizer.summarize_all(commits(5), &RunMetrics::new()).await;

    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_rule_based_run_has_no_delays() {
    let summarizer = Summarizer::rule_based();
    let metrics = RunMetrics::new();

    let start = tokio::time::Instant::now();
    let out = summarizer.summarize_all(commits(25), &metrics).await;

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(out.iter().all(|c| c.ai_summary.as_ref().is_some_and(|s| s.is_rule_based())));
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.api_calls, 0);
    assert_eq!(snapshot.errors, 0);
    assert_eq!(snapshot.batches_processed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_each_model_is_probed_once() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")));
    let summarizer = summarizer(&client, SummarizeConfig::default());

    summarizer.summarize_all(commits(12), &RunMetrics::new()).await;

    assert_eq!(client.probe_count(), 1);
    assert_eq!(client.call_count(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_probe_is_retried() {
    let client = Arc::new(
        ScriptedClient::answering(service_reply("ok"))
            .then_probe(|| LlmError::RateLimited { retry_after: Some(1) }),
    );
    let summarizer = summarizer(&client, SummarizeConfig::default());
    let metrics = RunMetrics::new();

    let out = summarizer.summarize_all(commits(12), &metrics).await;

    for commit in &out {
        let summary = commit.ai_summary.as_ref().unwrap();
        assert_eq!(summary.source, SummarySource::Service { model: "small-model".into() });
    }
    assert_eq!(client.probe_count(), 2);
    assert_eq!(client.call_count(), 12);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.errors, 0);
    assert_eq!(snapshot.api_calls, 14);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_probe_is_tried_again_later() {
    let client = Arc::new(
        ScriptedClient::answering(service_reply("ok"))
            .then_probe(|| LlmError::Unknown("503".into()))
            .then_probe(|| LlmError::Unknown("503".into()))
            .then_probe(|| LlmError::Unknown("503".into())),
    );
    let catalog = ModelCatalog::new().with(ModelTier::Simple, "small-model");
    let shared: Arc<dyn CompletionClient> = client.clone();
    let config = SummarizeConfig {
        batch_size: 1,
        ..SummarizeConfig::default()
    };
    let summarizer = Summarizer::new(Some(shared), catalog, config);
    let metrics = RunMetrics::new();

    let out = summarizer.summarize_all(commits(2), &metrics).await;

    assert!(out[0].ai_summary.as_ref().unwrap().is_rule_based());
    assert_eq!(
        out[1].ai_summary.as_ref().unwrap().source,
        SummarySource::Service { model: "small-model".into() }
    );
    assert_eq!(client.probe_count(), 4);
    assert_eq!(metrics.snapshot().errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_probe_stops_at_deadline() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")).with_stalled_probes());
    let config = SummarizeConfig {
        deadline: Some(Duration::from_secs(5)),
        call_timeout: Duration::from_secs(10),
        ..SummarizeConfig::default()
    };
    let summarizer = summarizer(&client, config);
    let metrics = RunMetrics::new();

    let start = tokio::time::Instant::now();
    let out = tokio::time::timeout(Duration::from_secs(3600), summarizer.summarize_all(commits(3), &metrics))
        .await
        .expect("run finishes");

    assert!(start.elapsed() <= Duration::from_secs(6));
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|c| c.ai_summary.as_ref().is_some_and(|s| s.is_rule_based())));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_probe_times_out_per_call() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")).with_stalled_probes());
    let config = SummarizeConfig {
        call_timeout: Duration::from_secs(2),
        ..SummarizeConfig::default()
    };
    let summarizer = summarizer(&client, config);
    let metrics = RunMetrics::new();

    let out = tokio::time::timeout(Duration::from_secs(3600), summarizer.summarize_all(commits(1), &metrics))
        .await
        .expect("run finishes");

    assert!(out[0].ai_summary.as_ref().unwrap().is_rule_based());
    // Both configured tiers, three attempts each.
    assert_eq!(client.probe_count(), 6);
    assert_eq!(metrics.snapshot().errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_tier_falls_back_to_next() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")).without_model("small-model"));
    let summarizer = summarizer(&client, SummarizeConfig::default());

    let out = summarizer.summarize_all(commits(3), &RunMetrics::new()).await;

    for commit in &out {
        let summary = commit.ai_summary.as_ref().unwrap();
        assert_eq!(summary.source, SummarySource::Service { model: "mid-model".into() });
    }
    let used = client.models_used.lock().unwrap();
    assert_eq!(used.get("mid-model"), Some(&3));
    assert_eq!(used.get("small-model"), None);
}

#[tokio::test(start_paused = true)]
async fn test_model_override_skips_policy() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")));
    let config = SummarizeConfig {
        model_override: Some(ModelOverride::parse("custom/model-x").unwrap()),
        ..SummarizeConfig::default()
    };
    let summarizer = summarizer(&client, config);

    let out = summarizer.summarize_all(commits(2), &RunMetrics::new()).await;

    assert_eq!(client.probe_count(), 0);
    assert_eq!(
        out[0].ai_summary.as_ref().unwrap().source,
        SummarySource::Service { model: "custom/model-x".into() }
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_retried() {
    let client = Arc::new(
        ScriptedClient::answering(service_reply("after retry"))
            .then(Reply::Error(|| LlmError::RateLimited { retry_after: Some(2) })),
    );
    let summarizer = summarizer(&client, SummarizeConfig::default());
    let metrics = RunMetrics::new();

    let out = summarizer.summarize_all(commits(1), &metrics).await;

    assert_eq!(out[0].ai_summary.as_ref().unwrap().summary, "after retry");
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.api_calls, 3);
    assert_eq!(snapshot.errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_expired_deadline_uses_rule_based() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")));
    let config = SummarizeConfig {
        deadline: Some(Duration::ZERO),
        ..SummarizeConfig::default()
    };
    let summarizer = summarizer(&client, config);
    let metrics = RunMetrics::new();

    let out = summarizer.summarize_all(commits(4), &metrics).await;

    assert_eq!(client.call_count(), 0);
    assert!(out.iter().all(|c| c.ai_summary.as_ref().is_some_and(|s| s.is_rule_based())));
    assert_eq!(metrics.snapshot().errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_tokens_are_counted() {
    let client = Arc::new(ScriptedClient::answering(service_reply("ok")));
    let summarizer = summarizer(&client, SummarizeConfig::default());
    let metrics = RunMetrics::new();

    summarizer.summarize_all(commits(3), &metrics).await;

    assert_eq!(metrics.snapshot().total_tokens, 450);
}
