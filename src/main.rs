//! annalist - CLI entry point.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use annalist::engine::{AnalysisRequest, DEFAULT_CONTEXT_LINES, Engine};
use annalist::git::{CommitFilter, LogOrder};
use annalist::llm::ModelOverride;
use annalist::{Settings, Summarizer};

/// Analyze git history into classified, risk-scored and summarized commits.
#[derive(Parser, Debug)]
#[command(name = "annalist")]
#[command(about = "Analyze git commits into risk-scored summaries and release insights")]
#[command(version)]
struct Cli {
    /// Repository to analyze
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Revision range such as v1.2.0..HEAD (defaults to HEAD)
    #[arg(long)]
    range: Option<String>,

    /// Only commits after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    since: Option<DateTime<Utc>>,

    /// Only commits before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    until: Option<DateTime<Utc>>,

    /// Only commits by a matching author
    #[arg(long)]
    author: Option<String>,

    /// Only commits whose message matches
    #[arg(long)]
    grep: Option<String>,

    /// Maximum number of commits
    #[arg(long)]
    limit: Option<usize>,

    /// Include merge commits
    #[arg(long)]
    include_merges: bool,

    /// List newest commits first
    #[arg(long)]
    newest_first: bool,

    /// Also analyze staged and unstaged changes
    #[arg(long)]
    working_tree: bool,

    /// Model tier (reasoning, complex, default, simple, legacy) or model id
    #[arg(long)]
    model: Option<String>,

    /// Skip the summarization service and use rule-based summaries only
    #[arg(long)]
    no_ai: bool,

    /// Commits summarized concurrently per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop calling the service after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Write the JSON result here instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD or RFC 3339", value))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("annalist=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    if let (Some(since), Some(until)) = (cli.since, cli.until) {
        if since > until {
            bail!("--since ({}) is after --until ({})", since, until);
        }
    }

    let settings = Settings::from_env();

    let mut config = settings.summarize_config();
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size.max(1);
    }
    config.deadline = cli.deadline_secs.map(Duration::from_secs);
    config.model_override = cli
        .model
        .as_deref()
        .map(ModelOverride::parse)
        .transpose()
        .context("Invalid --model value")?;

    let client = if cli.no_ai {
        None
    } else {
        settings
            .build_client()
            .context("Failed to configure the summarization service")?
    };
    if client.is_none() {
        info!("Using rule-based summaries");
    }

    let engine = Engine::new(Summarizer::new(client, settings.catalog.clone(), config));

    let request = AnalysisRequest {
        filter: CommitFilter {
            since: cli.since,
            until: cli.until,
            author: cli.author,
            grep: cli.grep,
            exclude_merges: !cli.include_merges,
            limit: cli.limit,
            order: if cli.newest_first {
                LogOrder::NewestFirst
            } else {
                LogOrder::OldestFirst
            },
            range: cli.range,
        },
        include_working_tree: cli.working_tree,
        context_lines: DEFAULT_CONTEXT_LINES,
    };

    let result = engine
        .analyze_path(&cli.path, &request)
        .await
        .with_context(|| format!("Cannot analyze {}", cli.path.display()))?;

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize analysis")?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Wrote {} commits to {} ({})",
                result.commits.len(),
                path.display(),
                result.insights.headline
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}
