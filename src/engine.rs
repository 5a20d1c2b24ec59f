//! End-to-end analysis over a [`CommitSource`].

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{
    ClassifyInput, CommitAnalysis, DiffClassifier, FileChange, ReleaseInsights, ScoringPolicy,
    aggregate, synthesize,
};
use crate::error::AnalysisError;
use crate::git::{
    Author, ChangeStatus, CommitFilter, CommitId, CommitRecord, CommitSource, CommitType, FileEntry,
    GitRepository, PendingChange, SnapshotSide, WorkingTreeStatus,
};
use crate::summarize::{MetricsSnapshot, RunMetrics, Summarizer};

/// Id given to the uncommitted-changes pseudo-commit.
pub const WORKTREE_ID: &str = "WORKTREE";
pub const WORKTREE_SUBJECT: &str = "Uncommitted changes";
pub const DEFAULT_CONTEXT_LINES: u32 = 3;

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub filter: CommitFilter,
    /// Append staged and unstaged changes as one extra unit.
    pub include_working_tree: bool,
    pub context_lines: u32,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            filter: CommitFilter::default(),
            include_working_tree: false,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

/// The document an analysis run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub commits: Vec<CommitAnalysis>,
    pub insights: ReleaseInsights,
    pub metrics: MetricsSnapshot,
    pub branch: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Commits classified and scored, before summarization.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRun {
    pub commits: Vec<CommitAnalysis>,
    pub branch: Option<String>,
}

pub struct Engine {
    classifier: DiffClassifier,
    scoring: ScoringPolicy,
    summarizer: Summarizer,
}

impl Engine {
    pub fn new(summarizer: Summarizer) -> Self {
        Self {
            classifier: DiffClassifier::default(),
            scoring: ScoringPolicy::default(),
            summarizer,
        }
    }

    pub fn with_classifier(mut self, classifier: DiffClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_scoring_policy(mut self, scoring: ScoringPolicy) -> Self {
        self.scoring = scoring;
        self
    }

    /// Read everything needed from `source` and classify it.
    ///
    /// Source failures degrade the result; they never abort it.
    pub fn prepare<S: CommitSource + ?Sized>(
        &self,
        source: &S,
        request: &AnalysisRequest,
    ) -> PreparedRun {
        let branch = match source.branches() {
            Ok(branches) => branches.current,
            Err(e) => {
                warn!("Could not read branches: {}", e);
                None
            }
        };

        let records = source.list_commits(&request.filter).unwrap_or_else(|e| {
            warn!("Could not list commits, analyzing none: {}", e);
            Vec::new()
        });
        info!("Analyzing {} commits", records.len());

        let mut commits: Vec<CommitAnalysis> = records
            .into_iter()
            .map(|record| self.analyze_commit(source, record, request.context_lines))
            .collect();

        if request.include_working_tree {
            match source.working_tree_status() {
                Ok(status) => commits.extend(self.analyze_working_tree(status)),
                Err(e) => warn!("Could not read working tree status: {}", e),
            }
        }

        PreparedRun { commits, branch }
    }

    /// Classify and score one commit.
    pub fn analyze_commit<S: CommitSource + ?Sized>(
        &self,
        source: &S,
        record: CommitRecord,
        context_lines: u32,
    ) -> CommitAnalysis {
        let entries = source.file_changes_for(&record.id).unwrap_or_else(|e| {
            warn!("Could not list files for {}: {}", record.id, e);
            Vec::new()
        });

        let files: Vec<FileChange> = entries
            .iter()
            .map(|entry| {
                let diff = source
                    .diff_for(&record.id, &entry.path, context_lines)
                    .unwrap_or_else(|e| {
                        warn!("Could not diff {} in {}: {}", entry.path, record.id, e);
                        None
                    });
                let (before, after) = if diff.is_some() {
                    snapshots(source, &record.id, entry)
                } else {
                    (None, None)
                };
                let mut input = ClassifyInput::new(entry.status, &entry.path, diff.as_deref());
                input.old_path = entry.old_path.as_deref();
                input.before = before.as_deref();
                input.after = after.as_deref();
                self.classifier.classify(&input)
            })
            .collect();

        debug!("{}: {} files classified", record.id, files.len());
        aggregate(record, files, &self.scoring)
    }

    /// Fold pending changes into one pseudo-commit. `None` when clean.
    pub fn analyze_working_tree(&self, status: WorkingTreeStatus) -> Option<CommitAnalysis> {
        if status.is_empty() {
            return None;
        }

        let changes = merge_pending(status);
        let files = changes
            .iter()
            .map(|change| {
                let mut input = ClassifyInput::new(change.status, &change.path, change.diff.as_deref());
                input.old_path = change.old_path.as_deref();
                self.classifier.classify(&input)
            })
            .collect();

        Some(aggregate(worktree_record(), files, &self.scoring))
    }

    /// Run the full pipeline against `source`.
    pub async fn analyze<S: CommitSource + ?Sized>(
        &self,
        source: &S,
        request: &AnalysisRequest,
    ) -> AnalysisResult {
        let PreparedRun { commits, branch } = self.prepare(source, request);

        let metrics = RunMetrics::new();
        let commits = self.summarizer.summarize_all(commits, &metrics).await;
        let insights = synthesize(&commits);

        AnalysisResult {
            commits,
            insights,
            metrics: metrics.snapshot(),
            branch,
            generated_at: Utc::now(),
        }
    }

    /// Open the repository at `path` and analyze it.
    pub async fn analyze_path(
        &self,
        path: impl AsRef<Path>,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        let repo = GitRepository::open(path)?;
        Ok(self.analyze(&repo, request).await)
    }
}

/// File content on both sides of `entry`'s change, where it exists.
fn snapshots<S: CommitSource + ?Sized>(
    source: &S,
    id: &CommitId,
    entry: &FileEntry,
) -> (Option<String>, Option<String>) {
    let read = |path: &str, side| {
        source.content_at(id, path, side).unwrap_or_else(|e| {
            warn!("Could not read {} in {}: {}", path, id, e);
            None
        })
    };

    let before = (entry.status != ChangeStatus::Added)
        .then(|| read(entry.old_path.as_deref().unwrap_or(&entry.path), SnapshotSide::Before))
        .flatten();
    let after = (entry.status != ChangeStatus::Deleted)
        .then(|| read(&entry.path, SnapshotSide::After))
        .flatten();
    (before, after)
}

/// Staged entries first; an unstaged diff of an already staged path is
/// appended to that entry.
fn merge_pending(status: WorkingTreeStatus) -> Vec<PendingChange> {
    let mut merged: Vec<PendingChange> = status.staged;
    for change in status.unstaged {
        match merged.iter_mut().find(|c| c.path == change.path) {
            Some(existing) => {
                existing.diff = match (existing.diff.take(), change.diff) {
                    (Some(a), Some(b)) => Some(format!("{}\n{}", a.trim_end(), b)),
                    (a, b) => a.or(b),
                };
            }
            None => merged.push(change),
        }
    }
    merged
}

fn worktree_record() -> CommitRecord {
    let now = Utc::now();
    CommitRecord {
        id: CommitId::new(WORKTREE_ID, WORKTREE_ID),
        author: Author {
            name: String::new(),
            email: String::new(),
        },
        author_timestamp: now,
        commit_timestamp: now,
        subject: WORKTREE_SUBJECT.to_string(),
        body: String::new(),
        conventional_type: CommitType::Other,
        scope: None,
        breaking: false,
    }
}
