//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use git2::{Oid, Repository, Signature, Time};

use annalist::error::{GitError, LlmError};
use annalist::git::{
    Author, BranchSet, CommitFilter, CommitId, CommitRecord, CommitSource, FileEntry, SnapshotSide,
    WorkingTreeStatus, parse_commit_message,
};
use annalist::llm::{ChatMessage, Completion, CompletionClient, CompletionOptions, Usage};

/// Base timestamp for deterministic commits (2023-11-14T22:13:20Z).
pub const BASE_TIME: i64 = 1_700_000_000;

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
    commits: usize,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        Self {
            dir,
            repo,
            commits: 0,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Each commit is one minute after the previous one.
    fn signature(&self) -> Signature<'static> {
        let time = Time::new(BASE_TIME + 60 * self.commits as i64, 0);
        Signature::new("Test User", "test@example.com", &time).expect("Failed to create signature")
    }

    /// Write a file into the working tree without staging it.
    pub fn write_file(&self, path: &str, content: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directories");
        }
        std::fs::write(full, content).expect("Failed to write file");
    }

    /// Stage a path that exists in the working tree.
    pub fn stage(&self, path: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(path)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Write and stage `files`, then commit them with `message`.
    pub fn commit_files(&mut self, message: &str, files: &[(&str, &str)]) -> Oid {
        for (path, content) in files {
            self.write_file(path, content);
            self.stage(path);
        }

        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let sig = self.signature();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit");
        self.commits += 1;
        oid
    }

    /// Create a branch pointing to the given OID.
    pub fn branch(&self, name: &str, oid: Oid) {
        let commit = self.repo.find_commit(oid).expect("Failed to find commit");
        self.repo.branch(name, &commit, false).expect("Failed to create branch");
    }
}

/// Build a commit record the way the git source would.
pub fn record(index: usize, message: &str) -> CommitRecord {
    let (subject, body) = message.split_once("\n\n").unwrap_or((message, ""));
    let parts = parse_commit_message(subject, body);
    let full = format!("{:040x}", index + 1);
    let ts = Utc.timestamp_opt(BASE_TIME + 60 * index as i64, 0).unwrap();
    CommitRecord {
        id: CommitId::new(full.clone(), full[..7].to_string()),
        author: Author {
            name: "Test User".into(),
            email: "test@example.com".into(),
        },
        author_timestamp: ts,
        commit_timestamp: ts,
        subject: subject.to_string(),
        body: body.to_string(),
        conventional_type: parts.commit_type,
        scope: parts.scope,
        breaking: parts.breaking,
    }
}

/// One commit served by [`FakeSource`].
pub struct FakeCommit {
    pub record: CommitRecord,
    pub files: Vec<(FileEntry, Option<String>)>,
}

/// In-memory [`CommitSource`] with switchable failures.
#[derive(Default)]
pub struct FakeSource {
    pub commits: Vec<FakeCommit>,
    pub working_tree: WorkingTreeStatus,
    pub current_branch: Option<String>,
    pub fail_list: bool,
    pub fail_branches: bool,
    pub fail_diffs: bool,
    /// File contents keyed by path and side, shared by every commit.
    pub snapshots: HashMap<(String, SnapshotSide), String>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit(mut self, record: CommitRecord, files: Vec<(FileEntry, Option<String>)>) -> Self {
        self.commits.push(FakeCommit { record, files });
        self
    }

    pub fn with_snapshot(mut self, path: &str, side: SnapshotSide, content: &str) -> Self {
        self.snapshots.insert((path.to_string(), side), content.to_string());
        self
    }
}

fn failure(operation: &str) -> GitError {
    GitError::CommandFailed {
        operation: operation.to_string(),
        stderr: "simulated failure".to_string(),
    }
}

impl CommitSource for FakeSource {
    fn list_commits(&self, filter: &CommitFilter) -> Result<Vec<CommitRecord>, GitError> {
        if self.fail_list {
            return Err(failure("log"));
        }
        let mut records: Vec<CommitRecord> = self.commits.iter().map(|c| c.record.clone()).collect();
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn file_changes_for(&self, id: &CommitId) -> Result<Vec<FileEntry>, GitError> {
        Ok(self
            .commits
            .iter()
            .find(|c| &c.record.id == id)
            .map(|c| c.files.iter().map(|(entry, _)| entry.clone()).collect())
            .unwrap_or_default())
    }

    fn diff_for(&self, id: &CommitId, path: &str, _context_lines: u32) -> Result<Option<String>, GitError> {
        if self.fail_diffs {
            return Err(failure("show"));
        }
        Ok(self
            .commits
            .iter()
            .find(|c| &c.record.id == id)
            .and_then(|c| c.files.iter().find(|(entry, _)| entry.path == path))
            .and_then(|(_, diff)| diff.clone()))
    }

    fn content_at(&self, _id: &CommitId, path: &str, side: SnapshotSide) -> Result<Option<String>, GitError> {
        Ok(self.snapshots.get(&(path.to_string(), side)).cloned())
    }

    fn working_tree_status(&self) -> Result<WorkingTreeStatus, GitError> {
        Ok(self.working_tree.clone())
    }

    fn branches(&self) -> Result<BranchSet, GitError> {
        if self.fail_branches {
            return Err(failure("branch"));
        }
        Ok(BranchSet {
            local: self.current_branch.iter().cloned().collect(),
            remote: Vec::new(),
            current: self.current_branch.clone(),
        })
    }
}

/// A scripted reply: a completion body or an error factory.
pub enum Reply {
    Content(String),
    Error(fn() -> LlmError),
}

/// [`CompletionClient`] replaying canned replies.
///
/// Replies are matched first by a substring of the user prompt, then taken
/// from the shared queue, then `default_reply` is used.
pub struct ScriptedClient {
    by_prompt: Vec<(String, fn() -> Result<String, LlmError>)>,
    queue: Mutex<VecDeque<Reply>>,
    default_reply: String,
    unavailable: Vec<String>,
    delay: Duration,
    delays_by_prompt: Vec<(String, Duration)>,
    probe_failures: Mutex<VecDeque<fn() -> LlmError>>,
    stalled_probes: bool,
    finished: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    pub probes: AtomicUsize,
    pub models_used: Mutex<HashMap<String, usize>>,
}

impl ScriptedClient {
    pub fn answering(default_reply: impl Into<String>) -> Self {
        Self {
            by_prompt: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            default_reply: default_reply.into(),
            unavailable: Vec::new(),
            delay: Duration::ZERO,
            delays_by_prompt: Vec::new(),
            probe_failures: Mutex::new(VecDeque::new()),
            stalled_probes: false,
            finished: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            models_used: Mutex::new(HashMap::new()),
        }
    }

    /// Reply to prompts containing `needle` with `reply`.
    pub fn on_prompt(mut self, needle: &str, reply: fn() -> Result<String, LlmError>) -> Self {
        self.by_prompt.push((needle.to_string(), reply));
        self
    }

    pub fn then(self, reply: Reply) -> Self {
        self.queue.lock().unwrap().push_back(reply);
        self
    }

    /// Models that fail probes and completions with `ModelUnavailable`.
    pub fn without_model(mut self, model: &str) -> Self {
        self.unavailable.push(model.to_string());
        self
    }

    /// Sleep before answering each completion.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep for `delay` before answering prompts containing `needle`.
    pub fn delay_on(mut self, needle: &str, delay: Duration) -> Self {
        self.delays_by_prompt.push((needle.to_string(), delay));
        self
    }

    /// Fail the next probe with `error`; later probes fall through.
    pub fn then_probe(self, error: fn() -> LlmError) -> Self {
        self.probe_failures.lock().unwrap().push_back(error);
        self
    }

    /// Probes never answer.
    pub fn with_stalled_probes(mut self) -> Self {
        self.stalled_probes = true;
        self
    }

    /// `delay_on` needles in the order their completions returned.
    pub fn completion_order(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .models_used
            .lock()
            .unwrap()
            .entry(options.model.clone())
            .or_default() += 1;

        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        let delayed = self
            .delays_by_prompt
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()));

        if let Some((needle, delay)) = delayed {
            tokio::time::sleep(*delay).await;
            self.finished.lock().unwrap().push(needle.clone());
        } else if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.unavailable.contains(&options.model) {
            return Err(LlmError::ModelUnavailable(options.model.clone()));
        }

        let content = if let Some((_, reply)) = self.by_prompt.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            reply()?
        } else {
            let queued = self.queue.lock().unwrap().pop_front();
            match queued {
                Some(Reply::Content(text)) => text,
                Some(Reply::Error(make)) => return Err(make()),
                None => self.default_reply.clone(),
            }
        };

        Ok(Completion {
            content,
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
            }),
            model: options.model.clone(),
        })
    }

    async fn probe(&self, model: &str) -> Result<(), LlmError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.stalled_probes {
            std::future::pending::<()>().await;
        }
        let failure = self.probe_failures.lock().unwrap().pop_front();
        if let Some(make) = failure {
            return Err(make());
        }
        if self.unavailable.iter().any(|m| m == model) {
            Err(LlmError::ModelUnavailable(model.to_string()))
        } else {
            Ok(())
        }
    }
}

/// A well-formed service reply for `summary`.
pub fn service_reply(summary: &str) -> String {
    format!(
        r#"{{"summary": "{}", "technicalSummary": "Reworked internals", "category": "feature", "impact": "medium", "scope": "minor", "userFacing": true, "breaking": false, "businessImpact": "Users see it", "technicalImpact": "Touches core", "highlights": ["{}"], "tags": ["svc"], "relatedAreas": ["core"], "riskLevel": "medium", "confidence": 0.9}}"#,
        summary, summary
    )
}
