//! `CommitSource` backed by a local git checkout.
//!
//! History and diff text come from the system `git` binary so that the log
//! format and pathspec behavior match what users see on the command line.
//! Repository discovery, working tree status and branches use git2.

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{BranchType, ErrorCode, Oid, Repository, Status, StatusOptions};
use tracing::{debug, warn};

use crate::error::GitError;

use super::commits::{CommitId, CommitRecord, LOG_FORMAT, parse_log};
use super::diff::{ChangeStatus, FileEntry, parse_name_status};
use super::source::{
    BranchSet, CommitFilter, CommitSource, LogOrder, PendingChange, SnapshotSide, WorkingTreeStatus,
};

/// Maximum characters of synthesized diff text for untracked files.
const MAX_UNTRACKED_DIFF_LENGTH: usize = 30_000;

/// A git repository opened for analysis.
pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepository {
    /// Open the repository containing `path`.
    ///
    /// This is the only fatal failure of an analysis run: without a
    /// repository there is nothing to analyze.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|source| GitError::NotARepository {
            path: path.to_path_buf(),
            source,
        })?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GitError::BareRepository(path.to_path_buf()))?;

        debug!("Opened repository at {}", workdir.display());
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn has_commits(&self) -> bool {
        match self.repo.head() {
            Ok(_) => true,
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                false
            }
            Err(_) => true,
        }
    }

    /// Run a git command in the working directory and return its stdout.
    fn run_git(&self, args: &[&str], operation: &str) -> Result<String, GitError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.workdir)
            .args(args)
            .output()
            .map_err(|source| GitError::SpawnFailed {
                operation: operation.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed {
                operation: operation.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn pending_diff(&self, path: &str, staged: bool, status: ChangeStatus) -> Option<String> {
        if !staged && status == ChangeStatus::Added {
            return self.untracked_diff(path);
        }

        let mut args = vec!["diff", "--no-color"];
        if staged {
            args.push("--cached");
        }
        args.extend(["--", path]);

        match self.run_git(&args, "diff") {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to diff {}: {}", path, e);
                None
            }
        }
    }

    /// Untracked files have no diff; present their content as additions.
    fn untracked_diff(&self, path: &str) -> Option<String> {
        let bytes = std::fs::read(self.workdir.join(path)).ok()?;
        let content = String::from_utf8(bytes).ok()?;

        let mut text = format!("--- /dev/null\n+++ b/{}\n", path);
        for line in content.lines() {
            if text.len() + line.len() + 2 > MAX_UNTRACKED_DIFF_LENGTH {
                break;
            }
            text.push('+');
            text.push_str(line);
            text.push('\n');
        }
        Some(text)
    }
}

impl CommitSource for GitRepository {
    fn list_commits(&self, filter: &CommitFilter) -> Result<Vec<CommitRecord>, GitError> {
        if !self.has_commits() {
            return Ok(Vec::new());
        }

        let mut args: Vec<String> = vec![
            "log".into(),
            format!("--format={}", LOG_FORMAT),
            "--no-color".into(),
        ];
        if let Some(since) = filter.since {
            args.push(format!("--since={}", since.to_rfc3339()));
        }
        if let Some(until) = filter.until {
            args.push(format!("--until={}", until.to_rfc3339()));
        }
        if let Some(author) = &filter.author {
            args.push(format!("--author={}", author));
        }
        if let Some(grep) = &filter.grep {
            args.push(format!("--grep={}", grep));
        }
        if filter.exclude_merges {
            args.push("--no-merges".into());
        }
        if let Some(limit) = filter.limit {
            args.push(format!("--max-count={}", limit));
        }
        if filter.order == LogOrder::OldestFirst {
            args.push("--reverse".into());
        }
        args.push(filter.range.clone().unwrap_or_else(|| "HEAD".into()));
        args.push("--".into());

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let raw = self.run_git(&args, "log")?;
        Ok(parse_log(&raw))
    }

    fn file_changes_for(&self, id: &CommitId) -> Result<Vec<FileEntry>, GitError> {
        let raw = self.run_git(
            &["show", "--name-status", "--format=", "--no-color", "-M", &id.full],
            "show --name-status",
        )?;
        Ok(parse_name_status(&raw))
    }

    fn diff_for(
        &self,
        id: &CommitId,
        path: &str,
        context_lines: u32,
    ) -> Result<Option<String>, GitError> {
        let context = format!("-U{}", context_lines);
        let raw = self.run_git(
            &["show", "--format=", "--no-color", "-M", &context, &id.full, "--", path],
            "show",
        )?;
        if raw.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(raw))
        }
    }

    fn content_at(
        &self,
        id: &CommitId,
        path: &str,
        side: SnapshotSide,
    ) -> Result<Option<String>, GitError> {
        let object_error = |source: git2::Error| GitError::Object {
            rev: id.short.clone(),
            path: path.to_string(),
            source,
        };

        let oid = Oid::from_str(&id.full).map_err(object_error)?;
        let commit = self.repo.find_commit(oid).map_err(object_error)?;
        let tree = match side {
            SnapshotSide::After => commit.tree(),
            SnapshotSide::Before => match commit.parent(0) {
                Ok(parent) => parent.tree(),
                Err(_) => return Ok(None),
            },
        }
        .map_err(object_error)?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(object_error(e)),
        };
        let object = entry.to_object(&self.repo).map_err(object_error)?;
        let Some(blob) = object.as_blob() else {
            return Ok(None);
        };
        if blob.is_binary() {
            return Ok(None);
        }
        Ok(std::str::from_utf8(blob.content()).ok().map(str::to_string))
    }

    fn working_tree_status(&self) -> Result<WorkingTreeStatus, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .renames_head_to_index(true);

        let statuses = self.repo.statuses(Some(&mut opts)).map_err(GitError::Status)?;
        let mut tree = WorkingTreeStatus::default();

        for entry in statuses.iter() {
            let Some(path) = entry.path().map(str::to_string) else {
                continue;
            };
            let flags = entry.status();

            if flags.contains(Status::CONFLICTED) {
                tree.unstaged.push(PendingChange {
                    status: ChangeStatus::Unmerged,
                    diff: self.pending_diff(&path, false, ChangeStatus::Unmerged),
                    path,
                    old_path: None,
                });
                continue;
            }

            if let Some(status) = staged_status(flags) {
                let old_path = entry
                    .head_to_index()
                    .and_then(|d| d.old_file().path().map(|p| p.to_string_lossy().into_owned()))
                    .filter(|old| *old != path);
                tree.staged.push(PendingChange {
                    status,
                    diff: self.pending_diff(&path, true, status),
                    path: path.clone(),
                    old_path,
                });
            }

            if let Some(status) = unstaged_status(flags) {
                tree.unstaged.push(PendingChange {
                    status,
                    diff: self.pending_diff(&path, false, status),
                    path,
                    old_path: None,
                });
            }
        }

        Ok(tree)
    }

    fn branches(&self) -> Result<BranchSet, GitError> {
        let mut set = BranchSet::default();

        for branch in self.repo.branches(None).map_err(GitError::Branches)? {
            let (branch, kind) = branch.map_err(GitError::Branches)?;
            let Some(name) = branch.name().map_err(GitError::Branches)? else {
                continue;
            };
            match kind {
                BranchType::Local => set.local.push(name.to_string()),
                BranchType::Remote => set.remote.push(name.to_string()),
            }
        }

        set.current = self
            .repo
            .head()
            .ok()
            .filter(|head| head.is_branch())
            .and_then(|head| head.shorthand().map(str::to_string));

        Ok(set)
    }
}

fn staged_status(flags: Status) -> Option<ChangeStatus> {
    if flags.contains(Status::INDEX_NEW) {
        Some(ChangeStatus::Added)
    } else if flags.contains(Status::INDEX_RENAMED) {
        Some(ChangeStatus::Renamed)
    } else if flags.contains(Status::INDEX_DELETED) {
        Some(ChangeStatus::Deleted)
    } else if flags.intersects(Status::INDEX_MODIFIED | Status::INDEX_TYPECHANGE) {
        Some(ChangeStatus::Modified)
    } else {
        None
    }
}

fn unstaged_status(flags: Status) -> Option<ChangeStatus> {
    if flags.contains(Status::WT_NEW) {
        Some(ChangeStatus::Added)
    } else if flags.contains(Status::WT_RENAMED) {
        Some(ChangeStatus::Renamed)
    } else if flags.contains(Status::WT_DELETED) {
        Some(ChangeStatus::Deleted)
    } else if flags.intersects(Status::WT_MODIFIED | Status::WT_TYPECHANGE) {
        Some(ChangeStatus::Modified)
    } else {
        None
    }
}
