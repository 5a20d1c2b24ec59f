//! The version-control collaborator the engine reads from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GitError;

use super::commits::{CommitId, CommitRecord};
use super::diff::{ChangeStatus, FileEntry};

/// Order in which commits are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Filter for listing commits.
#[derive(Debug, Clone, Default)]
pub struct CommitFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub grep: Option<String>,
    pub exclude_merges: bool,
    pub limit: Option<usize>,
    pub order: LogOrder,
    /// Revision range such as `v1.2.0..HEAD`. Defaults to `HEAD`.
    pub range: Option<String>,
}

/// An uncommitted file change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub status: ChangeStatus,
    pub path: String,
    pub old_path: Option<String>,
    pub diff: Option<String>,
}

/// Staged and unstaged changes in the working tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    pub staged: Vec<PendingChange>,
    pub unstaged: Vec<PendingChange>,
}

impl WorkingTreeStatus {
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }
}

/// Which side of a commit a file snapshot is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSide {
    /// The first parent.
    Before,
    After,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSet {
    pub local: Vec<String>,
    pub remote: Vec<String>,
    pub current: Option<String>,
}

/// Read access to a repository's history and working tree.
///
/// All methods are synchronous; the engine calls them before any
/// summarization work starts.
pub trait CommitSource {
    fn list_commits(&self, filter: &CommitFilter) -> Result<Vec<CommitRecord>, GitError>;

    fn file_changes_for(&self, id: &CommitId) -> Result<Vec<FileEntry>, GitError>;

    /// Unified diff for one path in one commit. `None` when unavailable.
    fn diff_for(
        &self,
        id: &CommitId,
        path: &str,
        context_lines: u32,
    ) -> Result<Option<String>, GitError>;

    /// Text content of `path` on one side of a commit. `None` when the
    /// file is absent there or binary.
    fn content_at(
        &self,
        _id: &CommitId,
        _path: &str,
        _side: SnapshotSide,
    ) -> Result<Option<String>, GitError> {
        Ok(None)
    }

    fn working_tree_status(&self) -> Result<WorkingTreeStatus, GitError>;

    fn branches(&self) -> Result<BranchSet, GitError>;
}
