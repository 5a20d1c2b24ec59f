//! Git history access and commit record parsing.

pub mod commits;
pub mod diff;
pub mod repository;
pub mod source;

pub use commits::{
    Author, CommitId, CommitRecord, CommitType, ConventionalParts, infer_commit_type, parse_commit_message,
    parse_log,
};
pub use diff::{ChangeStatus, FileEntry, parse_name_status};
pub use repository::GitRepository;
pub use source::{
    BranchSet, CommitFilter, CommitSource, LogOrder, PendingChange, SnapshotSide, WorkingTreeStatus,
};
