//! File-level change entries and `--name-status` parsing.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Status of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Unmerged,
}

impl ChangeStatus {
    /// Map a single-letter git status code (`A`, `M`, `R100`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' => Some(Self::Added),
            'M' | 'T' => Some(Self::Modified),
            'D' => Some(Self::Deleted),
            'R' => Some(Self::Renamed),
            'C' => Some(Self::Copied),
            'U' => Some(Self::Unmerged),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
            Self::Copied => "copied",
            Self::Unmerged => "unmerged",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub status: ChangeStatus,
    pub path: String,
    /// Source path for renames and copies.
    pub old_path: Option<String>,
}

/// Parse `git show --name-status --format=` output.
///
/// Lines look like `M\tsrc/lib.rs` or `R087\told.rs\tnew.rs`. Unknown codes
/// are logged and skipped.
pub fn parse_name_status(output: &str) -> Vec<FileEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let code = parts.next()?.trim();
            let Some(status) = ChangeStatus::from_code(code) else {
                warn!("Unknown file status '{}' in line {:?}", code, line);
                return None;
            };

            let first = parts.next()?.to_string();
            match (status, parts.next()) {
                (ChangeStatus::Renamed | ChangeStatus::Copied, Some(second)) => Some(FileEntry {
                    status,
                    path: second.to_string(),
                    old_path: Some(first),
                }),
                _ => Some(FileEntry {
                    status,
                    path: first,
                    old_path: None,
                }),
            }
        })
        .collect()
}
