//! Commit record parsing and conventional commit classification.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator between records in `git log` output (ASCII RS).
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Separator between fields within a record (ASCII US).
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// `--format` string matching [`parse_log`].
///
/// Fields: full hash, short hash, author name, author email, author time,
/// commit time, subject, body. The body is last so embedded newlines survive.
pub const LOG_FORMAT: &str = "%x1e%H%x1f%h%x1f%an%x1f%ae%x1f%at%x1f%ct%x1f%s%x1f%b";

const FIELD_COUNT: usize = 8;

/// Conventional commit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Perf,
    Test,
    Chore,
    Ci,
    Build,
    Security,
    Config,
    Other,
}

impl CommitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Docs => "docs",
            Self::Style => "style",
            Self::Refactor => "refactor",
            Self::Perf => "perf",
            Self::Test => "test",
            Self::Chore => "chore",
            Self::Ci => "ci",
            Self::Build => "build",
            Self::Security => "security",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommitType {
    type Err = String;

    /// Accepts canonical names and the common aliases seen in the wild.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feat" | "feature" | "features" => Ok(Self::Feat),
            "fix" | "bugfix" | "hotfix" | "bug" => Ok(Self::Fix),
            "docs" | "doc" | "documentation" => Ok(Self::Docs),
            "style" | "format" => Ok(Self::Style),
            "refactor" | "refactoring" => Ok(Self::Refactor),
            "perf" | "performance" => Ok(Self::Perf),
            "test" | "tests" | "testing" => Ok(Self::Test),
            "chore" => Ok(Self::Chore),
            "ci" => Ok(Self::Ci),
            "build" | "deps" => Ok(Self::Build),
            "security" | "sec" => Ok(Self::Security),
            "config" | "cfg" | "conf" => Ok(Self::Config),
            _ => Err(format!("Unknown commit type: {}", s)),
        }
    }
}

lazy_static! {
    static ref CONVENTIONAL_PATTERN: Regex =
        Regex::new(r"^(\w+)(?:\(([^)]+)\))?(!)?\s*:\s*").unwrap();

    static ref BREAKING_TOKEN: Regex = Regex::new(r"(?i)BREAKING[ -]CHANGE").unwrap();

    /// Ordered inference table for subjects without a recognised prefix.
    ///
    /// The first matching row wins, so more specific intents come first
    /// ("add tests" is a test commit, not a feature).
    static ref INFERENCE_TABLE: Vec<(Regex, CommitType)> = [
        (r"(?i)\b(security|vulnerab\w*|cve-\d+|xss|csrf|injection|exploit\w*)\b", CommitType::Security),
        (r"(?i)\b(fix\w*|bug\w*|resolv\w*|patch\w*|hotfix\w*|repair\w*|correct\w*)\b", CommitType::Fix),
        (r"(?i)\b(docs?|readme|documentation|changelog|comments?)\b", CommitType::Docs),
        (r"(?i)\b(tests?|testing|specs?|coverage)\b", CommitType::Test),
        (r"(?i)\b(perf|performance|optimi[sz]\w*|speed\s+up|faster)\b", CommitType::Perf),
        (r"(?i)\b(refactor\w*|restructur\w*|clean\s*up|cleanup|simplif\w*|extract\w*|renam\w*)\b", CommitType::Refactor),
        (r"(?i)\b(format\w*|lint\w*|whitespace|prettier|rustfmt)\b", CommitType::Style),
        (r"(?i)\b(ci|pipelines?|workflows?|github\s+actions)\b", CommitType::Ci),
        (r"(?i)\b(build|deps|dependenc\w*|bump\w*|dockerfile|makefile)\b", CommitType::Build),
        (r"(?i)\b(config\w*|settings?|env)\b", CommitType::Config),
        (r"(?i)\b(add\w*|new|implement\w*|introduc\w*|support\w*|create\w*|enable\w*)\b", CommitType::Feat),
        (r"(?i)\b(chore|update\w*|upgrade\w*|release|merge|remove\w*|delete\w*)\b", CommitType::Chore),
    ]
    .into_iter()
    .map(|(pattern, ty)| (Regex::new(pattern).unwrap(), ty))
    .collect();
}

/// Full and abbreviated forms of a commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId {
    pub full: String,
    pub short: String,
}

impl CommitId {
    pub fn new(full: impl Into<String>, short: impl Into<String>) -> Self {
        Self {
            full: full.into(),
            short: short.into(),
        }
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// One parsed commit. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: CommitId,
    pub author: Author,
    pub author_timestamp: DateTime<Utc>,
    pub commit_timestamp: DateTime<Utc>,
    pub subject: String,
    pub body: String,
    pub conventional_type: CommitType,
    pub scope: Option<String>,
    pub breaking: bool,
}

/// Result of classifying a commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalParts {
    pub commit_type: CommitType,
    pub scope: Option<String>,
    pub breaking: bool,
    /// Whether the type came from an explicit `type:` prefix.
    pub explicit: bool,
}

/// Parse a commit subject and body into conventional commit parts.
pub fn parse_commit_message(subject: &str, body: &str) -> ConventionalParts {
    let subject = subject.trim();
    let breaking_token = BREAKING_TOKEN.is_match(subject) || BREAKING_TOKEN.is_match(body);
    let breaking = subject.contains("!:") || breaking_token;

    if let Some(caps) = CONVENTIONAL_PATTERN.captures(subject) {
        let type_str = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if let Ok(commit_type) = type_str.parse::<CommitType>() {
            let scope = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());
            return ConventionalParts {
                commit_type,
                scope,
                breaking: breaking || caps.get(3).is_some(),
                explicit: true,
            };
        }
    }

    ConventionalParts {
        commit_type: infer_commit_type(subject),
        scope: None,
        breaking,
        explicit: false,
    }
}

/// Infer a commit type from free-form subject text using the inference table.
pub fn infer_commit_type(subject: &str) -> CommitType {
    INFERENCE_TABLE
        .iter()
        .find(|(pattern, _)| pattern.is_match(subject))
        .map(|(_, ty)| *ty)
        .unwrap_or(CommitType::Other)
}

/// Parse raw `git log --format=LOG_FORMAT` output into commit records.
///
/// Records keep the order they appear in. Malformed records are logged and
/// skipped; they never abort the parse.
pub fn parse_log(raw: &str) -> Vec<CommitRecord> {
    raw.split(RECORD_SEPARATOR)
        .filter(|chunk| !chunk.trim().is_empty())
        .filter_map(|chunk| match parse_record(chunk) {
            Ok(record) => Some(record),
            Err(reason) => {
                let preview: String = chunk.trim().chars().take(60).collect();
                warn!("Skipping malformed commit record ({}): {:?}", reason, preview);
                None
            }
        })
        .collect()
}

fn parse_record(chunk: &str) -> Result<CommitRecord, String> {
    // Leading newline comes from the previous record's trailing `%n`.
    let chunk = chunk.trim_start_matches(['\n', '\r']);
    let fields: Vec<&str> = chunk.splitn(FIELD_COUNT, FIELD_SEPARATOR).collect();
    if fields.len() < FIELD_COUNT {
        return Err(format!(
            "expected {} fields, found {}",
            FIELD_COUNT,
            fields.len()
        ));
    }

    let full = fields[0].trim();
    if full.is_empty() || !full.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid commit hash '{}'", full));
    }
    let short = match fields[1].trim() {
        "" => full.chars().take(7).collect(),
        s => s.to_string(),
    };

    let author_timestamp = parse_timestamp(fields[4])?;
    let commit_timestamp = parse_timestamp(fields[5])?;
    let subject = fields[6].trim().to_string();
    let body = fields[7].trim_end().to_string();

    let parts = parse_commit_message(&subject, &body);

    Ok(CommitRecord {
        id: CommitId::new(full, short),
        author: Author {
            name: fields[2].trim().to_string(),
            email: fields[3].trim().to_string(),
        },
        author_timestamp,
        commit_timestamp,
        subject,
        body,
        conventional_type: parts.commit_type,
        scope: parts.scope,
        breaking: parts.breaking,
    })
}

fn parse_timestamp(field: &str) -> Result<DateTime<Utc>, String> {
    let seconds: i64 = field
        .trim()
        .parse()
        .map_err(|_| format!("invalid timestamp '{}'", field.trim()))?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| format!("timestamp out of range: {}", seconds))
}
