//! File-level diff classification.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::git::ChangeStatus;

use super::patterns::{BreakingIndicators, PatternTable, SemanticPattern, tags};

/// Content snapshots are cut to this many characters.
pub const SNAPSHOT_PREFIX_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Source,
    Style,
    Config,
    Docs,
    Test,
    Database,
    Asset,
    Script,
    Other,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Style => "style",
            Self::Config => "config",
            Self::Docs => "docs",
            Self::Test => "test",
            Self::Database => "database",
            Self::Asset => "asset",
            Self::Script => "script",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five-step complexity scale shared by files and commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Minimal,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityLevel {
    pub(crate) const ALL: [ComplexityLevel; 5] = [
        Self::Minimal,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::VeryHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very high",
        }
    }

    /// Level for a file complexity score (1..=5). Zero maps to minimal.
    pub fn from_file_score(score: u8) -> Self {
        Self::ALL[usize::from(score.clamp(1, 5)) - 1]
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentImpact {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionalImpact {
    pub breaking: bool,
    pub user_facing: bool,
    pub api_changes: bool,
    pub data_changes: bool,
    pub security_related: bool,
    pub performance_impact: bool,
    pub migration_required: bool,
    pub deployment_impact: DeploymentImpact,
}

/// One classified file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub status: ChangeStatus,
    pub category: FileCategory,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_text: Option<String>,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// 0 when the diff is unavailable, otherwise 1 (minimal) to 5 (very high).
    pub complexity_score: u8,
    pub semantic_tags: BTreeSet<String>,
    pub functional_impact: FunctionalImpact,
}

impl FileChange {
    pub fn lines_changed(&self) -> usize {
        self.lines_added + self.lines_removed
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.semantic_tags.contains(tag)
    }
}

/// Everything the classifier needs about one file.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    pub status: ChangeStatus,
    pub path: &'a str,
    pub old_path: Option<&'a str>,
    pub diff: Option<&'a str>,
    pub before: Option<&'a str>,
    pub after: Option<&'a str>,
}

impl<'a> ClassifyInput<'a> {
    pub fn new(status: ChangeStatus, path: &'a str, diff: Option<&'a str>) -> Self {
        Self {
            status,
            path,
            old_path: None,
            diff,
            before: None,
            after: None,
        }
    }
}

/// Changed-line thresholds between the five file complexity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexityThresholds([u32; 4]);

impl ComplexityThresholds {
    pub fn new(bounds: [u32; 4]) -> Result<Self, PolicyError> {
        ensure_ascending("file complexity", &bounds)?;
        Ok(Self(bounds))
    }

    /// Score in 1..=5 for a changed-line count.
    pub fn score(&self, changed_lines: usize) -> u8 {
        let changed = u32::try_from(changed_lines).unwrap_or(u32::MAX);
        1 + self.0.iter().filter(|bound| changed >= **bound).count() as u8
    }
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self([10, 50, 100, 200])
    }
}

pub(crate) fn ensure_ascending(name: &'static str, values: &[u32]) -> Result<(), PolicyError> {
    if values.windows(2).all(|w| w[0] < w[1]) {
        Ok(())
    } else {
        Err(PolicyError::NotAscending {
            name,
            values: values.to_vec(),
        })
    }
}

/// Deterministic file classifier.
#[derive(Debug, Clone, Default)]
pub struct DiffClassifier {
    patterns: PatternTable,
    breaking: BreakingIndicators,
    thresholds: ComplexityThresholds,
}

impl DiffClassifier {
    pub fn new(
        patterns: PatternTable,
        breaking: BreakingIndicators,
        thresholds: ComplexityThresholds,
    ) -> Self {
        Self {
            patterns,
            breaking,
            thresholds,
        }
    }

    /// Default tables plus additional patterns.
    pub fn with_patterns(extra: impl IntoIterator<Item = SemanticPattern>) -> Self {
        let mut classifier = Self::default();
        for pattern in extra {
            classifier.patterns.push(pattern);
        }
        classifier
    }

    pub fn classify(&self, input: &ClassifyInput<'_>) -> FileChange {
        let category = categorize(input.path);
        let language = detect_language(input.path).to_string();
        let diff = input.diff.filter(|d| !d.trim().is_empty() && !is_binary_diff(d));

        let Some(diff) = diff else {
            return FileChange {
                path: input.path.to_string(),
                old_path: input.old_path.map(str::to_string),
                status: input.status,
                category,
                language,
                diff_text: input.diff.map(str::to_string),
                lines_added: 0,
                lines_removed: 0,
                complexity_score: 0,
                semantic_tags: BTreeSet::new(),
                functional_impact: functional_impact(category, &BTreeSet::new(), false, input.path),
            };
        };

        let (lines_added, lines_removed) = count_changed_lines(diff);
        let semantic_tags = self.detect_tags(input, diff);
        let breaking = self.breaking.matches(diff);

        FileChange {
            path: input.path.to_string(),
            old_path: input.old_path.map(str::to_string),
            status: input.status,
            category,
            language,
            diff_text: Some(diff.to_string()),
            lines_added,
            lines_removed,
            complexity_score: self.thresholds.score(lines_added + lines_removed),
            functional_impact: functional_impact(category, &semantic_tags, breaking, input.path),
            semantic_tags,
        }
    }

    fn detect_tags(&self, input: &ClassifyInput<'_>, diff: &str) -> BTreeSet<String> {
        // Rooted so `/api/`-style indicators also match top-level folders.
        let lowercase_path = format!("/{}", input.path.trim_start_matches('/').to_lowercase());
        let before = input.before.map(snapshot_prefix).unwrap_or_default();
        let after = input.after.map(snapshot_prefix).unwrap_or_default();

        self.patterns
            .iter()
            .filter(|p| {
                p.matches_path(&lowercase_path)
                    || p.matches_content(diff)
                    || (!before.is_empty() && p.matches_content(before))
                    || (!after.is_empty() && p.matches_content(after))
            })
            .map(|p| p.name.clone())
            .collect()
    }
}

fn functional_impact(
    category: FileCategory,
    tags: &BTreeSet<String>,
    breaking: bool,
    path: &str,
) -> FunctionalImpact {
    let has = |tag: &str| tags.contains(tag);
    let docs = category == FileCategory::Docs;

    let data_changes = category == FileCategory::Database
        || (!docs && (has(tags::DATABASE_SCHEMA) || has(tags::DATABASE_QUERY)));
    let api_changes = has(tags::API_ENDPOINT);
    let security_related = has(tags::SECURITY_POLICY);
    let config_change = category == FileCategory::Config || has(tags::CONFIGURATION);
    let migration_required = !docs && (has(tags::DATABASE_SCHEMA) || in_migration_dir(path));
    let user_facing = matches!(category, FileCategory::Style | FileCategory::Asset)
        || has(tags::UI_COMPONENT)
        || has("react_component")
        || has("vue_component")
        || has(tags::REACT_HOOKS);

    let deployment_impact = if breaking || data_changes {
        DeploymentImpact::High
    } else if api_changes || security_related || config_change {
        DeploymentImpact::Medium
    } else {
        DeploymentImpact::Low
    };

    FunctionalImpact {
        breaking,
        user_facing,
        api_changes,
        data_changes,
        security_related,
        performance_impact: has(tags::PERFORMANCE),
        migration_required,
        deployment_impact,
    }
}

fn in_migration_dir(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower
        .rsplit_once('/')
        .is_some_and(|(dirs, _)| dirs.split('/').any(|d| d == "migrations" || d == "migration"))
}

/// First [`SNAPSHOT_PREFIX_CHARS`] characters of a content snapshot.
pub fn snapshot_prefix(content: &str) -> &str {
    match content.char_indices().nth(SNAPSHOT_PREFIX_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Whether git reported the diff as binary.
pub fn is_binary_diff(diff: &str) -> bool {
    diff.lines().any(|line| {
        (line.starts_with("Binary files ") && line.ends_with(" differ"))
            || line.starts_with("GIT binary patch")
    })
}

/// Count added and removed lines, ignoring `+++`/`---` file headers.
pub fn count_changed_lines(diff: &str) -> (usize, usize) {
    diff.lines().fold((0, 0), |(added, removed), line| {
        if line.starts_with("+++") || line.starts_with("---") {
            (added, removed)
        } else if line.starts_with('+') {
            (added + 1, removed)
        } else if line.starts_with('-') {
            (added, removed + 1)
        } else {
            (added, removed)
        }
    })
}

const TEST_SEGMENTS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "e2e"];
const TEST_NAME_MARKERS: &[&str] = &["_test.", ".test.", ".spec.", "_spec."];
const DATABASE_SEGMENTS: &[&str] = &["migrations", "migration", "db", "database", "schema", "schemas"];
const DATABASE_SUFFIXES: &[&str] = &[".sql", ".prisma", ".ddl"];
const DOCS_SEGMENTS: &[&str] = &["docs", "doc", "documentation"];
const DOCS_SUFFIXES: &[&str] = &[".md", ".mdx", ".rst", ".adoc", ".txt"];
const STYLE_SUFFIXES: &[&str] = &[".css", ".scss", ".sass", ".less", ".styl", ".pcss"];
const ASSET_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".woff", ".woff2", ".ttf", ".otf",
    ".mp4", ".mp3", ".wav", ".pdf",
];
const SCRIPT_SEGMENTS: &[&str] = &["scripts", "bin"];
const SCRIPT_SUFFIXES: &[&str] = &[".sh", ".bash", ".zsh", ".fish", ".ps1", ".bat", ".cmd"];
const CONFIG_NAMES: &[&str] = &[
    "dockerfile",
    "makefile",
    ".gitignore",
    ".dockerignore",
    ".editorconfig",
    ".npmrc",
    ".nvmrc",
];
const CONFIG_SUFFIXES: &[&str] = &[
    ".json", ".yaml", ".yml", ".toml", ".ini", ".cfg", ".conf", ".env", ".properties", ".xml",
    ".lock",
];
const SOURCE_SUFFIXES: &[&str] = &[
    ".rs", ".js", ".jsx", ".mjs", ".cjs", ".ts", ".tsx", ".py", ".go", ".java", ".kt", ".kts",
    ".rb", ".php", ".c", ".h", ".cc", ".cpp", ".hpp", ".cs", ".swift", ".scala", ".ex", ".exs",
    ".vue", ".svelte", ".html", ".dart", ".lua",
];

/// Category lookup. Checks run in order; the first hit wins.
pub fn categorize(path: &str) -> FileCategory {
    let lower = path.to_lowercase();
    let segments: Vec<&str> = lower.split('/').collect();
    let (dirs, name) = segments.split_at(segments.len().saturating_sub(1));
    let name = name.first().copied().unwrap_or("");
    let in_dir = |table: &[&str]| dirs.iter().any(|d| table.contains(d));
    let has_suffix = |table: &[&str]| table.iter().any(|s| name.ends_with(s));

    if in_dir(TEST_SEGMENTS)
        || TEST_NAME_MARKERS.iter().any(|m| name.contains(m))
        || (name.starts_with("test_") && name.ends_with(".py"))
    {
        FileCategory::Test
    } else if has_suffix(DATABASE_SUFFIXES) || in_dir(DATABASE_SEGMENTS) {
        FileCategory::Database
    } else if has_suffix(DOCS_SUFFIXES) || in_dir(DOCS_SEGMENTS) || name == "license" {
        FileCategory::Docs
    } else if has_suffix(STYLE_SUFFIXES) {
        FileCategory::Style
    } else if has_suffix(ASSET_SUFFIXES) {
        FileCategory::Asset
    } else if has_suffix(SCRIPT_SUFFIXES) || in_dir(SCRIPT_SEGMENTS) {
        FileCategory::Script
    } else if CONFIG_NAMES.contains(&name) || has_suffix(CONFIG_SUFFIXES) || name.starts_with(".env")
    {
        FileCategory::Config
    } else if has_suffix(SOURCE_SUFFIXES) {
        FileCategory::Source
    } else {
        FileCategory::Other
    }
}

const LANGUAGES: &[(&str, &str)] = &[
    (".rs", "rust"),
    (".tsx", "typescript"),
    (".ts", "typescript"),
    (".jsx", "javascript"),
    (".mjs", "javascript"),
    (".cjs", "javascript"),
    (".js", "javascript"),
    (".py", "python"),
    (".go", "go"),
    (".java", "java"),
    (".kts", "kotlin"),
    (".kt", "kotlin"),
    (".rb", "ruby"),
    (".php", "php"),
    (".cpp", "cpp"),
    (".cc", "cpp"),
    (".hpp", "cpp"),
    (".c", "c"),
    (".h", "c"),
    (".cs", "csharp"),
    (".swift", "swift"),
    (".scala", "scala"),
    (".exs", "elixir"),
    (".ex", "elixir"),
    (".vue", "vue"),
    (".svelte", "svelte"),
    (".dart", "dart"),
    (".lua", "lua"),
    (".sql", "sql"),
    (".prisma", "prisma"),
    (".sh", "shell"),
    (".bash", "shell"),
    (".zsh", "shell"),
    (".ps1", "powershell"),
    (".html", "html"),
    (".scss", "scss"),
    (".css", "css"),
    (".md", "markdown"),
    (".mdx", "markdown"),
    (".json", "json"),
    (".yaml", "yaml"),
    (".yml", "yaml"),
    (".toml", "toml"),
    (".xml", "xml"),
];

/// Language lookup by suffix; `dockerfile`/`makefile` by name.
pub fn detect_language(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or("");
    match name {
        "dockerfile" => return "dockerfile",
        "makefile" => return "makefile",
        _ => {}
    }
    LANGUAGES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, lang)| *lang)
        .unwrap_or("unknown")
}
