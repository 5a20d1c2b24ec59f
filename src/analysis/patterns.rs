//! Indicator tables for semantic pattern and breaking-change detection.
//!
//! Everything here is data: adding a pattern means adding a row, not
//! touching the classifier.

use regex_lite::Regex;

use crate::error::PolicyError;

/// Well-known tag names the aggregator and summarizer key off.
pub mod tags {
    pub const API_ENDPOINT: &str = "api_endpoint";
    pub const DATABASE_SCHEMA: &str = "database_schema";
    pub const DATABASE_QUERY: &str = "database_query";
    pub const SECURITY_POLICY: &str = "security_policy";
    pub const PERFORMANCE: &str = "performance";
    pub const CONFIGURATION: &str = "configuration";
    pub const UI_COMPONENT: &str = "ui_component";
    pub const REACT_HOOKS: &str = "react_hooks";
    pub const DEPENDENCY_UPDATE: &str = "dependency_update";
}

/// Declarative description of one semantic pattern.
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub name: &'static str,
    /// Lowercase substrings matched against the file path.
    pub path_indicators: &'static [&'static str],
    /// Regexes matched against diff text and content snapshots.
    pub content_indicators: &'static [&'static str],
}

/// Built-in pattern rows.
pub const DEFAULT_PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        name: tags::REACT_HOOKS,
        path_indicators: &["/hooks/"],
        content_indicators: &[
            r"\buse(State|Effect|Memo|Callback|Reducer|Context|Ref|LayoutEffect)\s*\(",
        ],
    },
    PatternSpec {
        name: "react_component",
        path_indicators: &[".jsx", ".tsx"],
        content_indicators: &[r"\bReact\.(Component|FC)\b", r"from\s+['\x22]react['\x22]"],
    },
    PatternSpec {
        name: "vue_component",
        path_indicators: &[".vue"],
        content_indicators: &[r"<template>", r"\bdefineComponent\s*\("],
    },
    PatternSpec {
        name: "angular",
        path_indicators: &[".component.ts", ".module.ts", ".service.ts"],
        content_indicators: &[r"@(Component|NgModule|Injectable)\s*\("],
    },
    PatternSpec {
        name: tags::UI_COMPONENT,
        path_indicators: &["/components/", "/pages/", "/views/", "/ui/", "/templates/"],
        content_indicators: &[r"className=", r"<(button|form|input|div)\b"],
    },
    PatternSpec {
        name: tags::API_ENDPOINT,
        path_indicators: &["/api/", "/routes/", "/controllers/", "/handlers/", "openapi", "swagger"],
        content_indicators: &[
            r"\b(app|router)\.(get|post|put|patch|delete)\s*\(",
            r"@(Get|Post|Put|Patch|Delete|Request)Mapping\b",
            r"#\[(get|post|put|patch|delete)\(",
            r"@(app|router)\.(get|post|put|patch|delete)\(",
            r"\bRouter::new\(\)",
            r"\bHandleFunc\(",
        ],
    },
    PatternSpec {
        name: tags::DATABASE_SCHEMA,
        path_indicators: &["/migrations/", "/migration/", "/schema", ".sql", "schema.prisma"],
        content_indicators: &[
            r"(?i)\b(CREATE|ALTER|DROP)\s+(TABLE|INDEX|VIEW|COLUMN)\b",
            r"(?i)\bADD\s+COLUMN\b",
            r"\b(createTable|dropTable|addColumn|removeColumn)\b",
        ],
    },
    PatternSpec {
        name: tags::DATABASE_QUERY,
        path_indicators: &["/repositories/", "/models/", "/dao/"],
        content_indicators: &[
            r"(?i)\bSELECT\s+.+\s+FROM\b",
            r"(?i)\bINSERT\s+INTO\b",
            r"(?i)\bUPDATE\s+\w+\s+SET\b",
            r"\.(findOne|findMany|findAll|query|execute)\s*\(",
            r"\bsqlx::query",
        ],
    },
    PatternSpec {
        name: tags::SECURITY_POLICY,
        path_indicators: &["/security/", "/crypto/", "permissions", "policy", ".pem", "secrets"],
        content_indicators: &[
            r"(?i)\b(password|passwd|secret|api[_-]?key|private[_-]?key|credential)s?\b",
            r"(?i)\b(jwt|oauth2?|csrf|xss|cors|bcrypt|argon2|hmac)\b",
            r"(?i)\b(encrypt|decrypt|sanitize|escape)\w*\(",
            r"(?i)\b(authorize|authenticate|permission|role)s?\b",
        ],
    },
    PatternSpec {
        name: tags::PERFORMANCE,
        path_indicators: &["/cache/", "bench"],
        content_indicators: &[
            r"\b(useMemo|memoize|lru|LruCache)\b",
            r"(?i)\bcache[ds]?\b",
            r"(?i)\b(debounce|throttle|lazy_static|once_cell)\b",
            r"(?i)\bCREATE\s+INDEX\b",
        ],
    },
    PatternSpec {
        name: tags::CONFIGURATION,
        path_indicators: &[".env", "config", "settings", ".yml", ".yaml", ".toml", ".ini"],
        content_indicators: &[r"\bprocess\.env\.", r"\bstd::env::var\b", r"\bos\.(getenv|environ)\b"],
    },
    PatternSpec {
        name: tags::DEPENDENCY_UPDATE,
        path_indicators: &[
            "package.json",
            "package-lock.json",
            "yarn.lock",
            "pnpm-lock.yaml",
            "cargo.toml",
            "cargo.lock",
            "requirements.txt",
            "pyproject.toml",
            "go.mod",
            "go.sum",
            "gemfile",
        ],
        content_indicators: &[],
    },
    PatternSpec {
        name: "async_concurrency",
        path_indicators: &[],
        content_indicators: &[
            r"\b(tokio::spawn|Promise\.all|asyncio\.gather|go\s+func)\b",
            r"\b(Mutex|RwLock|Semaphore|AtomicU\d+)\b",
        ],
    },
    PatternSpec {
        name: "error_handling",
        path_indicators: &["error"],
        content_indicators: &[r"\b(try\s*\{|catch\s*\(|except\s+\w+|thiserror|anyhow)\b"],
    },
];

/// Indicators that mark a diff as breaking.
///
/// Removed-export rows only look at `-` lines so that renaming an export in
/// place is not mistaken for adding one.
pub const DEFAULT_BREAKING_INDICATORS: &[&str] = &[
    r"(?i)BREAKING[ -]CHANGE",
    r"(?im)^\+.*\bDROP\s+(TABLE|COLUMN)\b",
    r"(?m)^-\s*export\s+(default\s+)?(async\s+)?(function|class|const|let|interface|type|enum)\b",
    r"(?m)^-\s*module\.exports\b",
    r"(?m)^-\s*pub\s+(async\s+)?(fn|struct|enum|trait|mod|type|const)\b",
    r"(?m)^-\s*func\s+(\([^)]*\)\s*)?[A-Z]\w*\(",
    r"(?m)^-\s*def\s+[a-z]\w*\(",
];

/// A compiled semantic pattern.
#[derive(Debug, Clone)]
pub struct SemanticPattern {
    pub name: String,
    path_indicators: Vec<String>,
    content_indicators: Vec<Regex>,
}

impl SemanticPattern {
    /// Compile a pattern from owned parts.
    pub fn new(
        name: impl Into<String>,
        path_indicators: &[&str],
        content_indicators: &[&str],
    ) -> Result<Self, PolicyError> {
        let name = name.into();
        let content_indicators = content_indicators
            .iter()
            .map(|p| compile(&name, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            path_indicators: path_indicators.iter().map(|p| p.to_lowercase()).collect(),
            content_indicators,
            name,
        })
    }

    fn from_spec(spec: &PatternSpec) -> Result<Self, PolicyError> {
        Self::new(spec.name, spec.path_indicators, spec.content_indicators)
    }

    pub fn matches_path(&self, lowercase_path: &str) -> bool {
        self.path_indicators.iter().any(|i| lowercase_path.contains(i.as_str()))
    }

    pub fn matches_content(&self, text: &str) -> bool {
        self.content_indicators.iter().any(|re| re.is_match(text))
    }
}

/// Ordered collection of semantic patterns.
#[derive(Debug, Clone)]
pub struct PatternTable {
    patterns: Vec<SemanticPattern>,
}

impl PatternTable {
    pub fn from_specs(specs: &[PatternSpec]) -> Result<Self, PolicyError> {
        let patterns = specs
            .iter()
            .map(SemanticPattern::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn push(&mut self, pattern: SemanticPattern) {
        self.patterns.push(pattern);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        // Built-in rows are literals covered by tests.
        Self::from_specs(DEFAULT_PATTERNS).expect("built-in pattern table must compile")
    }
}

/// Compiled breaking-change indicators.
#[derive(Debug, Clone)]
pub struct BreakingIndicators {
    indicators: Vec<Regex>,
}

impl BreakingIndicators {
    pub fn new(patterns: &[&str]) -> Result<Self, PolicyError> {
        let indicators = patterns
            .iter()
            .map(|p| compile("breaking indicators", p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { indicators })
    }

    pub fn matches(&self, diff: &str) -> bool {
        self.indicators.iter().any(|re| re.is_match(diff))
    }
}

impl Default for BreakingIndicators {
    fn default() -> Self {
        Self::new(DEFAULT_BREAKING_INDICATORS).expect("built-in breaking indicators must compile")
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex, PolicyError> {
    Regex::new(pattern).map_err(|e| PolicyError::InvalidPattern {
        name: name.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
