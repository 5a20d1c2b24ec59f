//! Runtime settings read from `ANNALIST_*` environment variables.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::llm::{CompletionClient, DEFAULT_MAX_PROMPT_FILES, HttpCompletionClient, ModelCatalog, ModelTier};
use crate::summarize::{
    DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_CALL_TIMEOUT, SummarizeConfig,
};

pub const API_KEY_ENV_VAR: &str = "ANNALIST_API_KEY";
pub const API_BASE_ENV_VAR: &str = "ANNALIST_API_BASE";
pub const CALL_TIMEOUT_ENV_VAR: &str = "ANNALIST_CALL_TIMEOUT";
pub const BATCH_SIZE_ENV_VAR: &str = "ANNALIST_BATCH_SIZE";
pub const BATCH_DELAY_ENV_VAR: &str = "ANNALIST_BATCH_DELAY_MS";
pub const MAX_PROMPT_FILES_ENV_VAR: &str = "ANNALIST_MAX_PROMPT_FILES";

/// Used when a key is configured without an explicit base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variable naming the model id for `tier`.
pub fn model_env_var(tier: ModelTier) -> String {
    format!("ANNALIST_MODEL_{}", tier.as_str().to_ascii_uppercase())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub catalog: ModelCatalog,
    pub call_timeout: Duration,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_prompt_files: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            catalog: ModelCatalog::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            max_prompt_files: DEFAULT_MAX_PROMPT_FILES,
        }
    }
}

impl Settings {
    /// Read settings from the environment. Invalid values are logged and
    /// replaced by their defaults.
    pub fn from_env() -> Self {
        let mut catalog = ModelCatalog::new();
        for tier in ModelTier::ALL {
            if let Some(model) = non_empty_var(&model_env_var(tier)) {
                catalog.set(tier, model);
            }
        }

        Self {
            api_key: non_empty_var(API_KEY_ENV_VAR),
            api_base: non_empty_var(API_BASE_ENV_VAR),
            catalog,
            call_timeout: Duration::from_secs(parse_var(
                CALL_TIMEOUT_ENV_VAR,
                DEFAULT_CALL_TIMEOUT.as_secs(),
            )),
            batch_size: parse_var(BATCH_SIZE_ENV_VAR, DEFAULT_BATCH_SIZE).max(1),
            batch_delay: Duration::from_millis(parse_var(
                BATCH_DELAY_ENV_VAR,
                DEFAULT_BATCH_DELAY.as_millis() as u64,
            )),
            max_prompt_files: parse_var(MAX_PROMPT_FILES_ENV_VAR, DEFAULT_MAX_PROMPT_FILES).max(1),
        }
    }

    /// Whether a summarization service is configured at all.
    pub fn service_configured(&self) -> bool {
        self.api_key.is_some() || self.api_base.is_some()
    }

    /// Build the HTTP client, or `None` when no service is configured.
    pub fn build_client(&self) -> Result<Option<Arc<dyn CompletionClient>>, ConfigError> {
        if !self.service_configured() {
            debug!("No summarization service configured");
            return Ok(None);
        }
        let base = self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let client = HttpCompletionClient::new(base, self.api_key.clone(), self.call_timeout)?;
        Ok(Some(Arc::new(client)))
    }

    pub fn summarize_config(&self) -> SummarizeConfig {
        SummarizeConfig {
            batch_size: self.batch_size,
            batch_delay: self.batch_delay,
            call_timeout: self.call_timeout,
            max_prompt_files: self.max_prompt_files,
            ..SummarizeConfig::default()
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(v) if !v.is_empty() => match v.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid {} value '{}', using default {}", name, v, default);
                default
            }
        },
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 11] = [
        API_KEY_ENV_VAR,
        API_BASE_ENV_VAR,
        CALL_TIMEOUT_ENV_VAR,
        BATCH_SIZE_ENV_VAR,
        BATCH_DELAY_ENV_VAR,
        MAX_PROMPT_FILES_ENV_VAR,
        "ANNALIST_MODEL_REASONING",
        "ANNALIST_MODEL_COMPLEX",
        "ANNALIST_MODEL_DEFAULT",
        "ANNALIST_MODEL_SIMPLE",
        "ANNALIST_MODEL_LEGACY",
    ];

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        ALL_VARS.iter().map(|v| (*v, None)).collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        temp_env::with_vars(cleared(), || {
            let settings = Settings::from_env();
            assert_eq!(settings, Settings::default());
            assert!(!settings.service_configured());
            assert!(settings.build_client().unwrap().is_none());
        });
    }

    #[test]
    fn test_reads_values() {
        let mut vars = cleared();
        vars.extend([
            (API_KEY_ENV_VAR, Some("sk-test")),
            (CALL_TIMEOUT_ENV_VAR, Some("15")),
            (BATCH_SIZE_ENV_VAR, Some("4")),
            (BATCH_DELAY_ENV_VAR, Some("250")),
            ("ANNALIST_MODEL_SIMPLE", Some("small-model")),
        ]);
        temp_env::with_vars(vars, || {
            let settings = Settings::from_env();
            assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
            assert_eq!(settings.call_timeout, Duration::from_secs(15));
            assert_eq!(settings.batch_size, 4);
            assert_eq!(settings.batch_delay, Duration::from_millis(250));
            assert_eq!(settings.catalog.get(ModelTier::Simple), Some("small-model"));
            assert_eq!(settings.catalog.get(ModelTier::Reasoning), None);
            assert!(settings.build_client().unwrap().is_some());
        });
    }

    #[test]
    fn test_invalid_values_use_defaults() {
        let mut vars = cleared();
        vars.extend([
            (CALL_TIMEOUT_ENV_VAR, Some("soon")),
            (BATCH_SIZE_ENV_VAR, Some("-3")),
            (MAX_PROMPT_FILES_ENV_VAR, Some("many")),
        ]);
        temp_env::with_vars(vars, || {
            let settings = Settings::from_env();
            assert_eq!(settings.call_timeout, DEFAULT_CALL_TIMEOUT);
            assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
            assert_eq!(settings.max_prompt_files, DEFAULT_MAX_PROMPT_FILES);
        });
    }

    #[test]
    fn test_zero_batch_size_is_raised_to_one() {
        let mut vars = cleared();
        vars.push((BATCH_SIZE_ENV_VAR, Some("0")));
        temp_env::with_vars(vars, || {
            assert_eq!(Settings::from_env().batch_size, 1);
        });
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let settings = Settings {
            api_base: Some("ftp://example.com".into()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.build_client(),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_model_env_var_names() {
        assert_eq!(model_env_var(ModelTier::Reasoning), "ANNALIST_MODEL_REASONING");
        assert_eq!(model_env_var(ModelTier::Legacy), "ANNALIST_MODEL_LEGACY");
    }
}
