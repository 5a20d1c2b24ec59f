//! Chat-completion client for the summarization service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, LlmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl CompletionOptions {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            reasoning_effort: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<Usage>,
    /// Model that actually answered, as reported by the service.
    pub model: String,
}

/// A chat-completion backend.
///
/// This abstraction allows mocking the service in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError>;

    /// Check that `model` answers at all. Defaults to a one-token completion.
    async fn probe(&self, model: &str) -> Result<(), LlmError> {
        let options = CompletionOptions {
            max_tokens: Some(1),
            ..CompletionOptions::for_model(model)
        };
        self.complete(&[ChatMessage::user("ping")], &options)
            .await
            .map(|_| ())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<ReasoningEffort>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpCompletionClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let body = ChatRequest {
            model: &options.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            reasoning_effort: options.reasoning_effort,
        };

        let mut request = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Requesting completion from {} with model {}", self.base_url, options.model);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout_secs)
            } else {
                LlmError::Unknown(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout_secs)
            } else {
                LlmError::Unknown(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(map_status(status, retry_after, &options.model, text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))?;

        Ok(Completion {
            content,
            usage: parsed.usage,
            model: parsed.model.unwrap_or_else(|| options.model.clone()),
        })
    }
}

fn map_status(status: StatusCode, retry_after: Option<u64>, model: &str, body: String) -> LlmError {
    let lowered = body.to_lowercase();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Unauthorized(body),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited { retry_after },
        StatusCode::NOT_FOUND => LlmError::ModelUnavailable(model.to_string()),
        _ if lowered.contains("model_not_found") || lowered.contains("does not exist") => {
            LlmError::ModelUnavailable(model.to_string())
        }
        _ => LlmError::Unknown(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_base_url_without_scheme() {
        let err = HttpCompletionClient::new("api.example.com/v1", None, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = HttpCompletionClient::new("https://api.example.com/v1/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, None, "m", "bad key".into()),
            LlmError::Unauthorized(_)
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, Some(7), "m", String::new()),
            LlmError::RateLimited { retry_after: Some(7) }
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, None, "m", r#"{"error":{"code":"model_not_found"}}"#.into()),
            LlmError::ModelUnavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, None, "m", "upstream".into()),
            LlmError::Unknown(_)
        ));
    }

    #[test]
    fn test_request_omits_unset_options() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: None,
            max_tokens: Some(1),
            reasoning_effort: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 1);
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    struct RecordingClient {
        seen: std::sync::Mutex<Vec<CompletionOptions>>,
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            options: &CompletionOptions,
        ) -> Result<Completion, LlmError> {
            self.seen.lock().unwrap().push(options.clone());
            Ok(Completion {
                content: "pong".into(),
                usage: None,
                model: options.model.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_default_probe_requests_one_token() {
        let client = RecordingClient {
            seen: std::sync::Mutex::new(Vec::new()),
        };
        client.probe("small").await.unwrap();

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "small");
        assert_eq!(seen[0].max_tokens, Some(1));
    }
}
