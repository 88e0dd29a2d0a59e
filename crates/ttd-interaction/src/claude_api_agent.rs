//! ClaudeApiAgent - direct REST client for the Anthropic Messages API.
//!
//! Configuration priority: `secret.json` > environment variables.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use ttd_core::assistant::{AssistantClient, AssistantError, CompletionRequest};
use ttd_core::config::{AssistantConfig, DEFAULT_ENDPOINT, SecretConfig};
use ttd_infrastructure::storage::{SecretStorage, SecretStorageError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Assistant client that talks to the Claude HTTP API.
#[derive(Clone)]
pub struct ClaudeApiAgent {
    client: Client,
    api_key: String,
    endpoint: String,
    /// Model forced by the secret file or environment; wins over the request.
    model_override: Option<String>,
}

impl std::fmt::Debug for ClaudeApiAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeApiAgent")
            .field("endpoint", &self.endpoint)
            .field("model_override", &self.model_override)
            .finish_non_exhaustive()
    }
}

impl ClaudeApiAgent {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model_override: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model_override(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn model_override(&self) -> Option<&str> {
        self.model_override.as_deref()
    }

    /// Builds an agent from `secret.json` or the environment.
    ///
    /// Priority:
    /// 1. `<config dir>/secret.json` (`claude.api_key`, `claude.model_name`)
    /// 2. Environment variables (`ANTHROPIC_API_KEY`, `CLAUDE_MODEL_NAME`)
    pub fn try_from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let secret = match SecretStorage::new().and_then(|storage| storage.load()) {
            Ok(secret) => Some(secret),
            Err(SecretStorageError::NotFound(_)) => None,
            Err(e) => {
                tracing::warn!("[ClaudeApiAgent] Ignoring secret file: {}", e);
                None
            }
        };
        Self::from_sources(config, secret, |name| env::var(name).ok())
    }

    fn from_sources(
        config: &AssistantConfig,
        secret: Option<SecretConfig>,
        env_lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AssistantError> {
        let (api_key, model) = match secret.and_then(|s| s.claude) {
            Some(claude) if !claude.api_key.trim().is_empty() => (claude.api_key, claude.model_name),
            _ => {
                let api_key = env_lookup("ANTHROPIC_API_KEY")
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        AssistantError::Configuration(
                            "ANTHROPIC_API_KEY not found in secret.json or environment variables"
                                .into(),
                        )
                    })?;
                (api_key, env_lookup("CLAUDE_MODEL_NAME"))
            }
        };

        let mut agent = Self::new(api_key).with_endpoint(config.endpoint.clone());
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            agent = agent.with_model_override(model);
        }
        Ok(agent)
    }

    async fn send_request(&self, body: &CreateMessageRequest) -> Result<String, AssistantError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| AssistantError::ProcessError {
                status_code: None,
                message: format!("Claude API request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Claude error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: CreateMessageResponse = response.json().await.map_err(|err| {
            AssistantError::MalformedResponse(format!("Failed to parse Claude response: {err}"))
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl AssistantClient for ClaudeApiAgent {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AssistantError> {
        let model = self.model_override.clone().unwrap_or(request.model);
        let messages = request
            .history
            .into_iter()
            .map(|turn| Message {
                role: turn.role.as_api_str(),
                content: turn.content,
            })
            .collect();

        let body = CreateMessageRequest {
            model,
            max_tokens: request.max_tokens,
            system: request.system,
            messages,
        };

        tracing::debug!(
            "[ClaudeApiAgent] Sending {} messages to {}",
            body.messages.len(),
            body.model
        );
        self.send_request(&body).await
    }
}

#[derive(Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    #[serde(default)]
    content: Vec<ContentBlockResponse>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockResponse {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: CreateMessageResponse) -> Result<String, AssistantError> {
    response
        .content
        .into_iter()
        .find_map(|block| match block {
            ContentBlockResponse::Text { text } if !text.trim().is_empty() => Some(text),
            _ => None,
        })
        .ok_or_else(|| {
            AssistantError::MalformedResponse(
                "Claude API returned no text in the response content".into(),
            )
        })
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> AssistantError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    AssistantError::ProcessError {
        status_code: Some(status.as_u16()),
        message: format!("Claude API error ({}): {}", status.as_u16(), message),
        is_retryable,
        retry_after,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    // HTTP-date values are not supported
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use ttd_core::conversation::{Message as ConversationMessage, MessageRole};

    fn request() -> CompletionRequest {
        let messages = vec![
            ConversationMessage::new(MessageRole::Assistant, "Welcome!"),
            ConversationMessage::new(MessageRole::Researcher, "statins and MI risk"),
        ];
        CompletionRequest::new("system context", &messages)
    }

    fn agent_for(server: &MockServer) -> ClaudeApiAgent {
        ClaudeApiAgent::new("test-key").with_endpoint(server.url("/v1/messages"))
    }

    #[tokio::test]
    async fn test_complete_posts_history_and_returns_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "test-key")
                    .header("anthropic-version", "2023-06-01")
                    .body_includes("\"model\":\"claude-sonnet-4-20250514\"")
                    .body_includes("\"max_tokens\":2000")
                    .body_includes("\"system\":\"system context\"")
                    .body_includes(
                        "{\"role\":\"user\",\"content\":\"statins and MI risk\"}",
                    );
                then.status(200).json_body(json!({
                    "id": "msg_1",
                    "type": "message",
                    "content": [{ "type": "text", "text": "Let's define eligibility." }]
                }));
            })
            .await;

        let reply = agent_for(&server).complete(request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "Let's define eligibility.");
    }

    #[tokio::test]
    async fn test_model_override_wins() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).body_includes("\"model\":\"claude-opus-4-1\"");
                then.status(200)
                    .json_body(json!({ "content": [{ "type": "text", "text": "ok" }] }));
            })
            .await;

        let agent = agent_for(&server).with_model_override("claude-opus-4-1");
        assert_eq!(agent.complete(request()).await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_text_blocks_are_skipped() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({
                    "content": [
                        { "type": "thinking", "thinking": "..." },
                        { "type": "text", "text": "answer" }
                    ]
                }));
            })
            .await;

        assert_eq!(agent_for(&server).complete(request()).await.unwrap(), "answer");
    }

    #[tokio::test]
    async fn test_empty_content_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({ "content": [] }));
            })
            .await;

        let err = agent_for(&server).complete(request()).await.unwrap_err();
        assert!(matches!(err, AssistantError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable_with_delay() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).header("retry-after", "7").json_body(json!({
                    "type": "error",
                    "error": { "type": "rate_limit_error", "message": "Too many requests" }
                }));
            })
            .await;

        let err = agent_for(&server).complete(request()).await.unwrap_err();
        match err {
            AssistantError::ProcessError {
                status_code,
                message,
                is_retryable,
                retry_after,
            } => {
                assert_eq!(status_code, Some(429));
                assert!(message.contains("Too many requests"));
                assert!(is_retryable);
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected ProcessError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_not_retryable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401).body("unauthorized");
            })
            .await;

        let err = agent_for(&server).complete(request()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("unauthorized"));
    }

    #[test]
    fn test_secret_file_takes_priority_over_env() {
        let secret: SecretConfig =
            serde_json::from_str(r#"{"claude":{"api_key":"from-secret"}}"#).unwrap();
        let agent = ClaudeApiAgent::from_sources(&AssistantConfig::default(), Some(secret), |name| {
            match name {
                "ANTHROPIC_API_KEY" => Some("from-env".to_string()),
                "CLAUDE_MODEL_NAME" => Some("env-model".to_string()),
                _ => None,
            }
        })
        .unwrap();

        assert_eq!(agent.api_key, "from-secret");
        assert_eq!(agent.model_override(), None);
    }

    #[test]
    fn test_env_fallback_and_missing_key() {
        let agent = ClaudeApiAgent::from_sources(&AssistantConfig::default(), None, |name| match name {
            "ANTHROPIC_API_KEY" => Some("from-env".to_string()),
            "CLAUDE_MODEL_NAME" => Some("env-model".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(agent.api_key, "from-env");
        assert_eq!(agent.model_override(), Some("env-model"));
        assert_eq!(agent.endpoint, DEFAULT_ENDPOINT);

        let err = ClaudeApiAgent::from_sources(&AssistantConfig::default(), None, |_| None).unwrap_err();
        assert!(matches!(err, AssistantError::Configuration(_)));
    }
}
