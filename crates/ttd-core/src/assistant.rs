//! Language-model completion boundary.

use crate::conversation::{Message, MessageRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// One turn of the history sent to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Everything needed for one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    /// Instruction context built for the current session state.
    pub system: String,
    /// Full conversation, oldest first, ending with the researcher's message.
    pub history: Vec<ChatTurn>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, messages: &[Message]) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system: system.into(),
            history: messages.iter().map(ChatTurn::from).collect(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Failure of a completion call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssistantError {
    /// The service answered with a non-success status, or could not be reached.
    #[error("{message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// The service answered but the body carried no usable text.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Missing API key or similar setup problem.
    #[error("Assistant not configured: {0}")]
    Configuration(String),
}

impl AssistantError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProcessError {
                is_retryable: true,
                ..
            }
        )
    }
}

/// A service that turns a conversation into the next assistant reply.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AssistantError>;
}
