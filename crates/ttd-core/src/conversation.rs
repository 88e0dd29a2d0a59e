//! Role-tagged conversation history.

use serde::{Deserialize, Serialize};

/// Author of a conversation message.
///
/// Serialized with the completion API's role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "user")]
    Researcher,
    #[serde(rename = "assistant")]
    Assistant,
}

impl MessageRole {
    /// Role name used on the wire.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            MessageRole::Researcher => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Heading used in the exported document.
    pub fn document_label(&self) -> &'static str {
        match self {
            MessageRole::Researcher => "RESEARCHER",
            MessageRole::Assistant => "METHODOLOGIST",
        }
    }
}

/// A single immutable conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Creation time, Unix milliseconds.
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Append-only ordered message sequence.
///
/// Individual entries are never removed; the whole sequence is swapped on
/// load and reset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) -> &Message {
        self.messages.push(Message::new(role, content));
        let last = self.messages.len() - 1;
        &self.messages[last]
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for ConversationLog {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order_and_stamps_time() {
        let mut log = ConversationLog::new();
        let before = chrono::Utc::now().timestamp_millis();
        log.append(MessageRole::Assistant, "Welcome!");
        log.append(MessageRole::Researcher, "statins and MI risk");

        assert_eq!(log.len(), 2);
        assert_eq!(log.all()[0].role, MessageRole::Assistant);
        assert_eq!(log.all()[1].content, "statins and MI risk");
        assert!(log.all()[1].timestamp >= before);
        assert!(log.all()[0].timestamp <= log.all()[1].timestamp);
    }

    #[test]
    fn test_replace_swaps_whole_sequence() {
        let mut log = ConversationLog::new();
        log.append(MessageRole::Researcher, "one");
        log.append(MessageRole::Assistant, "two");

        log.replace(vec![Message::new(MessageRole::Assistant, "fresh")]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().map(|m| m.content.as_str()), Some("fresh"));
    }

    #[test]
    fn test_role_wire_names() {
        let msg = Message {
            role: MessageRole::Researcher,
            content: "hi".to_string(),
            timestamp: 42,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(MessageRole::Assistant.as_api_str(), "assistant");
        assert_eq!(MessageRole::Assistant.document_label(), "METHODOLOGIST");
    }
}
