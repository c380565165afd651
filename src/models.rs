//! Core data model: roles and conversation messages
//!
//! A `ChatTurnMessage` is immutable once persisted. Within a session,
//! `created_at` is monotonically non-decreasing in insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Database representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Parse a stored role string. Anything unrecognized reads back as
    /// assistant, matching the prompt formatting rule (user vs. everything
    /// else).
    pub fn from_db(role: &str) -> Self {
        match role {
            "user" => MessageRole::User,
            _ => MessageRole::Assistant,
        }
    }
}

/// A single message within a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurnMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_db_round_trip() {
        assert_eq!(MessageRole::from_db("user"), MessageRole::User);
        assert_eq!(MessageRole::from_db("assistant"), MessageRole::Assistant);
        // Unknown roles collapse to assistant, never panic.
        assert_eq!(MessageRole::from_db("system"), MessageRole::Assistant);
    }

    #[test]
    fn test_message_constructors() {
        let msg = ChatTurnMessage::user("hi");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hi");

        let reply = ChatTurnMessage::assistant("hello");
        assert_eq!(reply.role, MessageRole::Assistant);
        assert!(reply.created_at >= msg.created_at);
    }
}
