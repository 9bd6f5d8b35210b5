//! Chat transcript data models.
//!
//! The serialized field names (camelCase) and RFC 3339 timestamp strings
//! are the on-disk format of the local backend; the sqlite backend maps
//! its rows onto the same types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Title given to chats created without an explicit one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// A titled, user-owned conversation container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Owning user's identifier. Immutable after creation.
    pub user_id: String,
    /// When the chat was created.
    pub created_at: DateTime<Utc>,
    /// Bumped on rename and on every new message.
    pub updated_at: DateTime<Utc>,
}

/// One persisted turn in a conversation. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Turn text.
    pub content: String,
    /// Who authored the turn.
    pub role: MessageRole,
    /// When the turn was recorded. Messages within a chat are totally
    /// ordered by this field.
    pub created_at: DateTime<Utc>,
    /// Owning chat's identifier.
    pub chat_id: String,
}

/// Input for appending a message to a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,
    pub role: MessageRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
        assert_eq!(MessageRole::from_str("user").unwrap(), MessageRole::User);
        assert_eq!(
            MessageRole::from_str("Assistant").unwrap(),
            MessageRole::Assistant
        );
        assert!(MessageRole::from_str("system").is_err());
    }

    #[test]
    fn test_chat_serializes_camel_case() {
        let chat = Chat {
            id: "c1".to_string(),
            title: DEFAULT_CHAT_TITLE.to_string(),
            user_id: "auth0|u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&chat).unwrap();
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"updatedAt\""));
    }
}
