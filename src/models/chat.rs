use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Assistant,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::User => "user",
            SenderType::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "assistant" => SenderType::Assistant,
            _ => SenderType::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub sender_type: SenderType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: impl Into<String>, sender_type: SenderType, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            sender_type,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatQueryRequest {
    pub connection_id: String,
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatSessionCreated {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChatSessionView {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ChatMessageView {
    pub message_id: String,
    #[serde(rename = "type")]
    pub sender_type: SenderType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeleteSessionStatus {
    Deleted,
    NotFound,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub session_id: String,
    pub status: DeleteSessionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_unique_id() {
        let a = ChatSession::new("Chat Session");
        let b = ChatSession::new("Chat Session");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_sender_type_round_trip() {
        assert_eq!(SenderType::from_str("user"), SenderType::User);
        assert_eq!(SenderType::from_str("assistant"), SenderType::Assistant);
        assert_eq!(SenderType::from_str(SenderType::Assistant.as_str()), SenderType::Assistant);
    }
}
