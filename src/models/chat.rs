use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRoom {
    Global,
    Private,
}

impl ChatRoom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRoom::Global => "global",
            ChatRoom::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(ChatRoom::Global),
            "private" => Some(ChatRoom::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_type: String,
    pub sender_id: i64,
    pub receiver_id: Option<i64>,
    pub content: String,
    pub created_at: String,
}

/// Chat message joined with the sender's username for display.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessageView {
    pub id: i64,
    pub chat_type: String,
    pub sender_id: i64,
    pub username: String,
    pub receiver_id: Option<i64>,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: i64,
    pub message_id: i64,
    pub reporter_id: i64,
    pub created_at: String,
}
