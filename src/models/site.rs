use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Greeting shown by one of the site mascots (`cat`, `bat`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MascotMessage {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Message left through the public contact form.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactMessage {
    pub id: i64,
    pub email: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sticker {
    pub name: String,
    pub url: String,
}
