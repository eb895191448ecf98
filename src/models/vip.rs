use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vip {
    pub id: i64,
    pub user_id: i64,
    pub active: i64,
    pub expires_at: String,
    pub amount: f64,
}

impl Vip {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => expires.with_timezone(&Utc) <= now,
            Err(_) => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VipStatus {
    pub vip: bool,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}
