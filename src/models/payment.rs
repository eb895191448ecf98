use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub file_id: Option<i64>,
    pub purpose: String,
    pub amount: f64,
    pub reference: String,
    pub consumed: i64,
    pub captured_at: String,
}

/// What a captured payment pays for.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum PaymentPurpose {
    File { file_id: i64 },
    Vip { days: i64 },
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::File { .. } => "file",
            PaymentPurpose::Vip { .. } => "vip",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRequest {
    pub user_id: i64,
    pub amount: f64,
    /// Gateway order/transaction id; a reference is only ever recorded once.
    pub reference: String,
    #[serde(flatten)]
    pub purpose: PaymentPurpose,
}
