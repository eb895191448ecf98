use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: i64,
    pub user_id: i64,
    pub file_id: i64,
    pub purchased_at: String,
}

/// Result of a purchase request that did not fail.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    /// Free file: entitlement is implicit and no row is written.
    Free,
    Purchased { purchase: Purchase },
}
