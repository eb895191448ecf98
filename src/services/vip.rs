use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;

use crate::database::DbPool;
use crate::models::user::Role;
use crate::models::vip::{Vip, VipStatus};
use crate::utils::error::{AppError, AppResult};

/// Role carried by a freshly issued token.
///
/// Stored `admin` and `developer` roles are explicit admin grants and always
/// win. A plain user with an unexpired VIP subscription is elevated to
/// `developer` for as long as the subscription lasts.
pub fn effective_role(stored: Role, vip_active: bool) -> Role {
    match stored {
        Role::Admin | Role::Developer => stored,
        Role::User if vip_active => Role::Developer,
        Role::User => Role::User,
    }
}

async fn active_subscription(pool: &DbPool, user_id: i64) -> AppResult<Option<Vip>> {
    let vip = sqlx::query_as::<_, Vip>(
        "SELECT * FROM vip WHERE user_id = ? AND active = 1 ORDER BY expires_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool.as_ref())
    .await?;
    Ok(vip)
}

/// Reports the user's VIP status, deactivating lapsed subscriptions.
pub async fn check_vip(pool: &DbPool, user_id: i64) -> AppResult<VipStatus> {
    check_vip_at(pool, user_id, Utc::now()).await
}

pub async fn check_vip_at(pool: &DbPool, user_id: i64, now: DateTime<Utc>) -> AppResult<VipStatus> {
    let inactive = VipStatus {
        vip: false,
        expires_at: None,
        amount: None,
    };

    let Some(vip) = active_subscription(pool, user_id).await? else {
        return Ok(inactive);
    };

    if vip.is_expired_at(now) {
        sqlx::query("UPDATE vip SET active = 0 WHERE user_id = ? AND active = 1")
            .bind(user_id)
            .execute(pool.as_ref())
            .await?;
        tracing::info!("VIP subscription for user {} lapsed", user_id);
        return Ok(inactive);
    }

    Ok(VipStatus {
        vip: true,
        expires_at: Some(vip.expires_at),
        amount: Some(vip.amount),
    })
}

/// Longest subscription a single payment may buy.
pub const MAX_VIP_DAYS: i64 = 3650;

/// Checks a requested VIP length and turns it into a duration.
pub fn vip_duration(days: i64) -> AppResult<Duration> {
    if days <= 0 || days > MAX_VIP_DAYS {
        return Err(AppError::Validation(format!(
            "VIP days must be between 1 and {}",
            MAX_VIP_DAYS
        )));
    }
    Duration::try_days(days)
        .ok_or_else(|| AppError::Validation(format!("Invalid VIP length: {} days", days)))
}

/// Grants `days` of VIP, extending an unexpired subscription rather than
/// starting over.
pub async fn grant_vip(pool: &DbPool, user_id: i64, days: i64, amount: f64) -> AppResult<Vip> {
    let mut tx = pool.begin().await?;
    let vip = grant_vip_in(&mut *tx, user_id, days, amount, Utc::now()).await?;
    tx.commit().await?;
    Ok(vip)
}

/// [`grant_vip`] on a caller-owned connection, so the grant can share a
/// transaction with the payment that bought it.
pub async fn grant_vip_in(
    conn: &mut SqliteConnection,
    user_id: i64,
    days: i64,
    amount: f64,
    now: DateTime<Utc>,
) -> AppResult<Vip> {
    let length = vip_duration(days)?;

    let current = sqlx::query_as::<_, Vip>(
        "SELECT * FROM vip WHERE user_id = ? AND active = 1 ORDER BY expires_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let starts_at = current
        .filter(|vip| !vip.is_expired_at(now))
        .and_then(|vip| DateTime::parse_from_rfc3339(&vip.expires_at).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(now);
    let expires_at = starts_at
        .checked_add_signed(length)
        .ok_or_else(|| AppError::Validation("VIP expiry is out of range".to_string()))?
        .to_rfc3339();

    sqlx::query("UPDATE vip SET active = 0 WHERE user_id = ? AND active = 1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let id = sqlx::query("INSERT INTO vip (user_id, active, expires_at, amount) VALUES (?, 1, ?, ?)")
        .bind(user_id)
        .bind(&expires_at)
        .bind(amount)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    tracing::info!("VIP granted to user {} until {}", user_id, expires_at);

    Ok(Vip {
        id,
        user_id,
        active: 1,
        expires_at,
        amount,
    })
}
