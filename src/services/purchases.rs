use chrono::Utc;
use sqlx::Row;

use crate::database::DbPool;
use crate::middleware::auth::AuthUser;
use crate::models::file::FileRecord;
use crate::models::payment::{CaptureRequest, Payment, PaymentPurpose};
use crate::models::purchase::{Purchase, PurchaseOutcome};
use crate::models::user::{Role, now_timestamp};
use crate::services::{credentials, file_storage, vip};
use crate::utils::error::{AppError, AppResult, is_unique_violation};

async fn has_purchase(pool: &DbPool, user_id: i64, file_id: i64) -> AppResult<bool> {
    let count = sqlx::query("SELECT COUNT(*) as count FROM purchases WHERE user_id = ? AND file_id = ?")
        .bind(user_id)
        .bind(file_id)
        .fetch_one(pool.as_ref())
        .await?
        .get::<i64, _>("count");
    Ok(count > 0)
}

/// Whether `user` may download `file`. Free files, the uploader and admins
/// need no purchase row.
pub async fn is_entitled(pool: &DbPool, user: &AuthUser, file: &FileRecord) -> AppResult<bool> {
    if file.is_free() || file.owner_id == user.id || user.role == Role::Admin {
        return Ok(true);
    }
    has_purchase(pool, user.id, file.id).await
}

/// Buys `file_id` for `user_id`.
///
/// Free files short-circuit without writing a row. Priced files consume a
/// captured payment for this user and file covering the price; the
/// consumption and the purchase row are written in one transaction.
pub async fn record_purchase(pool: &DbPool, user_id: i64, file_id: i64) -> AppResult<PurchaseOutcome> {
    let file = file_storage::get_visible_file(pool, file_id, None).await?;

    if file.is_free() {
        return Ok(PurchaseOutcome::Free);
    }

    if file.owner_id == user_id || has_purchase(pool, user_id, file_id).await? {
        return Err(AppError::AlreadyOwned);
    }

    let mut tx = pool.begin().await?;

    let payment = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments
         WHERE user_id = ? AND file_id = ? AND purpose = 'file' AND consumed = 0 AND amount >= ?
         ORDER BY captured_at ASC LIMIT 1",
    )
    .bind(user_id)
    .bind(file_id)
    .bind(file.price)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        AppError::PaymentRequired(format!("File {} costs {:.2}", file_id, file.price))
    })?;

    sqlx::query("UPDATE payments SET consumed = 1 WHERE id = ?")
        .bind(payment.id)
        .execute(&mut *tx)
        .await?;

    let purchased_at = now_timestamp();
    let inserted = sqlx::query("INSERT INTO purchases (user_id, file_id, purchased_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(file_id)
        .bind(&purchased_at)
        .execute(&mut *tx)
        .await;

    let id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        // Dropping the transaction rolls back the payment consumption.
        Err(e) if is_unique_violation(&e) => return Err(AppError::AlreadyOwned),
        Err(e) => return Err(e.into()),
    };

    tx.commit().await?;

    tracing::info!(
        "Purchase recorded: user={}, file={}, payment={}",
        user_id,
        file_id,
        payment.reference
    );

    Ok(PurchaseOutcome::Purchased {
        purchase: Purchase {
            id,
            user_id,
            file_id,
            purchased_at,
        },
    })
}

pub async fn list_purchases(pool: &DbPool, user_id: i64) -> AppResult<Vec<Purchase>> {
    let purchases = sqlx::query_as::<_, Purchase>(
        "SELECT * FROM purchases WHERE user_id = ? ORDER BY purchased_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool.as_ref())
    .await?;
    Ok(purchases)
}

/// Records a payment the gateway reported as captured. VIP payments grant
/// their subscription immediately; file payments wait to be consumed by
/// [`record_purchase`].
pub async fn record_capture(pool: &DbPool, request: CaptureRequest) -> AppResult<Payment> {
    if !request.amount.is_finite() || request.amount < 0.0 {
        return Err(AppError::Validation(
            "Amount must be a non-negative number".to_string(),
        ));
    }
    if request.reference.trim().is_empty() {
        return Err(AppError::Validation("Reference cannot be empty".to_string()));
    }

    credentials::get_user(pool, request.user_id).await?;

    let file_id = match request.purpose {
        PaymentPurpose::File { file_id } => {
            file_storage::get_file(pool, file_id).await?;
            Some(file_id)
        }
        PaymentPurpose::Vip { days } => {
            vip::vip_duration(days)?;
            None
        }
    };

    // Payment row and VIP grant commit together.
    let mut tx = pool.begin().await?;

    let captured_at = now_timestamp();
    let inserted = sqlx::query(
        "INSERT INTO payments (user_id, file_id, purpose, amount, reference, consumed, captured_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(request.user_id)
    .bind(file_id)
    .bind(request.purpose.as_str())
    .bind(request.amount)
    .bind(request.reference.trim())
    .bind(matches!(request.purpose, PaymentPurpose::Vip { .. }) as i64)
    .bind(&captured_at)
    .execute(&mut *tx)
    .await;

    let id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(format!(
                "Payment {} was already recorded",
                request.reference
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if let PaymentPurpose::Vip { days } = request.purpose {
        vip::grant_vip_in(&mut *tx, request.user_id, days, request.amount, Utc::now()).await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Payment captured: id={}, user={}, purpose={}, amount={}",
        id,
        request.user_id,
        request.purpose.as_str(),
        request.amount
    );

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
        .bind(id)
        .fetch_one(pool.as_ref())
        .await?;
    Ok(payment)
}
