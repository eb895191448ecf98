//! Site content: mascot greetings and the public contact form.

use crate::database::DbPool;
use crate::models::site::{ContactMessage, MascotMessage};
use crate::models::user::now_timestamp;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::{validate_contact_message, validate_email, validate_message_content};

/// All mascot greetings, or only those of `kind`.
pub async fn mascot_messages(pool: &DbPool, kind: Option<&str>) -> AppResult<Vec<MascotMessage>> {
    let messages = match kind {
        Some(kind) => {
            sqlx::query_as::<_, MascotMessage>(
                "SELECT id, kind, content FROM mascot_messages WHERE kind = ? ORDER BY id",
            )
            .bind(kind.trim().to_lowercase())
            .fetch_all(pool.as_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, MascotMessage>(
                "SELECT id, kind, content FROM mascot_messages ORDER BY id",
            )
            .fetch_all(pool.as_ref())
            .await?
        }
    };
    Ok(messages)
}

/// Replaces the greeting of an existing mascot.
pub async fn set_mascot_message(pool: &DbPool, kind: &str, content: &str) -> AppResult<MascotMessage> {
    validate_message_content(content)?;

    let kind = kind.trim().to_lowercase();
    let updated = sqlx::query("UPDATE mascot_messages SET content = ? WHERE kind = ?")
        .bind(content.trim())
        .bind(&kind)
        .execute(pool.as_ref())
        .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("No mascot named '{}'", kind)));
    }

    tracing::info!("Mascot message for '{}' updated", kind);
    sqlx::query_as::<_, MascotMessage>("SELECT id, kind, content FROM mascot_messages WHERE kind = ?")
        .bind(&kind)
        .fetch_one(pool.as_ref())
        .await
        .map_err(Into::into)
}

pub async fn submit_contact(pool: &DbPool, email: &str, message: &str) -> AppResult<ContactMessage> {
    let email = validate_email(email)?;
    validate_contact_message(message)?;

    let message = message.trim().to_string();
    let created_at = now_timestamp();
    let id = sqlx::query(
        "INSERT INTO contact_messages (email, message, created_at) VALUES (?, ?, ?)",
    )
    .bind(&email)
    .bind(&message)
    .bind(&created_at)
    .execute(pool.as_ref())
    .await?
    .last_insert_rowid();

    tracing::info!("Contact message {} received from {}", id, email);
    Ok(ContactMessage {
        id,
        email,
        message,
        created_at,
    })
}

/// Contact messages, newest first.
pub async fn list_contacts(pool: &DbPool) -> AppResult<Vec<ContactMessage>> {
    let contacts = sqlx::query_as::<_, ContactMessage>(
        "SELECT * FROM contact_messages ORDER BY id DESC",
    )
    .fetch_all(pool.as_ref())
    .await?;
    Ok(contacts)
}
