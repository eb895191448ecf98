use sqlx::Row;

use crate::database::DbPool;
use crate::middleware::auth::AuthUser;
use crate::models::chat::{ChatMessage, ChatMessageView, ChatRoom, Report};
use crate::models::user::now_timestamp;
use crate::services::credentials;
use crate::services::profanity::censor_chat_message;
use crate::utils::error::{AppError, AppResult, is_unique_violation};
use crate::utils::validation::validate_message_content;

pub const HISTORY_LIMIT: i64 = 100;

/// Posts to the global room (`receiver_id` ignored) or privately to
/// `receiver_id`. Global messages are censored before they are stored.
pub async fn post_message(
    pool: &DbPool,
    sender_id: i64,
    room: ChatRoom,
    receiver_id: Option<i64>,
    content: &str,
) -> AppResult<ChatMessage> {
    validate_message_content(content)?;

    let (content, receiver_id) = match room {
        ChatRoom::Global => {
            let (stored, censored) = censor_chat_message(content.trim());
            if censored {
                tracing::debug!("Censored global chat message from user {}", sender_id);
            }
            (stored, None)
        }
        ChatRoom::Private => {
            let receiver_id = receiver_id.ok_or_else(|| {
                AppError::Validation("Private messages need a receiver".to_string())
            })?;
            credentials::get_user(pool, receiver_id).await?;
            (content.trim().to_string(), Some(receiver_id))
        }
    };

    let created_at = now_timestamp();
    let id = sqlx::query(
        "INSERT INTO chat (chat_type, sender_id, receiver_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(room.as_str())
    .bind(sender_id)
    .bind(receiver_id)
    .bind(&content)
    .bind(&created_at)
    .execute(pool.as_ref())
    .await?
    .last_insert_rowid();

    Ok(ChatMessage {
        id,
        chat_type: room.as_str().to_string(),
        sender_id,
        receiver_id,
        content,
        created_at,
    })
}

/// Latest global messages, oldest first.
pub async fn global_history(pool: &DbPool) -> AppResult<Vec<ChatMessageView>> {
    let mut messages = sqlx::query_as::<_, ChatMessageView>(
        "SELECT c.id, c.chat_type, c.sender_id, u.username, c.receiver_id, c.content, c.created_at
         FROM chat c JOIN users u ON u.id = c.sender_id
         WHERE c.chat_type = 'global'
         ORDER BY c.id DESC LIMIT ?",
    )
    .bind(HISTORY_LIMIT)
    .fetch_all(pool.as_ref())
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Private messages involving `user_id`, optionally narrowed to one peer.
pub async fn private_history(
    pool: &DbPool,
    user_id: i64,
    peer_id: Option<i64>,
) -> AppResult<Vec<ChatMessageView>> {
    let mut messages = sqlx::query_as::<_, ChatMessageView>(
        "SELECT c.id, c.chat_type, c.sender_id, u.username, c.receiver_id, c.content, c.created_at
         FROM chat c JOIN users u ON u.id = c.sender_id
         WHERE c.chat_type = 'private'
           AND (c.sender_id = ? OR c.receiver_id = ?)
           AND (? IS NULL OR c.sender_id = ? OR c.receiver_id = ?)
         ORDER BY c.id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(peer_id)
    .bind(peer_id)
    .bind(peer_id)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool.as_ref())
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Reports a chat message. A reporter can only see (and so report) global
/// messages or private messages they are part of.
pub async fn report_message(pool: &DbPool, reporter: &AuthUser, message_id: i64) -> AppResult<Report> {
    let message = sqlx::query_as::<_, ChatMessage>("SELECT * FROM chat WHERE id = ?")
        .bind(message_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    let visible = message.chat_type == ChatRoom::Global.as_str()
        || message.sender_id == reporter.id
        || message.receiver_id == Some(reporter.id);
    if !visible {
        return Err(AppError::NotFound("Message not found".to_string()));
    }

    let created_at = now_timestamp();
    let inserted = sqlx::query("INSERT INTO reports (message_id, reporter_id, created_at) VALUES (?, ?, ?)")
        .bind(message_id)
        .bind(reporter.id)
        .bind(&created_at)
        .execute(pool.as_ref())
        .await;

    let id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "You have already reported this message".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Message {} reported by user {}", message_id, reporter.id);

    Ok(Report {
        id,
        message_id,
        reporter_id: reporter.id,
        created_at,
    })
}

pub async fn list_reports(pool: &DbPool) -> AppResult<Vec<serde_json::Value>> {
    let rows = sqlx::query(
        "SELECT r.id, r.message_id, r.created_at, c.content, s.username AS sender, p.username AS reporter
         FROM reports r
         JOIN chat c ON c.id = r.message_id
         JOIN users s ON s.id = c.sender_id
         JOIN users p ON p.id = r.reporter_id
         ORDER BY r.id DESC",
    )
    .fetch_all(pool.as_ref())
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "id": row.get::<i64, _>("id"),
                "message_id": row.get::<i64, _>("message_id"),
                "content": row.get::<String, _>("content"),
                "sender": row.get::<String, _>("sender"),
                "reporter": row.get::<String, _>("reporter"),
                "created_at": row.get::<String, _>("created_at"),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use crate::models::user::Role;
    use crate::services::credentials::create_user;

    fn auth(id: i64) -> AuthUser {
        AuthUser {
            id,
            username: format!("u{}", id),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_global_history_in_order() {
        let pool = create_memory_pool().await.unwrap();
        let alice = create_user(&pool, "a@example.com", "alice", "d").await.unwrap();

        post_message(&pool, alice, ChatRoom::Global, None, "first").await.unwrap();
        post_message(&pool, alice, ChatRoom::Global, Some(42), "second").await.unwrap();

        let history = global_history(&pool).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
        assert_eq!(history[1].receiver_id, None);
        assert_eq!(history[0].username, "alice");
    }

    #[tokio::test]
    async fn test_private_messages_only_visible_to_participants() {
        let pool = create_memory_pool().await.unwrap();
        let alice = create_user(&pool, "a@example.com", "alice", "d").await.unwrap();
        let bob = create_user(&pool, "b@example.com", "bob", "d").await.unwrap();
        let carol = create_user(&pool, "c@example.com", "carol", "d").await.unwrap();

        post_message(&pool, alice, ChatRoom::Private, Some(bob), "hi bob").await.unwrap();

        assert_eq!(private_history(&pool, bob, None).await.unwrap().len(), 1);
        assert_eq!(private_history(&pool, alice, Some(bob)).await.unwrap().len(), 1);
        assert!(private_history(&pool, carol, None).await.unwrap().is_empty());
        assert!(private_history(&pool, alice, Some(carol)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_message_needs_existing_receiver() {
        let pool = create_memory_pool().await.unwrap();
        let alice = create_user(&pool, "a@example.com", "alice", "d").await.unwrap();

        assert!(matches!(
            post_message(&pool, alice, ChatRoom::Private, None, "hi").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            post_message(&pool, alice, ChatRoom::Private, Some(99), "hi").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_report_once_per_reporter() {
        let pool = create_memory_pool().await.unwrap();
        let alice = create_user(&pool, "a@example.com", "alice", "d").await.unwrap();
        let bob = create_user(&pool, "b@example.com", "bob", "d").await.unwrap();

        let msg = post_message(&pool, alice, ChatRoom::Global, None, "spam").await.unwrap();
        report_message(&pool, &auth(bob), msg.id).await.unwrap();
        assert!(matches!(
            report_message(&pool, &auth(bob), msg.id).await,
            Err(AppError::Conflict(_))
        ));

        let reports = list_reports(&pool).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0]["reporter"], "bob");
    }
}
