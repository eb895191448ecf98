//! Likes and comments on files.

use sqlx::Row;

use crate::database::DbPool;
use crate::middleware::auth::AuthUser;
use crate::models::comment::Comment;
use crate::models::user::now_timestamp;
use crate::utils::error::{AppError, AppResult};
use crate::utils::permissions::require_owner_or_admin;
use crate::utils::validation::validate_comment;

/// Likes the file if the user has not yet, otherwise removes the like.
/// Returns whether the file is liked afterwards.
pub async fn toggle_like(pool: &DbPool, file_id: i64, user_id: i64) -> AppResult<bool> {
    let removed = sqlx::query("DELETE FROM file_likes WHERE file_id = ? AND user_id = ?")
        .bind(file_id)
        .bind(user_id)
        .execute(pool.as_ref())
        .await?
        .rows_affected();

    if removed > 0 {
        return Ok(false);
    }

    sqlx::query(
        "INSERT OR IGNORE INTO file_likes (file_id, user_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(file_id)
    .bind(user_id)
    .bind(now_timestamp())
    .execute(pool.as_ref())
    .await?;

    Ok(true)
}

pub async fn like_count(pool: &DbPool, file_id: i64) -> AppResult<i64> {
    let count = sqlx::query("SELECT COUNT(*) as count FROM file_likes WHERE file_id = ?")
        .bind(file_id)
        .fetch_one(pool.as_ref())
        .await?
        .get::<i64, _>("count");
    Ok(count)
}

pub async fn has_liked(pool: &DbPool, file_id: i64, user_id: i64) -> AppResult<bool> {
    let count = sqlx::query("SELECT COUNT(*) as count FROM file_likes WHERE file_id = ? AND user_id = ?")
        .bind(file_id)
        .bind(user_id)
        .fetch_one(pool.as_ref())
        .await?
        .get::<i64, _>("count");
    Ok(count > 0)
}

pub async fn add_comment(pool: &DbPool, file_id: i64, user: &AuthUser, content: &str) -> AppResult<Comment> {
    validate_comment(content)?;

    let created_at = now_timestamp();
    let content = content.trim().to_string();
    let id = sqlx::query(
        "INSERT INTO file_comments (file_id, user_id, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(file_id)
    .bind(user.id)
    .bind(&content)
    .bind(&created_at)
    .execute(pool.as_ref())
    .await?
    .last_insert_rowid();

    Ok(Comment {
        id,
        file_id,
        user_id: user.id,
        username: user.username.clone(),
        content,
        created_at,
    })
}

pub async fn list_comments(pool: &DbPool, file_id: i64) -> AppResult<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(
        "SELECT c.id, c.file_id, c.user_id, u.username, c.content, c.created_at
         FROM file_comments c JOIN users u ON u.id = c.user_id
         WHERE c.file_id = ?
         ORDER BY c.id ASC",
    )
    .bind(file_id)
    .fetch_all(pool.as_ref())
    .await?;
    Ok(comments)
}

/// Authors may delete their own comments; admins may delete any.
pub async fn delete_comment(pool: &DbPool, comment_id: i64, requester: &AuthUser) -> AppResult<()> {
    let author_id = sqlx::query("SELECT user_id FROM file_comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(pool.as_ref())
        .await?
        .map(|row| row.get::<i64, _>("user_id"))
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    require_owner_or_admin(requester, author_id)?;

    sqlx::query("DELETE FROM file_comments WHERE id = ?")
        .bind(comment_id)
        .execute(pool.as_ref())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use crate::models::user::Role;
    use crate::services::credentials::create_user;

    async fn seed_file(pool: &DbPool, owner: i64) -> i64 {
        sqlx::query(
            "INSERT INTO files (name, category, path, content_hash, size, content_type, owner_id, price, created_at)
             VALUES ('a.txt', 'general', 'general/abc', 'abc', 1, 'text/plain', ?, 0, '2025-01-01T00:00:00Z')",
        )
        .bind(owner)
        .execute(pool.as_ref())
        .await
        .unwrap()
        .last_insert_rowid()
    }

    fn auth(id: i64, role: Role) -> AuthUser {
        AuthUser {
            id,
            username: format!("u{}", id),
            role,
        }
    }

    #[tokio::test]
    async fn test_like_toggles() {
        let pool = create_memory_pool().await.unwrap();
        let user = create_user(&pool, "a@example.com", "alice", "d").await.unwrap();
        let file = seed_file(&pool, user).await;

        assert!(toggle_like(&pool, file, user).await.unwrap());
        assert_eq!(like_count(&pool, file).await.unwrap(), 1);
        assert!(has_liked(&pool, file, user).await.unwrap());

        assert!(!toggle_like(&pool, file, user).await.unwrap());
        assert_eq!(like_count(&pool, file).await.unwrap(), 0);
        assert!(!has_liked(&pool, file, user).await.unwrap());
    }

    #[tokio::test]
    async fn test_comment_delete_rules() {
        let pool = create_memory_pool().await.unwrap();
        let alice = create_user(&pool, "a@example.com", "alice", "d").await.unwrap();
        let bob = create_user(&pool, "b@example.com", "bob", "d").await.unwrap();
        let file = seed_file(&pool, alice).await;

        let comment = add_comment(&pool, file, &auth(alice, Role::User), " nice ")
            .await
            .unwrap();
        assert_eq!(comment.content, "nice");
        assert_eq!(list_comments(&pool, file).await.unwrap().len(), 1);

        assert!(matches!(
            delete_comment(&pool, comment.id, &auth(bob, Role::User)).await,
            Err(AppError::Forbidden(_))
        ));
        delete_comment(&pool, comment.id, &auth(bob, Role::Admin)).await.unwrap();
        assert!(list_comments(&pool, file).await.unwrap().is_empty());
    }
}
