//! Persistence of user records: identity, password digest, role, ban flag
//! and profile fields. Every mutation touches a single row keyed by id.

use sqlx::Row;

use crate::database::DbPool;
use crate::models::user::{ProfileUpdate, Role, User, now_timestamp};
use crate::utils::crypto::hash_password;
use crate::utils::error::{AppError, AppResult, is_unique_violation};

/// Inserts a user and returns its id. The digest must already be hashed.
pub async fn create_user(
    pool: &DbPool,
    email: &str,
    username: &str,
    password_digest: &str,
) -> AppResult<i64> {
    create_user_with_role(pool, email, username, password_digest, Role::User).await
}

pub async fn create_user_with_role(
    pool: &DbPool,
    email: &str,
    username: &str,
    password_digest: &str,
    role: Role,
) -> AppResult<i64> {
    let existing = sqlx::query(
        "SELECT
            SUM(CASE WHEN email = ? THEN 1 ELSE 0 END) AS email_taken,
            SUM(CASE WHEN username = ? THEN 1 ELSE 0 END) AS username_taken
         FROM users",
    )
    .bind(email)
    .bind(username)
    .fetch_one(pool.as_ref())
    .await?;

    if existing.try_get::<Option<i64>, _>("email_taken")?.unwrap_or(0) > 0 {
        return Err(AppError::DuplicateIdentity("email".to_string()));
    }
    if existing.try_get::<Option<i64>, _>("username_taken")?.unwrap_or(0) > 0 {
        return Err(AppError::DuplicateIdentity("username".to_string()));
    }

    let result = sqlx::query(
        "INSERT INTO users (email, username, password_hash, role, banned, created_at)
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(email)
    .bind(username)
    .bind(password_digest)
    .bind(role.as_str())
    .bind(now_timestamp())
    .execute(pool.as_ref())
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        // Lost a race with a concurrent registration.
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::DuplicateIdentity("email or username".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool.as_ref())
        .await?;
    Ok(user)
}

pub async fn find_by_username(pool: &DbPool, username: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username.trim())
        .fetch_optional(pool.as_ref())
        .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &DbPool, user_id: i64) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool.as_ref())
        .await?;
    Ok(user)
}

pub async fn get_user(pool: &DbPool, user_id: i64) -> AppResult<User> {
    find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn set_role(pool: &DbPool, user_id: i64, role: Role) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(user_id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("User {} role set to {}", user_id, role);
    Ok(())
}

pub async fn set_banned(pool: &DbPool, user_id: i64, banned: bool) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET banned = ? WHERE id = ?")
        .bind(banned as i64)
        .bind(user_id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("User {} banned={}", user_id, banned);
    Ok(())
}

pub async fn update_profile(pool: &DbPool, user_id: i64, fields: ProfileUpdate) -> AppResult<User> {
    let result = sqlx::query(
        "UPDATE users SET about = COALESCE(?, about), avatar = COALESCE(?, avatar) WHERE id = ?",
    )
    .bind(&fields.about)
    .bind(&fields.avatar)
    .bind(user_id)
    .execute(pool.as_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    get_user(pool, user_id).await
}

pub async fn list_users(
    pool: &DbPool,
    search: &str,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<User>, i64)> {
    let pattern = format!("%{}%", search);

    let total = sqlx::query(
        "SELECT COUNT(*) as count FROM users WHERE username LIKE ? OR email LIKE ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_one(pool.as_ref())
    .await?
    .get::<i64, _>("count");

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE username LIKE ? OR email LIKE ?
         ORDER BY id DESC LIMIT ? OFFSET ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool.as_ref())
    .await?;

    Ok((users, total))
}

pub async fn count_users(pool: &DbPool) -> AppResult<i64> {
    let count = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool.as_ref())
        .await?
        .get::<i64, _>("count");
    Ok(count)
}

/// Creates the configured admin account unless the email is already registered.
pub async fn ensure_admin(pool: &DbPool, email: &str, password: &str) -> AppResult<()> {
    let email = email.trim().to_lowercase();

    if find_by_email(pool, &email).await?.is_some() {
        tracing::info!("Admin account already exists");
        return Ok(());
    }

    let digest = hash_password(password)?;
    let username = email.split('@').next().unwrap_or("admin").to_string();
    let id = create_user_with_role(pool, &email, &username, &digest, Role::Admin).await?;

    tracing::info!("Admin account created: id={}, email={}", id, email);
    Ok(())
}
