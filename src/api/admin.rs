use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::middleware::auth::AuthUser;
use crate::models::payment::{CaptureRequest, Payment};
use crate::models::site::{ContactMessage, MascotMessage};
use crate::models::user::{Role, UserResponse};
use crate::services::{chat, credentials, file_storage, purchases, site};
use crate::utils::error::{AppError, AppResult};
use crate::utils::permissions::{RoleSet, require_role};

#[derive(Deserialize)]
struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
    q: Option<String>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<serde_json::Value>> {
    require_role(&admin, RoleSet::ADMIN_ONLY)?;

    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);
    let search = params.q.unwrap_or_default();

    let (users, total) = credentials::list_users(&state.db, &search, limit, offset).await?;
    let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

    Ok(Json(serde_json::json!({
        "users": users,
        "total": total
    })))
}

async fn set_ban(state: &AppState, admin: &AuthUser, user_id: i64, banned: bool) -> AppResult<()> {
    require_role(admin, RoleSet::ADMIN_ONLY)?;

    if banned && user_id == admin.id {
        return Err(AppError::BadRequest("Cannot ban yourself".to_string()));
    }

    credentials::set_banned(&state.db, user_id, banned).await?;
    tracing::info!(
        "User {} {} by admin {}",
        user_id,
        if banned { "banned" } else { "unbanned" },
        admin.username
    );
    Ok(())
}

async fn ban_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    set_ban(&state, &admin, user_id, true).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn unban_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    set_ban(&state, &admin, user_id, false).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: String,
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<SetRoleRequest>,
) -> AppResult<Json<serde_json::Value>> {
    require_role(&admin, RoleSet::ADMIN_ONLY)?;

    let role = Role::parse(&req.role)
        .ok_or_else(|| AppError::Validation(format!("Unknown role: {}", req.role)))?;
    credentials::set_role(&state.db, user_id, role).await?;

    Ok(Json(serde_json::json!({"success": true, "role": role})))
}

async fn set_file_blocked(
    state: &AppState,
    moderator: &AuthUser,
    file_id: i64,
    blocked: bool,
) -> AppResult<()> {
    require_role(moderator, RoleSet::DEVELOPER_OR_ADMIN)?;
    file_storage::set_blocked(&state.db, file_id, blocked).await
}

async fn block_file(
    State(state): State<Arc<AppState>>,
    Extension(moderator): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    set_file_blocked(&state, &moderator, file_id, true).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn unblock_file(
    State(state): State<Arc<AppState>>,
    Extension(moderator): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    set_file_blocked(&state, &moderator, file_id, false).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn record_payment(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<CaptureRequest>,
) -> AppResult<Json<Payment>> {
    require_role(&admin, RoleSet::ADMIN_ONLY)?;
    Ok(Json(purchases::record_capture(&state.db, req).await?))
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    require_role(&admin, RoleSet::ADMIN_ONLY)?;
    let reports = chat::list_reports(&state.db).await?;
    Ok(Json(serde_json::json!({ "reports": reports })))
}

async fn list_contacts(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
) -> AppResult<Json<Vec<ContactMessage>>> {
    require_role(&admin, RoleSet::ADMIN_ONLY)?;
    Ok(Json(site::list_contacts(&state.db).await?))
}

#[derive(Deserialize)]
struct MascotMessageRequest {
    content: String,
}

async fn set_mascot_message(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(kind): Path<String>,
    Json(req): Json<MascotMessageRequest>,
) -> AppResult<Json<MascotMessage>> {
    require_role(&admin, RoleSet::ADMIN_ONLY)?;
    Ok(Json(site::set_mascot_message(&state.db, &kind, &req.content).await?))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id/ban", post(ban_user))
        .route("/users/:user_id/unban", post(unban_user))
        .route("/users/:user_id/role", post(set_role))
        .route("/files/:file_id/block", post(block_file))
        .route("/files/:file_id/unblock", post(unblock_file))
        .route("/payments", post(record_payment))
        .route("/reports", get(list_reports))
        .route("/contacts", get(list_contacts))
        .route("/messages/:kind", put(set_mascot_message))
        .with_state(state)
}
