use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::middleware::auth::AuthUser;
use crate::models::chat::{ChatMessage, ChatMessageView, ChatRoom};
use crate::services::{chat, credentials};
use crate::utils::error::{AppError, AppResult};

fn parse_room(room: &str) -> AppResult<ChatRoom> {
    ChatRoom::parse(room).ok_or_else(|| AppError::NotFound(format!("Unknown chat room: {}", room)))
}

async fn resolve_username(state: &AppState, username: &str) -> AppResult<i64> {
    credentials::find_by_username(&state.db, username)
        .await?
        .map(|u| u.id)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
}

#[derive(Deserialize)]
struct HistoryQuery {
    with: Option<String>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(room): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ChatMessageView>>> {
    let messages = match parse_room(&room)? {
        ChatRoom::Global => chat::global_history(&state.db).await?,
        ChatRoom::Private => {
            let peer = match query.with.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(name) => Some(resolve_username(&state, name).await?),
            };
            chat::private_history(&state.db, user.id, peer).await?
        }
    };
    Ok(Json(messages))
}

#[derive(Deserialize)]
struct PostMessageRequest {
    content: String,
    /// Username of the recipient of a private message.
    receiver: Option<String>,
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(room): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> AppResult<Json<ChatMessage>> {
    let room = parse_room(&room)?;
    let receiver_id = match (room, req.receiver.as_deref()) {
        (ChatRoom::Private, Some(name)) => Some(resolve_username(&state, name).await?),
        _ => None,
    };

    let message = chat::post_message(&state.db, user.id, room, receiver_id, &req.content).await?;
    Ok(Json(message))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest {
    message_id: i64,
}

async fn report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ReportRequest>,
) -> AppResult<Json<serde_json::Value>> {
    chat::report_message(&state.db, &user, req.message_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat/:room", get(history).post(post_message))
        .route("/report", post(report))
        .with_state(state)
}
