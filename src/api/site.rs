use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::AppState;
use crate::models::site::{MascotMessage, Sticker};
use crate::services::{site, stickers};
use crate::utils::error::AppResult;

async fn list_stickers(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Sticker>>> {
    Ok(Json(stickers::list_stickers(&state.uploads).await?))
}

async fn get_sticker(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let (handle, content_type) = stickers::open_sticker(&state.uploads, &file_name).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        Body::from_stream(ReaderStream::new(handle)),
    ))
}

#[derive(Deserialize)]
struct MessagesQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn mascot_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<Vec<MascotMessage>>> {
    let kind = query.kind.as_deref().filter(|k| !k.trim().is_empty());
    Ok(Json(site::mascot_messages(&state.db, kind).await?))
}

#[derive(Deserialize)]
struct ContactRequest {
    email: String,
    message: String,
}

async fn contact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let stored = site::submit_contact(&state.db, &req.email, &req.message).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "id": stored.id,
    })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stickers", get(list_stickers))
        .route("/stickers/:file_name", get(get_sticker))
        .route("/messages", get(mascot_messages))
        .route("/contact", post(contact))
        .with_state(state)
}
