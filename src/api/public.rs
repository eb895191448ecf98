use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::models::comment::Comment;
use crate::models::file::FileResponse;
use crate::services::file_storage::{self, FileFilter, get_visible_file, resolve_category};
use crate::services::{credentials, social};
use crate::utils::error::AppResult;

#[derive(Deserialize)]
struct ListFilesQuery {
    category: Option<String>,
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListFilesQuery>,
) -> AppResult<Json<Vec<FileResponse>>> {
    let category = match query.category.as_deref() {
        None | Some("") => None,
        raw => Some(resolve_category(raw)?),
    };

    let filter = FileFilter {
        category,
        ..FileFilter::default()
    };
    let files = file_storage::list_files(&state.db, &filter).await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<FileResponse>> {
    let file = get_visible_file(&state.db, file_id, None).await?;
    Ok(Json(FileResponse::from(file)))
}

async fn like_count(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let total = social::like_count(&state.db, file_id).await?;
    Ok(Json(serde_json::json!({ "total": total })))
}

async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<Vec<Comment>>> {
    get_visible_file(&state.db, file_id, None).await?;
    let comments = social::list_comments(&state.db, file_id).await?;
    Ok(Json(comments))
}

async fn stats(State(state): State<Arc<AppState>>) -> AppResult<Json<serde_json::Value>> {
    let users = credentials::count_users(&state.db).await?;
    let uploads = file_storage::count_files(&state.db).await?;
    Ok(Json(serde_json::json!({ "users": users, "uploads": uploads })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/files", get(list_files))
        .route("/files/:file_id", get(get_file))
        .route("/files/:file_id/likes", get(like_count))
        .route("/files/:file_id/comments", get(list_comments))
        .with_state(state)
}
