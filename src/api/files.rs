use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::AppState;
use crate::middleware::auth::AuthUser;
use crate::models::file::FileResponse;
use crate::services::file_storage::{FileFilter, UploadMeta, get_visible_file, list_files};
use crate::services::{purchases, social};
use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::{attachment_disposition, parse_price_field, read_upload_form};

/// Multipart overhead allowed on top of the per-file limit.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut form = read_upload_form(&state.uploads, multipart, &["file"]).await?;
    let staged = form.require_file()?;

    let meta = UploadMeta {
        category: form.field("category").map(str::to_string),
        price: parse_price_field(form.field("price"))?,
    };

    let file = state.uploads.commit(&state.db, staged, meta, user.id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "path": format!("/{}", file.path),
        "file": FileResponse::from(file),
    })))
}

async fn my_files(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<FileResponse>>> {
    let filter = FileFilter {
        owner_id: Some(user.id),
        include_blocked: true,
        ..FileFilter::default()
    };
    let files = list_files(&state.db, &filter).await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let file = get_visible_file(&state.db, file_id, Some(&user)).await?;

    if !purchases::is_entitled(&state.db, &user, &file).await? {
        return Err(AppError::PaymentRequired(format!(
            "File {} must be purchased before download",
            file_id
        )));
    }

    let handle = state.uploads.open(&file).await?;
    tracing::info!("File {} downloaded by user {}", file_id, user.id);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&file.name)),
        ],
        Body::from_stream(ReaderStream::new(handle)),
    ))
}

async fn remove_file(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    state.uploads.delete_file(&state.db, file_id, &user).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn purchase(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let outcome = purchases::record_purchase(&state.db, user.id, file_id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "outcome": outcome,
    })))
}

async fn entitlement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let file = get_visible_file(&state.db, file_id, Some(&user)).await?;
    let owned = purchases::is_entitled(&state.db, &user, &file).await?;
    Ok(Json(serde_json::json!({ "owned": owned })))
}

async fn toggle_like(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    get_visible_file(&state.db, file_id, Some(&user)).await?;
    let liked = social::toggle_like(&state.db, file_id, user.id).await?;
    Ok(Json(serde_json::json!({ "success": true, "liked": liked })))
}

async fn liked(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(file_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let liked = social::has_liked(&state.db, file_id, user.id).await?;
    Ok(Json(serde_json::json!({ "liked": liked })))
}

#[derive(Deserialize)]
struct CommentRequest {
    content: String,
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(file_id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Json<serde_json::Value>> {
    get_visible_file(&state.db, file_id, Some(&user)).await?;
    let comment = social::add_comment(&state.db, file_id, &user, &req.content).await?;
    Ok(Json(serde_json::json!({ "success": true, "comment": comment })))
}

async fn remove_comment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    social::delete_comment(&state.db, comment_id, &user).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.uploads.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/upload-file",
            post(upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/my-files", get(my_files))
        .route("/files/:file_id", delete(remove_file))
        .route("/files/:file_id/download", get(download))
        .route("/files/:file_id/purchase", post(purchase))
        .route("/files/:file_id/entitlement", get(entitlement))
        .route("/files/:file_id/like", post(toggle_like))
        .route("/files/:file_id/liked", get(liked))
        .route("/files/:file_id/comments", post(add_comment))
        .route("/comments/:comment_id", delete(remove_comment))
        .with_state(state)
}
