use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::AppState;
use crate::middleware::auth::AuthUser;
use crate::models::purchase::Purchase;
use crate::models::user::{ProfileUpdate, Role, User};
use crate::models::vip::VipStatus;
use crate::services::{credentials, purchases, vip};
use crate::utils::error::AppResult;
use crate::utils::helpers::read_upload_form;
use crate::utils::validation::validate_about;

const AVATAR_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Serialize)]
struct ProfileResponse {
    id: i64,
    username: String,
    email: String,
    /// Role carried by the caller's token.
    role: Role,
    about: Option<String>,
    avatar: Option<String>,
}

fn profile_response(user: User, role: Role) -> ProfileResponse {
    ProfileResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        role,
        about: user.about,
        avatar: user.avatar,
    }
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ProfileResponse>> {
    let user = credentials::get_user(&state.db, auth.id).await?;
    Ok(Json(profile_response(user, auth.role)))
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    about: Option<String>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    if let Some(about) = &req.about {
        validate_about(about)?;
    }

    let user = credentials::update_profile(
        &state.db,
        auth.id,
        ProfileUpdate {
            about: req.about,
            avatar: None,
        },
    )
    .await?;
    Ok(Json(profile_response(user, auth.role)))
}

async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut form = read_upload_form(&state.uploads, multipart, &["avatar", "file"]).await?;
    let staged = form.require_file()?;
    let path = state.uploads.commit_avatar(&state.db, staged, auth.id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "avatar": format!("/{}", path),
    })))
}

async fn check_vip(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<VipStatus>> {
    Ok(Json(vip::check_vip(&state.db, auth.id).await?))
}

async fn my_purchases(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<Vec<Purchase>>> {
    Ok(Json(purchases::list_purchases(&state.db, auth.id).await?))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route(
            "/profile/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
        .route("/check-vip", get(check_vip))
        .route("/purchases", get(my_purchases))
        .with_state(state)
}
