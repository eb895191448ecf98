use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::AppState;
use crate::models::user::Role;
use crate::services::credentials;
use crate::utils::error::AppError;

/// Identity attached to an authenticated request. The role comes from the
/// token claims; the ban flag is re-read from the database on every request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .ok_or_else(|| AppError::Auth("Missing or invalid authorization header".to_string()))?;

    let claims = state.jwt_service.verify_token(token)?;
    let user_id = claims.user_id()?;

    let user = credentials::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Auth("User no longer exists".to_string()))?;

    if user.is_banned() {
        tracing::debug!("Rejected request from banned user {}", user.username);
        return Err(AppError::Banned);
    }

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        username: claims.username,
        role: claims.role,
    });

    Ok(next.run(request).await)
}
