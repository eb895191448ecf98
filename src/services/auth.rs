use serde::{Deserialize, Serialize};

use crate::database::DbPool;
use crate::models::user::{Role, UserResponse};
use crate::services::{credentials, vip};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::error::{AppError, AppResult};
use crate::utils::jwt::JwtService;
use crate::utils::validation::{validate_email, validate_password, validate_username};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub user: UserResponse,
}

pub async fn register_user(pool: &DbPool, request: RegisterRequest) -> AppResult<RegisterResponse> {
    let email = validate_email(&request.email)?;
    let username = request.username.trim();
    validate_username(username)?;
    validate_password(&request.password)?;

    let digest = hash_password(&request.password)?;
    let id = credentials::create_user(pool, &email, username, &digest).await?;

    tracing::info!("User registered: id={}, username={}", id, username);

    Ok(RegisterResponse { success: true, id })
}

pub async fn login_user(
    pool: &DbPool,
    request: LoginRequest,
    jwt_service: &JwtService,
) -> AppResult<LoginResponse> {
    let email = request.email.trim().to_lowercase();

    let user = credentials::find_by_email(pool, &email)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid email or password".to_string()))?;

    if !verify_password(&request.password, &user.password_hash)? {
        tracing::debug!("Failed login for user {}", user.id);
        return Err(AppError::Auth("Invalid email or password".to_string()));
    }

    if user.is_banned() {
        return Err(AppError::Banned);
    }

    let vip_active = vip::check_vip(pool, user.id).await?.vip;
    let role = vip::effective_role(user.stored_role(), vip_active);
    let token = jwt_service.generate_token(&user, role)?;

    tracing::info!("User {} logged in as {}", user.username, role);

    Ok(LoginResponse {
        token,
        role,
        user: UserResponse::from(user),
    })
}
