use anyhow::Context;
use axum::{Router, http::HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::config::Config;
use crate::database;
use crate::services::credentials;
use crate::services::file_storage::UploadStore;
use crate::utils::jwt::JwtService;

/// Connects the database, seeds the admin account and prepares the upload
/// directory. No background tasks are started.
pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db = database::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connected and migrations applied");

    if let Some(admin) = &config.admin {
        credentials::ensure_admin(&db, &admin.email, &admin.password)
            .await
            .context("Failed to seed admin account")?;
    }

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload directory {:?}", config.upload_dir))?;

    let jwt_service = Arc::new(JwtService::new(
        &config.secret_key,
        chrono::Duration::hours(config.token_ttl_hours),
    ));
    let uploads = UploadStore::new(config.upload_dir.clone(), config.max_upload_bytes);

    Ok(Arc::new(AppState {
        db,
        jwt_service,
        uploads,
    }))
}

pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = match config.allowed_origin.as_str() {
        "*" => CorsLayer::new().allow_origin(Any),
        origin => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new().allow_origin(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid ALLOWED_ORIGIN {:?}", origin);
                CorsLayer::new()
            }
        },
    }
    .allow_methods(Any)
    .allow_headers(Any);

    crate::api::routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn build_app(config: &Config) -> anyhow::Result<Router> {
    let state = build_state(config).await?;

    crate::tasks::reconcile::start_reconcile_task(
        state.db.clone(),
        state.uploads.clone(),
        Duration::from_secs(config.reconcile_interval_secs.max(1)),
    );
    tracing::info!("Upload reconciliation task started");

    Ok(build_router(state, config))
}
