pub mod admin;
pub mod auth;
pub mod chat;
pub mod files;
pub mod public;
pub mod site;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub use auth::AppState;

pub fn routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .merge(files::routes(state.clone()))
        .merge(users::routes(state.clone()))
        .merge(chat::routes(state.clone()))
        .nest("/admin", admin::routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(auth::routes(state.clone()))
        .merge(public::routes(state.clone()))
        .merge(site::routes(state))
        .merge(protected_routes)
}
