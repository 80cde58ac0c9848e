//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::auth_middleware;
use crate::handlers::{accounts, health};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Session routes under `/accounts/`
pub fn account_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/accounts/register/", post(accounts::register_handler))
        .route("/accounts/token/", post(accounts::login_handler))
        .route("/accounts/token/refresh/", post(accounts::refresh_handler))
        .route("/accounts/logout/blacklist/", post(accounts::logout_handler));

    // Protected routes (access token required)
    let protected_routes = Router::new()
        .route("/accounts/user/", get(accounts::current_user_handler))
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Liveness and readiness probes
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
}
