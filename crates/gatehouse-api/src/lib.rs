//! Gatehouse API - account registration and JWT session server
//!
//! Provides HTTP endpoints for registering accounts, obtaining and refreshing
//! JWT token pairs, blacklisting refresh tokens on logout and fetching the
//! authenticated account.

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI document for the service
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::accounts::register_handler,
        handlers::accounts::login_handler,
        handlers::accounts::refresh_handler,
        handlers::accounts::logout_handler,
        handlers::accounts::current_user_handler,
        handlers::health::health_check,
        handlers::health::readiness_check,
    ),
    components(schemas(
        handlers::accounts::AccountResponse,
        auth::RegistrationRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::LogoutRequest,
        auth::TokenPair,
        auth::RefreshResponse,
        auth::FieldErrors,
        error::ErrorBody,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "accounts", description = "Registration and JWT sessions"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// CORS policy from configured origins; no origins means no cross-origin access
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::account_routes(state.clone()))
        .merge(routes::health_routes())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Configuration used by tests: in-memory store and cheap Argon2 parameters
#[cfg(any(test, feature = "test-utils"))]
pub fn test_config() -> gatehouse_core::AppConfig {
    let mut config = gatehouse_core::AppConfig::default();
    config.password = gatehouse_core::PasswordConfig {
        memory_cost: 8192,
        time_cost: 1,
        parallelism: 1,
    };
    config
}

/// Router and state over fresh in-memory stores
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_app(config: gatehouse_core::AppConfig) -> (Router, Arc<AppState>) {
    let stores = gatehouse_core::Stores::in_memory();
    let state = match AppState::new(config, stores) {
        Ok(state) => Arc::new(state),
        Err(e) => panic!("test state construction failed: {e}"),
    };
    (create_router(state.clone()), state)
}

/// Router over fresh in-memory stores with [`test_config`]
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_test_app(test_config()).0
}
