//! API Integration Tests
//!
//! Every test drives the full router against fresh in-memory stores.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use gatehouse_api::auth::{Claims, TokenKind};
use gatehouse_api::{create_router_for_testing, create_test_app, test_config};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use uuid::Uuid;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Helper to create an HTML form request
fn create_form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authorized_get(uri: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap()
}

/// Send a request and return status plus raw body bytes
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, email: &str, username: &str, password: &str) -> (StatusCode, Value) {
    send_json(
        app,
        create_json_request(
            "POST",
            "/accounts/register/",
            Some(json!({"email": email, "username": username, "password": password})),
        ),
    )
    .await
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send_json(
        app,
        create_json_request(
            "POST",
            "/accounts/token/",
            Some(json!({"email": email, "password": password})),
        ),
    )
    .await
}

async fn refresh(app: &Router, token: &str) -> (StatusCode, Value) {
    send_json(
        app,
        create_json_request(
            "POST",
            "/accounts/token/refresh/",
            Some(json!({"refresh": token})),
        ),
    )
    .await
}

async fn logout(app: &Router, body: Value) -> (StatusCode, Vec<u8>) {
    send(
        app,
        create_json_request("POST", "/accounts/logout/blacklist/", Some(body)),
    )
    .await
}

/// Register and log in, returning (access, refresh)
async fn session(app: &Router, email: &str, username: &str) -> (String, String) {
    let (status, _) = register(app, email, username, "long enough").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, tokens) = login(app, email, "long enough").await;
    assert_eq!(status, StatusCode::OK);
    (
        tokens["access"].as_str().unwrap().to_string(),
        tokens["refresh"].as_str().unwrap().to_string(),
    )
}

fn is_jwt_shaped(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|part| {
            part.chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["store"], "memory");
}

#[tokio::test]
async fn test_readiness_fails_when_draining() {
    let (app, state) = create_test_app(test_config());
    state.set_ready(false);

    let (status, _) = send_json(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/accounts/token/"].is_object());
}

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_success_hides_password() {
    let app = create_router_for_testing();

    let (status, json) = register(&app, "Ann@Example.com", "ann", "long enough").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["email"], "ann@example.com");
    assert_eq!(json["username"], "ann");
    assert_eq!(json["is_active"], true);
    assert_eq!(json["is_staff"], false);
    assert!(json.get("password").is_none());
    assert!(json.get("password_hash").is_none());
    assert!(!json.to_string().contains("long enough"));
    assert!(Uuid::parse_str(json["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_register_missing_fields() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        create_json_request("POST", "/accounts/register/", Some(json!({}))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["email", "username", "password"] {
        assert_eq!(json[field], json!(["This field is required."]));
    }
}

#[tokio::test]
async fn test_register_invalid_values() {
    let app = create_router_for_testing();

    let (status, json) = register(&app, "not-an-email", "bad name", "short").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["email"], json!(["Enter a valid email address."]));
    assert_eq!(
        json["password"],
        json!(["Ensure this field has at least 8 characters."])
    );
    assert!(json["username"][0]
        .as_str()
        .unwrap()
        .starts_with("Enter a valid username."));
}

#[tokio::test]
async fn test_register_duplicates() {
    let app = create_router_for_testing();
    register(&app, "ann@example.com", "ann", "long enough").await;

    let (status, json) = register(&app, "ANN@example.com", "ann2", "long enough").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["email"],
        json!(["user with this email address already exists."])
    );

    let (status, json) = register(&app, "other@example.com", "ann", "long enough").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["username"],
        json!(["A user with that username already exists."])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_single_winner() {
    let (app, state) = create_test_app(test_config());

    let (a, b) = tokio::join!(
        register(&app, "race@example.com", "racer_a", "long enough"),
        register(&app, "race@example.com", "racer_b", "long enough"),
    );

    let statuses = [a.0, b.0];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        1
    );
    let loser = if a.0 == StatusCode::CREATED { b.1 } else { a.1 };
    assert_eq!(
        loser["email"],
        json!(["user with this email address already exists."])
    );

    let stored = state
        .stores
        .accounts
        .find_by_email("race@example.com")
        .await
        .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_register_malformed_json() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .method("POST")
        .uri("/accounts/register/")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "parse_error");
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_returns_jwt_pair() {
    let app = create_router_for_testing();
    let (access, refresh) = session(&app, "ann@example.com", "ann").await;

    assert!(is_jwt_shaped(&access));
    assert!(is_jwt_shaped(&refresh));
    assert_ne!(access, refresh);
}

#[tokio::test]
async fn test_login_failures_identical() {
    let app = create_router_for_testing();
    register(&app, "ann@example.com", "ann", "long enough").await;

    let (status_pw, wrong_password) = login(&app, "ann@example.com", "wrong password").await;
    let (status_email, wrong_email) = login(&app, "nobody@example.com", "long enough").await;

    assert_eq!(status_pw, StatusCode::UNAUTHORIZED);
    assert_eq!(status_email, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, wrong_email);
    assert_eq!(
        wrong_password,
        json!({
            "detail": "No active account found with the given credentials",
            "code": "no_active_account"
        })
    );
}

#[tokio::test]
async fn test_login_inactive_account() {
    let (app, state) = create_test_app(test_config());
    let (_, json) = register(&app, "ann@example.com", "ann", "long enough").await;
    let id = Uuid::parse_str(json["id"].as_str().unwrap()).unwrap();
    state.stores.accounts.set_active(id, false).await.unwrap();

    let (status, json) = login(&app, "ann@example.com", "long enough").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "no_active_account");
}

#[tokio::test]
async fn test_login_missing_password() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        create_json_request(
            "POST",
            "/accounts/token/",
            Some(json!({"email": "ann@example.com"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"password": ["This field is required."]}));
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_issues_access_token() {
    let app = create_router_for_testing();
    let (_, refresh_token) = session(&app, "ann@example.com", "ann").await;

    let (status, json) = refresh(&app, &refresh_token).await;

    assert_eq!(status, StatusCode::OK);
    assert!(is_jwt_shaped(json["access"].as_str().unwrap()));
    assert!(json.get("refresh").is_none());
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = create_router_for_testing();
    let (access, _) = session(&app, "ann@example.com", "ann").await;

    let (status, json) = refresh(&app, &access).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "token_not_valid");
    assert_eq!(json["detail"], "Token has wrong type");
}

#[tokio::test]
async fn test_refresh_rejects_garbage() {
    let app = create_router_for_testing();

    let (status, json) = refresh(&app, "abc.def.ghi").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["detail"], "Token is invalid or expired");
}

#[tokio::test]
async fn test_refresh_with_rotation_is_single_use() {
    let mut config = test_config();
    config.auth.rotate_refresh_tokens = true;
    config.auth.blacklist_after_rotation = true;
    let (app, _) = create_test_app(config);
    let (_, original) = session(&app, "ann@example.com", "ann").await;

    let (status, json) = refresh(&app, &original).await;
    assert_eq!(status, StatusCode::OK);
    let rotated = json["refresh"].as_str().unwrap().to_string();

    let (status, json) = refresh(&app, &original).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["detail"], "Token is blacklisted");

    let (status, _) = refresh(&app, &rotated).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Logout Tests
// =============================================================================

#[tokio::test]
async fn test_logout_blacklists_refresh_token() {
    let app = create_router_for_testing();
    let (_, refresh_token) = session(&app, "ann@example.com", "ann").await;

    let (status, body) = logout(&app, json!({"refresh_token": refresh_token})).await;
    assert_eq!(status, StatusCode::RESET_CONTENT);
    assert!(body.is_empty());

    let (status, json) = refresh(&app, &refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json,
        json!({"detail": "Token is blacklisted", "code": "token_not_valid"})
    );
}

#[tokio::test]
async fn test_logout_twice_is_idempotent() {
    let app = create_router_for_testing();
    let (_, refresh_token) = session(&app, "ann@example.com", "ann").await;

    let (first, _) = logout(&app, json!({"refresh_token": refresh_token})).await;
    let (second, body) = logout(&app, json!({"refresh_token": refresh_token})).await;

    assert_eq!(first, StatusCode::RESET_CONTENT);
    assert_eq!(second, StatusCode::RESET_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_logout_rejections_are_bare_400() {
    let app = create_router_for_testing();
    let (access, _) = session(&app, "ann@example.com", "ann").await;

    for body in [
        json!({}),
        json!({"refresh_token": ""}),
        json!({"refresh_token": "garbage"}),
        json!({"refresh_token": access}),
        json!({"refresh_token": 42}),
    ] {
        let (status, bytes) = logout(&app, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(bytes.is_empty(), "body: {body}");
    }

    let request = Request::builder()
        .method("POST")
        .uri("/accounts/logout/blacklist/")
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(bytes.is_empty());
}

// =============================================================================
// Form Encoded Body Tests
// =============================================================================

#[tokio::test]
async fn test_form_encoded_session_flow() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        create_form_request(
            "/accounts/register/",
            "email=ann%40example.com&username=ann&password=long+enough",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["email"], "ann@example.com");

    let (status, tokens) = send_json(
        &app,
        create_form_request(
            "/accounts/token/",
            "email=ann%40example.com&password=long+enough",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh_token = tokens["refresh"].as_str().unwrap().to_string();

    let (status, json) = send_json(
        &app,
        create_form_request(
            "/accounts/token/refresh/",
            &format!("refresh={refresh_token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(is_jwt_shaped(json["access"].as_str().unwrap()));

    let (status, body) = send(
        &app,
        create_form_request(
            "/accounts/logout/blacklist/",
            &format!("refresh_token={refresh_token}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::RESET_CONTENT);
    assert!(body.is_empty());

    let (status, json) = refresh(&app, &refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["detail"], "Token is blacklisted");
}

#[tokio::test]
async fn test_form_encoded_missing_fields() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        create_form_request("/accounts/token/", "email=ann%40example.com"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"password": ["This field is required."]}));
}

#[tokio::test]
async fn test_form_encoded_logout_without_token() {
    let app = create_router_for_testing();

    let (status, body) = send(&app, create_form_request("/accounts/logout/blacklist/", "")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_empty());
}

// =============================================================================
// Current User Tests
// =============================================================================

#[tokio::test]
async fn test_current_user_returns_token_owner() {
    let app = create_router_for_testing();
    let (ann_access, _) = session(&app, "ann@example.com", "ann").await;
    let (bob_access, _) = session(&app, "bob@example.com", "bob").await;

    let (status, json) = send_json(
        &app,
        authorized_get("/accounts/user/", &format!("Bearer {ann_access}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["email"], "ann@example.com");
    assert!(json.get("password_hash").is_none());

    let (status, json) = send_json(
        &app,
        authorized_get("/accounts/user/", &format!("JWT {bob_access}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "bob");
}

#[tokio::test]
async fn test_current_user_requires_credentials() {
    let app = create_router_for_testing();

    let (status, json) = send_json(
        &app,
        Request::builder()
            .uri("/accounts/user/")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json,
        json!({
            "detail": "Authentication credentials were not provided.",
            "code": "not_authenticated"
        })
    );
}

#[tokio::test]
async fn test_current_user_rejects_refresh_and_garbage_tokens() {
    let app = create_router_for_testing();
    let (_, refresh_token) = session(&app, "ann@example.com", "ann").await;

    for token in [refresh_token.as_str(), "abc.def.ghi"] {
        let (status, json) = send_json(
            &app,
            authorized_get("/accounts/user/", &format!("Bearer {token}")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "token_not_valid");
        assert!(json.get("email").is_none());
    }
}

#[tokio::test]
async fn test_current_user_rejects_expired_token() {
    let (app, state) = create_test_app(test_config());
    let (_, json) = register(&app, "ann@example.com", "ann", "long enough").await;
    let user_id = Uuid::parse_str(json["id"].as_str().unwrap()).unwrap();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let expired = state
        .sessions
        .issuer()
        .sign(&Claims {
            token_type: TokenKind::Access,
            user_id,
            jti: Uuid::new_v4().to_string(),
            iat: now - 600,
            exp: now - 300,
            iss: state.sessions.issuer().issuer().to_string(),
        })
        .unwrap();

    let (status, json) = send_json(
        &app,
        authorized_get("/accounts/user/", &format!("Bearer {expired}")),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["detail"], "Token is invalid or expired");
}

#[tokio::test]
async fn test_current_user_inactive_and_missing() {
    let (app, state) = create_test_app(test_config());
    let (access, _) = session(&app, "ann@example.com", "ann").await;
    let ann = state
        .stores
        .accounts
        .find_by_email("ann@example.com")
        .await
        .unwrap()
        .unwrap();

    state.stores.accounts.set_active(ann.id, false).await.unwrap();
    let (status, json) = send_json(
        &app,
        authorized_get("/accounts/user/", &format!("Bearer {access}")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "user_inactive");

    let ghost = state
        .sessions
        .issuer()
        .issue(Uuid::new_v4(), TokenKind::Access)
        .unwrap();
    let (status, json) = send_json(
        &app,
        authorized_get("/accounts/user/", &format!("Bearer {ghost}")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn test_current_user_bad_authorization_header() {
    let app = create_router_for_testing();

    let (status, json) = send_json(&app, authorized_get("/accounts/user/", "Bearer")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "bad_authorization_header");

    let (status, json) = send_json(&app, authorized_get("/accounts/user/", "Basic abc")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "not_authenticated");
}
