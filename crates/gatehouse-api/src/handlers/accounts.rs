//! Account and session API handlers
//!
//! Register, obtain a token pair, refresh, blacklist a refresh token on
//! logout, and fetch the authenticated account.
//!
//! Author: hephaex@gmail.com

use crate::audit::ClientContext;
use crate::auth::{
    AuthenticatedUser, LoginRequest, LogoutRequest, RefreshRequest, RefreshResponse,
    RegistrationRequest, TokenPair,
};
use crate::error::{AppError, ErrorBody};
use crate::extract::FormOrJson;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use gatehouse_core::Account;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Public view of an account; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            username: account.username,
            first_name: account.first_name,
            last_name: account.last_name,
            is_active: account.is_active,
            is_staff: account.is_staff,
            date_joined: account.date_joined,
        }
    }
}

/// Register a new account
///
/// New accounts are active and non-staff.
#[utoipa::path(
    post,
    path = "/accounts/register/",
    tag = "accounts",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Field errors", body = crate::auth::FieldErrors),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<RegistrationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientContext::from_headers(&headers);

    let account = state.sessions.register(request, &client).await?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// Obtain an access/refresh token pair
#[utoipa::path(
    post,
    path = "/accounts/token/",
    tag = "accounts",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing fields", body = crate::auth::FieldErrors),
        (status = 401, description = "No active account found with the given credentials", body = ErrorBody),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let client = ClientContext::from_headers(&headers);

    let pair = state.sessions.login(request, &client).await?;

    Ok(Json(pair))
}

/// Exchange a refresh token for a new access token
///
/// With rotation enabled the response also carries a new refresh token.
#[utoipa::path(
    post,
    path = "/accounts/token/refresh/",
    tag = "accounts",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 400, description = "Missing fields", body = crate::auth::FieldErrors),
        (status = 401, description = "Token invalid, expired, blacklisted or of the wrong type", body = ErrorBody),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let client = ClientContext::from_headers(&headers);

    let response = state.sessions.refresh(request, &client).await?;

    Ok(Json(response))
}

/// Blacklist a refresh token
///
/// Answers 205 with no body on success, including for an already
/// blacklisted token, and 400 with no body for anything unusable.
#[utoipa::path(
    post,
    path = "/accounts/logout/blacklist/",
    tag = "accounts",
    request_body = LogoutRequest,
    responses(
        (status = 205, description = "Refresh token blacklisted"),
        (status = 400, description = "Token missing or invalid"),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<FormOrJson<LogoutRequest>, AppError>,
) -> Result<StatusCode, AppError> {
    let client = ClientContext::from_headers(&headers);

    let request = match payload {
        Ok(FormOrJson(request)) => request,
        Err(rejection) => {
            state.sessions.reject_logout(rejection.to_string(), &client);
            return Err(AppError::LogoutRejected);
        }
    };

    state
        .sessions
        .logout(request.refresh_token.as_deref(), &client)
        .await?;

    Ok(StatusCode::RESET_CONTENT)
}

/// Get the authenticated account
#[utoipa::path(
    get,
    path = "/accounts/user/",
    tag = "accounts",
    responses(
        (status = 200, description = "Current account", body = AccountResponse),
        (status = 401, description = "Missing, invalid or expired access token", body = ErrorBody),
        (status = 404, description = "Account no longer exists", body = ErrorBody),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn current_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state.sessions.current_user(user.user_id).await?;

    Ok(Json(account.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::NewAccount;

    #[test]
    fn test_account_response_has_no_password_fields() {
        let account = NewAccount::new("ann@example.com", "ann", "$argon2id$secret").into_account();
        let json = serde_json::to_value(AccountResponse::from(account)).unwrap();

        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 8);
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("password_hash"));
        assert!(!json.to_string().contains("argon2id"));
    }
}
