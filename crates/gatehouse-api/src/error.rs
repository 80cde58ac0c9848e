//! API error handling
//!
//! Every handler returns `Result<_, AppError>`. Bodies follow the
//! `{"detail": ..., "code": ...}` shape, except validation errors which are a
//! bare field map and logout rejections which have no body at all.
//!
//! Author: hephaex@gmail.com

use crate::auth::credentials::CredentialError;
use crate::auth::jwt::{JwtError, TokenError};
use crate::auth::password::PasswordError;
use crate::auth::refresh::RefreshError;
use crate::auth::validation::{FieldErrors, DUPLICATE_EMAIL, DUPLICATE_USERNAME};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gatehouse_core::{StoreError, UniqueField};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";
pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message
    pub detail: String,
    /// Stable machine-readable code
    pub code: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            code: code.into(),
        }
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("No active account found with the given credentials")]
    Authentication,

    #[error("{0}")]
    Token(TokenError),

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("Authorization header must contain two space-delimited values")]
    BadAuthorizationHeader,

    #[error("User is inactive")]
    InactiveAccount,

    #[error("Not found.")]
    NotFound,

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("logout rejected")]
    LogoutRejected,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedBody(_) | AppError::LogoutRejected => {
                StatusCode::BAD_REQUEST
            }
            AppError::Authentication
            | AppError::Token(_)
            | AppError::NotAuthenticated
            | AppError::BadAuthorizationHeader
            | AppError::InactiveAccount => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => return (status, Json(errors)).into_response(),
            AppError::LogoutRejected => return status.into_response(),
            AppError::MalformedBody(reason) => {
                ErrorBody::new(format!("Malformed request body: {reason}"), "parse_error")
            }
            AppError::Authentication => ErrorBody::new(NO_ACTIVE_ACCOUNT, "no_active_account"),
            AppError::Token(kind) => ErrorBody::new(kind.to_string(), "token_not_valid"),
            AppError::NotAuthenticated => ErrorBody::new(NOT_AUTHENTICATED, "not_authenticated"),
            AppError::BadAuthorizationHeader => ErrorBody::new(
                "Authorization header must contain two space-delimited values",
                "bad_authorization_header",
            ),
            AppError::InactiveAccount => ErrorBody::new("User is inactive", "user_inactive"),
            AppError::NotFound => ErrorBody::new("Not found.", "not_found"),
            AppError::Internal(msg) | AppError::Database(msg) => {
                tracing::error!(error = %msg, "Request failed");
                ErrorBody::new("A server error occurred.", "error")
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<TokenError> for AppError {
    fn from(kind: TokenError) -> Self {
        AppError::Token(kind)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(UniqueField::Email) => {
                AppError::Validation(FieldErrors::single("email", DUPLICATE_EMAIL))
            }
            StoreError::Duplicate(UniqueField::Username) => {
                AppError::Validation(FieldErrors::single("username", DUPLICATE_USERNAME))
            }
            StoreError::NotFound => AppError::NotFound,
            StoreError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidCredentials => AppError::Authentication,
            CredentialError::Store(e) => e.into(),
            CredentialError::Password(e) => e.into(),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Token(kind) => AppError::Token(kind),
            RefreshError::AccountUnavailable => AppError::Authentication,
            RefreshError::Store(e) => e.into(),
            RefreshError::Jwt(e) => e.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
