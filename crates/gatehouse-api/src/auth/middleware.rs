/// Authentication middleware for protecting routes
///
/// Reads `Authorization: <scheme> <token>`, where the scheme is one of the
/// configured header types ("Bearer" and "JWT" by default), validates the
/// access token and adds [`AuthenticatedUser`] to request extensions.
use crate::audit::{audit_log, AuditEvent, ClientContext};
use crate::auth::jwt::{Claims, TokenError};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Identity extracted from a valid access token
///
/// Extract in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    /// Access token id
    pub jti: String,
    /// Access token expiry (Unix epoch seconds)
    pub expires_at: u64,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            jti: claims.jti,
            expires_at: claims.exp,
        }
    }
}

/// Split an Authorization header value into its token, if the scheme is accepted
///
/// `Ok(None)` means the header is not ours to judge (unknown scheme), which the
/// caller treats as no credentials at all.
pub fn parse_authorization<'a>(
    value: &'a str,
    header_types: &[String],
) -> Result<Option<&'a str>, AppError> {
    let mut parts = value.split_whitespace();
    let Some(scheme) = parts.next() else {
        return Ok(None);
    };

    if !header_types.iter().any(|t| t == scheme) {
        return Ok(None);
    }

    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(Some(token)),
        _ => Err(AppError::BadAuthorizationHeader),
    }
}

/// Authentication middleware that requires a valid access token
///
/// ```ignore
/// let protected = Router::new()
///     .route("/accounts/user/", get(current_user))
///     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AppError::BadAuthorizationHeader)?,
        None => return Err(AppError::NotAuthenticated),
    };

    let token = parse_authorization(header_value, &state.config.auth.header_types)?
        .ok_or(AppError::NotAuthenticated)?;

    let claims = match state.sessions.authenticate(token) {
        Ok(claims) => claims,
        Err(e) => {
            let client = ClientContext::from_headers(request.headers());
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            });
            return Err(AppError::Token(TokenError::from(&e)));
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));

    Ok(next.run(request).await)
}
