//! Logout token decoding
//!
//! The logout endpoint answers every unusable token with the same bare 400,
//! so decoding yields an explicit [`LogoutRejection`] whose reason is only
//! ever logged.

use super::jwt::{Claims, JwtError, TokenIssuer, TokenKind};
use thiserror::Error;

/// A refresh token that may be blacklisted
#[derive(Debug, Clone)]
pub struct LogoutTarget {
    pub claims: Claims,
}

#[derive(Debug, Error)]
pub enum LogoutRejection {
    #[error("request body missing or unreadable")]
    MalformedBody,

    #[error("refresh_token missing")]
    MissingToken,

    #[error("token rejected: {0}")]
    InvalidToken(#[from] JwtError),
}

/// Verify `token` as a refresh token signed by `issuer`
pub fn decode_for_logout(
    issuer: &TokenIssuer,
    token: Option<&str>,
) -> Result<LogoutTarget, LogoutRejection> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(LogoutRejection::MissingToken)?;

    let claims = issuer.decode_as(token, TokenKind::Refresh)?;
    Ok(LogoutTarget { claims })
}
