//! JWT token generation and validation
//!
//! Access and refresh tokens are HS256 JWTs sharing one claim layout and told
//! apart by the `token_type` claim. Nothing is persisted at issue time; the
//! only server-side token state is the revocation registry.
//!
//! Author: hephaex@gmail.com

use gatehouse_core::AuthConfig;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Which half of a token pair a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims carried by both access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// "access" or "refresh"
    pub token_type: TokenKind,
    /// Owning account
    pub user_id: Uuid,
    /// Unique token identifier, the revocation key
    pub jti: String,
    /// Issued at (Unix epoch seconds)
    pub iat: u64,
    /// Expiration (Unix epoch seconds)
    pub exp: u64,
    /// Token issuer
    pub iss: String,
}

impl Claims {
    /// Expiry as a UTC timestamp, for revocation records
    pub fn expires_at(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp(self.exp as i64, 0).unwrap_or_default()
    }
}

/// Low-level JWT errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token issuer mismatch")]
    InvalidIssuer,

    #[error("Expected {expected} token, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Token failures a client is told about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token is invalid or expired")]
    InvalidOrExpired,

    #[error("Token has wrong type")]
    WrongType,

    #[error("Token is blacklisted")]
    Revoked,
}

impl From<&JwtError> for TokenError {
    fn from(err: &JwtError) -> Self {
        match err {
            JwtError::WrongType { .. } => TokenError::WrongType,
            _ => TokenError::InvalidOrExpired,
        }
    }
}

/// Access and refresh token returned by login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Mints and verifies tokens with one signing key
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_lifetime_secs: u64,
    refresh_lifetime_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("access_lifetime_secs", &self.access_lifetime_secs)
            .field("refresh_lifetime_secs", &self.refresh_lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        access_lifetime_secs: u64,
        refresh_lifetime_secs: u64,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            access_lifetime_secs,
            refresh_lifetime_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.signing_key,
            config.issuer.clone(),
            config.access_token_lifetime_secs,
            config.refresh_token_lifetime_secs,
        )
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a fresh access + refresh pair for `user_id`
    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenKind::Access)?,
            refresh: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Issue a single token of the given kind
    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let lifetime = match kind {
            TokenKind::Access => self.access_lifetime_secs,
            TokenKind::Refresh => self.refresh_lifetime_secs,
        };

        let claims = Claims {
            token_type: kind,
            user_id,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now,
            exp: now + lifetime,
            iss: self.issuer.clone(),
        };

        self.sign(&claims)
    }

    /// Encode arbitrary claims with this issuer's key
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding_key,
        )?)
    }

    /// Verify signature, issuer and expiry; return the claims
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
                _ => JwtError::InvalidToken,
            }
        })?;

        Ok(token_data.claims)
    }

    /// Decode and require a particular `token_type`
    pub fn decode_as(&self, token: &str, kind: TokenKind) -> Result<Claims, JwtError> {
        let claims = self.decode(token)?;
        if claims.token_type != kind {
            return Err(JwtError::WrongType {
                expected: kind.as_str(),
                actual: claims.token_type.as_str(),
            });
        }
        Ok(claims)
    }
}
