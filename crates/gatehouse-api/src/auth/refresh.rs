//! Refresh token exchange
//!
//! Steps, in order: verify the token as a refresh JWT, reject blacklisted
//! `jti`s, require the owning account to still be active, then mint a new
//! access token. With rotation enabled a new refresh token is minted too and,
//! when blacklisting after rotation, the presented one is consumed.

use super::jwt::{Claims, JwtError, TokenError, TokenIssuer, TokenKind};
use super::revocation::RevocationRegistry;
use gatehouse_core::{AccountStore, AuthConfig, StoreError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub rotate_refresh_tokens: bool,
    pub blacklist_after_rotation: bool,
}

impl RotationPolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            rotate_refresh_tokens: config.rotate_refresh_tokens,
            blacklist_after_rotation: config.blacklist_after_rotation,
        }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            rotate_refresh_tokens: false,
            blacklist_after_rotation: true,
        }
    }
}

/// Tokens handed back from a successful refresh
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub user_id: Uuid,
    pub access: String,
    /// Present only when rotation is enabled
    pub refresh: Option<String>,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("{0}")]
    Token(TokenError),

    /// Account removed or deactivated since the token was issued
    #[error("No active account found for token")]
    AccountUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Jwt(JwtError),
}

pub struct RefreshHandler {
    issuer: Arc<TokenIssuer>,
    registry: RevocationRegistry,
    accounts: Arc<dyn AccountStore>,
    policy: RotationPolicy,
}

impl RefreshHandler {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        registry: RevocationRegistry,
        accounts: Arc<dyn AccountStore>,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            issuer,
            registry,
            accounts,
            policy,
        }
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    pub async fn refresh(&self, token: &str) -> Result<RefreshOutcome, RefreshError> {
        let claims = self
            .issuer
            .decode_as(token, TokenKind::Refresh)
            .map_err(|e| RefreshError::Token(TokenError::from(&e)))?;

        if self.registry.is_revoked(&claims.jti).await? {
            return Err(RefreshError::Token(TokenError::Revoked));
        }

        match self.accounts.find_by_id(claims.user_id).await? {
            Some(account) if account.is_active => {}
            _ => return Err(RefreshError::AccountUnavailable),
        }

        let refresh = if self.policy.rotate_refresh_tokens {
            if self.policy.blacklist_after_rotation {
                self.consume(&claims).await?;
            }
            Some(self.mint(claims.user_id, TokenKind::Refresh)?)
        } else {
            None
        };

        Ok(RefreshOutcome {
            user_id: claims.user_id,
            access: self.mint(claims.user_id, TokenKind::Access)?,
            refresh,
        })
    }

    /// Revoke the presented token; losing a race to another use is `Revoked`
    async fn consume(&self, claims: &Claims) -> Result<(), RefreshError> {
        if self.registry.revoke(claims).await? {
            Ok(())
        } else {
            Err(RefreshError::Token(TokenError::Revoked))
        }
    }

    fn mint(&self, user_id: Uuid, kind: TokenKind) -> Result<String, RefreshError> {
        self.issuer.issue(user_id, kind).map_err(RefreshError::Jwt)
    }
}
