//! Store traits for accounts and revoked refresh tokens
//!
//! Both traits are object safe so the server can hold `Arc<dyn ...>` and pick
//! a backend at startup. Uniqueness of email/username and atomicity of
//! revocation are the backend's responsibility, never the caller's.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::account::{Account, NewAccount};

/// Column that violated a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl UniqueField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::Email => "email",
            UniqueField::Username => "username",
        }
    }
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate value for {}", .0.as_str())]
    Duplicate(UniqueField),

    #[error("Account not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Seconds a revocation entry outlives its token.
///
/// JWT validation accepts a token throughout the second named by its `exp`
/// claim, so the entry must survive that whole second.
pub const EXPIRY_GRACE_SECS: i64 = 1;

/// Entries expiring strictly before this instant are safe to drop
pub fn prune_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::seconds(EXPIRY_GRACE_SECS)
}

/// Revoked refresh token entry
///
/// `expires_at` is the token's own expiry; once it is more than
/// [`EXPIRY_GRACE_SECS`] in the past the entry is redundant because the token
/// is rejected on expiry anyway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevokedToken {
    pub jti: String,
    pub user_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: DateTime<Utc>,
}

impl RevokedToken {
    pub fn new(jti: impl Into<String>, user_id: Option<Uuid>, expires_at: DateTime<Utc>) -> Self {
        Self {
            jti: jti.into(),
            user_id,
            expires_at,
            revoked_at: Utc::now(),
        }
    }

    /// True once the token can no longer pass validation on its own
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < prune_cutoff(now)
    }
}

/// Durable account records
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account, failing with [`StoreError::Duplicate`] when the
    /// email or username is taken
    async fn insert(&self, account: NewAccount) -> StoreResult<Account>;

    /// Look up by already-normalised email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    async fn set_active(&self, id: Uuid, is_active: bool) -> StoreResult<Account>;

    async fn set_staff(&self, id: Uuid, is_staff: bool) -> StoreResult<Account>;

    /// Cheap round-trip used by readiness probes
    async fn ping(&self) -> StoreResult<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Persisted set of revoked refresh-token identifiers
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record a revocation. Returns `true` if this call added the entry and
    /// `false` if the `jti` was already revoked.
    async fn revoke(&self, entry: RevokedToken) -> StoreResult<bool>;

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool>;

    /// Delete entries whose token expired more than [`EXPIRY_GRACE_SECS`]
    /// before `now`
    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Both stores, as opened for one backend
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub revocations: Arc<dyn RevocationStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("backend", &self.accounts.name())
            .finish()
    }
}
