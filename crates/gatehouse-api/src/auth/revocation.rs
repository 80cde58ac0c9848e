//! Refresh token blacklist
//!
//! Thin layer over [`RevocationStore`] that speaks in terms of decoded
//! [`Claims`] and owns the periodic pruning task.

use super::jwt::Claims;
use crate::audit::{audit_log, AuditEvent};
use chrono::{DateTime, Utc};
use gatehouse_core::{RevocationStore, RevokedToken, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct RevocationRegistry {
    store: Arc<dyn RevocationStore>,
}

impl RevocationRegistry {
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self { store }
    }

    /// Blacklist the token described by `claims`
    ///
    /// Returns `false` when the `jti` was already present; the registry is
    /// unchanged in that case.
    pub async fn revoke(&self, claims: &Claims) -> StoreResult<bool> {
        self.store
            .revoke(RevokedToken::new(
                claims.jti.clone(),
                Some(claims.user_id),
                claims.expires_at(),
            ))
            .await
    }

    pub async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        self.store.is_revoked(jti).await
    }

    /// Drop entries for tokens that have expired on their own
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.store.prune_expired(now).await
    }

    /// Run [`Self::prune_expired`] every `every` until the handle is aborted
    pub fn spawn_pruner(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.prune_expired(Utc::now()).await {
                    Ok(removed) => audit_log(&AuditEvent::RevocationPruned { removed }),
                    Err(e) => tracing::warn!(error = %e, "Revocation prune failed"),
                }
            }
        })
    }
}
