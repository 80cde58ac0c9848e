//! In-process store backend
//!
//! Holds accounts and revocations behind `tokio::sync::RwLock`s. Uniqueness
//! checks and the insert happen under the same write guard, so two concurrent
//! registrations of one email cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::account::{Account, NewAccount};
use crate::store::{
    AccountStore, RevocationStore, RevokedToken, StoreError, StoreResult, UniqueField,
};

#[derive(Default)]
struct AccountTable {
    rows: HashMap<Uuid, Account>,
    by_email: HashMap<String, Uuid>,
    by_username: HashMap<String, Uuid>,
}

/// Memory-backed account and revocation store
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<AccountTable>,
    revoked: RwLock<HashMap<String, RevokedToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revocation entries currently held
    pub async fn revoked_len(&self) -> usize {
        self.revoked.read().await.len()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> StoreResult<Account>
    where
        F: FnOnce(&mut Account),
    {
        let mut table = self.accounts.write().await;
        let account = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        apply(account);
        Ok(account.clone())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert(&self, account: NewAccount) -> StoreResult<Account> {
        let mut table = self.accounts.write().await;

        if table.by_email.contains_key(&account.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if table.by_username.contains_key(&account.username) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }

        let account = account.into_account();
        table.by_email.insert(account.email.clone(), account.id);
        table.by_username.insert(account.username.clone(), account.id);
        table.rows.insert(account.id, account.clone());

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let table = self.accounts.read().await;
        Ok(table
            .by_email
            .get(email)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.rows.get(&id).cloned())
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> StoreResult<Account> {
        self.update(id, |account| account.is_active = is_active).await
    }

    async fn set_staff(&self, id: Uuid, is_staff: bool) -> StoreResult<Account> {
        self.update(id, |account| account.is_staff = is_staff).await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl RevocationStore for MemoryStore {
    async fn revoke(&self, entry: RevokedToken) -> StoreResult<bool> {
        let mut revoked = self.revoked.write().await;
        if revoked.contains_key(&entry.jti) {
            return Ok(false);
        }
        revoked.insert(entry.jti.clone(), entry);
        Ok(true)
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        Ok(self.revoked.read().await.contains_key(jti))
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        revoked.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - revoked.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryStore::new();
        let created = store
            .insert(NewAccount::new("Ann@Example.com", "ann", "hash"))
            .await
            .unwrap();

        let by_email = store.find_by_email("ann@example.com").await.unwrap();
        assert_eq!(by_email.as_ref().map(|a| a.id), Some(created.id));

        let by_id = store.find_by_id(created.id).await.unwrap();
        assert_eq!(by_id.unwrap().username, "ann");

        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username() {
        let store = MemoryStore::new();
        store
            .insert(NewAccount::new("ann@example.com", "ann", "hash"))
            .await
            .unwrap();

        let err = store
            .insert(NewAccount::new("ANN@example.com", "other", "hash"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));

        let err = store
            .insert(NewAccount::new("other@example.com", "ann", "hash"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Username)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_single_winner() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(NewAccount::new("race@example.com", format!("racer{i}"), "hash"))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_flags_update() {
        let store = MemoryStore::new();
        let created = store
            .insert(NewAccount::new("ann@example.com", "ann", "hash"))
            .await
            .unwrap();

        let updated = store.set_active(created.id, false).await.unwrap();
        assert!(!updated.is_active);
        let updated = store.set_staff(created.id, true).await.unwrap();
        assert!(updated.is_staff);

        assert!(matches!(
            store.set_active(Uuid::new_v4(), true).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryStore::new();
        let exp = Utc::now() + Duration::hours(1);

        assert!(store.revoke(RevokedToken::new("jti-1", None, exp)).await.unwrap());
        assert!(!store.revoke(RevokedToken::new("jti-1", None, exp)).await.unwrap());
        assert!(store.is_revoked("jti-1").await.unwrap());
        assert!(!store.is_revoked("jti-2").await.unwrap());
        assert_eq!(store.revoked_len().await, 1);
    }

    #[tokio::test]
    async fn test_prune_only_removes_expired() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .revoke(RevokedToken::new("old", None, now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .revoke(RevokedToken::new("live", None, now + Duration::minutes(1)))
            .await
            .unwrap();

        assert_eq!(store.prune_expired(now).await.unwrap(), 1);
        assert!(!store.is_revoked("old").await.unwrap());
        assert!(store.is_revoked("live").await.unwrap());
    }
}
