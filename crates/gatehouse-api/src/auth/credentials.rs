//! Email + password verification
//!
//! Unknown email, inactive account and wrong password all fail with the same
//! [`CredentialError::InvalidCredentials`]. An unknown email still costs one
//! Argon2 verification against a throwaway hash.

use super::password::{hash_password, verify_password, PasswordError};
use gatehouse_core::{normalize_email, Account, AccountStore, PasswordConfig, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

pub struct CredentialVerifier {
    accounts: Arc<dyn AccountStore>,
    dummy_hash: String,
}

impl CredentialVerifier {
    /// Build a verifier; hashes the timing dummy with the live cost parameters
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        password: &PasswordConfig,
    ) -> Result<Self, PasswordError> {
        let dummy_hash = hash_password("gatehouse-timing-equaliser", password)?;
        Ok(Self {
            accounts,
            dummy_hash,
        })
    }

    pub async fn verify(&self, email: &str, password: &str) -> Result<Account, CredentialError> {
        let account = self.accounts.find_by_email(&normalize_email(email)).await?;

        let Some(account) = account else {
            // timing only; outcome discarded
            let _ = verify_password(password, &self.dummy_hash);
            return Err(CredentialError::InvalidCredentials);
        };

        if !verify_password(password, &account.password_hash)? {
            return Err(CredentialError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(CredentialError::InvalidCredentials);
        }

        Ok(account)
    }
}
