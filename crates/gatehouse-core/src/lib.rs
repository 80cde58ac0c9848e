//! Gatehouse Core - Account model, stores and configuration
//!
//! This crate defines the pieces shared by the HTTP service and the admin CLI:
//! - Account records and email normalisation
//! - Store traits for accounts and revoked refresh tokens
//! - In-memory and PostgreSQL store backends
//! - Configuration management

pub mod account;
pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;

pub use account::{normalize_email, Account, NewAccount, NAME_MAX_LEN};
pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordConfig,
    ServerConfig, StoreBackend,
};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{
    prune_cutoff, AccountStore, RevocationStore, RevokedToken, StoreError, StoreResult, Stores,
    UniqueField, EXPIRY_GRACE_SECS,
};

use std::sync::Arc;

/// Open the configured backend and hand back both stores
///
/// The PostgreSQL backend creates its tables on first use.
pub async fn open_stores(config: &DatabaseConfig) -> StoreResult<Stores> {
    match config.backend {
        StoreBackend::Memory => Ok(Stores::in_memory()),
        StoreBackend::Postgres => {
            let url = config.url.as_deref().ok_or_else(|| {
                StoreError::Database("database.url is required for the postgres backend".into())
            })?;
            let store = PgStore::connect(url, config.max_connections).await?;
            store.ensure_schema().await?;

            let store = Arc::new(store);
            tracing::info!(backend = "postgres", "Store opened");
            Ok(Stores {
                accounts: store.clone(),
                revocations: store,
            })
        }
    }
}

impl Stores {
    /// Fresh process-local stores sharing one [`MemoryStore`]
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            accounts: store.clone(),
            revocations: store,
        }
    }
}
