//! PostgreSQL store backend
//!
//! Provides account and revocation persistence using SQLx and PostgreSQL.
//! Uniqueness is enforced by `UNIQUE` constraints; revocation writes rely on
//! `ON CONFLICT DO NOTHING` on the `jti` primary key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::account::{Account, NewAccount};
use crate::store::{
    prune_cutoff, AccountStore, RevocationStore, RevokedToken, StoreError, StoreResult,
    UniqueField,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        username VARCHAR(150) NOT NULL,
        first_name VARCHAR(150) NOT NULL DEFAULT '',
        last_name VARCHAR(150) NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        is_staff BOOLEAN NOT NULL DEFAULT FALSE,
        date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT accounts_email_key UNIQUE (email),
        CONSTRAINT accounts_username_key UNIQUE (username)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS revoked_tokens (
        jti TEXT PRIMARY KEY,
        user_id UUID NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        revoked_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS revoked_tokens_expires_at_idx ON revoked_tokens (expires_at)",
];

const ACCOUNT_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, is_active, is_staff, date_joined";

/// PostgreSQL account and revocation store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to apply schema: {e}")))?;
        }
        tracing::debug!("account schema ready");
        Ok(())
    }
}

/// Account row from database
#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    is_active: bool,
    is_staff: bool,
    date_joined: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            is_active: row.is_active,
            is_staff: row.is_staff,
            date_joined: row.date_joined,
        }
    }
}

/// Translate a unique violation into the field it concerns
fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("accounts_username_key") => StoreError::Duplicate(UniqueField::Username),
                _ => StoreError::Duplicate(UniqueField::Email),
            };
        }
    }
    StoreError::Database(format!("Failed to create account: {err}"))
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert(&self, account: NewAccount) -> StoreResult<Account> {
        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (
                id, email, username, first_name, last_name,
                password_hash, is_active, is_staff, date_joined
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password_hash)
        .bind(account.is_active)
        .bind(account.is_staff)
        .bind(account.date_joined)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(row.into())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch account: {e}")))?;

        Ok(row.map(Account::from))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch account: {e}")))?;

        Ok(row.map(Account::from))
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> StoreResult<Account> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "UPDATE accounts SET is_active = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to update account: {e}")))?;

        row.map(Account::from).ok_or(StoreError::NotFound)
    }

    async fn set_staff(&self, id: Uuid, is_staff: bool) -> StoreResult<Account> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "UPDATE accounts SET is_staff = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(is_staff)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to update account: {e}")))?;

        row.map(Account::from).ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Ping failed: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

#[async_trait]
impl RevocationStore for PgStore {
    async fn revoke(&self, entry: RevokedToken) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, user_id, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(&entry.jti)
        .bind(entry.user_id)
        .bind(entry.expires_at)
        .bind(entry.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to revoke token: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT jti FROM revoked_tokens WHERE jti = $1")
                .bind(jti)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to check revocation: {e}")))?;

        Ok(found.is_some())
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(prune_cutoff(now))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to prune revocations: {e}")))?;

        Ok(result.rows_affected())
    }
}
