//! Account domain model
//!
//! An [`Account`] is the durable identity a user logs in with. Accounts are
//! keyed by a UUID and are additionally unique by (normalised) email and by
//! username.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of `username`, `first_name` and `last_name`
pub const NAME_MAX_LEN: usize = 150;

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,

    /// Normalised email address (see [`normalize_email`])
    pub email: String,

    pub username: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    /// Argon2id PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Inactive accounts cannot log in or refresh
    pub is_active: bool,

    /// Staff accounts may administer other accounts
    pub is_staff: bool,

    pub date_joined: DateTime<Utc>,
}

impl Account {
    /// Human-readable label built from username and whichever name parts are set
    pub fn display_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();

        match (first.is_empty(), last.is_empty()) {
            (true, true) => self.username.clone(),
            (true, false) => format!("{} | {}", self.username, last),
            (false, true) => format!("{} | {}", self.username, first),
            (false, false) => format!("{} | {} {}", self.username, first, last),
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Account about to be inserted; the store assigns nothing, callers pick the id
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl NewAccount {
    /// Active, non-staff account joined now. `email` is normalised here.
    pub fn new(email: &str, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: password_hash.into(),
            is_active: true,
            is_staff: false,
            date_joined: Utc::now(),
        }
    }

    pub fn with_names(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn staff(mut self, is_staff: bool) -> Self {
        self.is_staff = is_staff;
        self
    }

    pub fn into_account(self) -> Account {
        Account {
            id: self.id,
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
            is_active: self.is_active,
            is_staff: self.is_staff,
            date_joined: self.date_joined,
        }
    }
}

/// Canonical form used for storage and lookup: trimmed and lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
