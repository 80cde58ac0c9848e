//! Gatehouse Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable holding the path of an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "GATEHOUSE_CONFIG";

const DEV_SIGNING_KEY: &str = "development-signing-key-change-in-production";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Account and revocation store
    pub database: DatabaseConfig,

    /// Token issuing and session policy
    pub auth: AuthConfig,

    /// Password hashing parameters
    pub password: PasswordConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError { path, message },
            other => other,
        })
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit path wins over `GATEHOUSE_CONFIG`; environment variables are
    /// applied on top of the file and the result is validated.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let config = match path {
            Some(path) => Self::from_file(path)?.with_env_override()?,
            None => Self::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an arbitrary key lookup (the process environment in production)
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", &port)?;
        }
        // CORS origins from environment variable (comma-separated)
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Store
        if let Some(backend) = lookup("STORE_BACKEND") {
            self.database.backend = backend.parse()?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(size) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", &size)?;
        }

        // Tokens
        if let Some(key) = lookup("JWT_SECRET") {
            self.auth.signing_key = key;
        }
        if let Some(issuer) = lookup("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }
        if let Some(secs) = lookup("JWT_ACCESS_LIFETIME_SECS") {
            self.auth.access_token_lifetime_secs = parse_value("JWT_ACCESS_LIFETIME_SECS", &secs)?;
        }
        if let Some(secs) = lookup("JWT_REFRESH_LIFETIME_SECS") {
            self.auth.refresh_token_lifetime_secs =
                parse_value("JWT_REFRESH_LIFETIME_SECS", &secs)?;
        }
        if let Some(flag) = lookup("JWT_ROTATE_REFRESH_TOKENS") {
            self.auth.rotate_refresh_tokens = parse_flag("JWT_ROTATE_REFRESH_TOKENS", &flag)?;
        }
        if let Some(flag) = lookup("JWT_BLACKLIST_AFTER_ROTATION") {
            self.auth.blacklist_after_rotation = parse_flag("JWT_BLACKLIST_AFTER_ROTATION", &flag)?;
        }
        if let Some(secs) = lookup("BLACKLIST_PRUNE_INTERVAL_SECS") {
            self.auth.blacklist_prune_interval_secs =
                parse_value("BLACKLIST_PRUNE_INTERVAL_SECS", &secs)?;
        }
        if let Some(flag) = lookup("PASSWORD_COMPLEXITY") {
            self.auth.password_complexity = parse_flag("PASSWORD_COMPLEXITY", &flag)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(flag) = lookup("LOG_JSON") {
            self.logging.json_format = parse_flag("LOG_JSON", &flag)?;
        }

        Ok(self)
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.signing_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.signing_key".to_string()));
        }
        if self.auth.access_token_lifetime_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "auth.access_token_lifetime_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.auth.refresh_token_lifetime_secs <= self.auth.access_token_lifetime_secs {
            return Err(ConfigError::InvalidValue {
                key: "auth.refresh_token_lifetime_secs".to_string(),
                value: self.auth.refresh_token_lifetime_secs.to_string(),
            });
        }
        if self.auth.blacklist_prune_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "auth.blacklist_prune_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingRequired("database.url".to_string()));
        }

        Ok(())
    }

    /// Copy of this configuration with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.auth.signing_key = "<redacted>".to_string();
        if copy.database.url.is_some() {
            copy.database.url = Some("<redacted>".to_string());
        }
        copy
    }

    /// True when the built-in development key is still in use
    pub fn uses_development_key(&self) -> bool {
        self.auth.signing_key == DEV_SIGNING_KEY
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, lost on restart
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(ConfigError::InvalidValue {
                key: "STORE_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Account store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: None,
            max_connections: 10,
        }
    }
}

/// Token and session policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing key
    pub signing_key: String,

    /// `iss` claim written into and required from every token
    pub issuer: String,

    /// Access token lifetime in seconds
    pub access_token_lifetime_secs: u64,

    /// Refresh token lifetime in seconds
    pub refresh_token_lifetime_secs: u64,

    /// Issue a new refresh token on every refresh
    pub rotate_refresh_tokens: bool,

    /// Revoke the presented refresh token when a rotated one is issued
    pub blacklist_after_rotation: bool,

    /// Interval between sweeps of expired revocation entries
    pub blacklist_prune_interval_secs: u64,

    /// Accepted `Authorization` header schemes
    pub header_types: Vec<String>,

    /// Require upper/lower/digit/symbol in new passwords
    pub password_complexity: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: DEV_SIGNING_KEY.to_string(),
            issuer: "gatehouse".to_string(),
            access_token_lifetime_secs: 300,      // 5 minutes
            refresh_token_lifetime_secs: 86_400, // 1 day
            rotate_refresh_tokens: false,
            blacklist_after_rotation: true,
            blacklist_prune_interval_secs: 3600,
            header_types: vec!["Bearer".to_string(), "JWT".to_string()],
            password_complexity: false,
        }
    }
}

/// Argon2id cost parameters
///
/// Increasing memory or iterations improves resistance to offline guessing
/// but slows down every login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
