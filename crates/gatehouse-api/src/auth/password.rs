/// Password hashing and verification using Argon2id
///
/// Hashes are PHC strings carrying algorithm, parameters and salt, so
/// verification never needs the configuration that produced them. Cost
/// parameters come from `gatehouse_core::PasswordConfig`.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use gatehouse_core::PasswordConfig;
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

fn to_params(config: &PasswordConfig) -> Result<Params, PasswordError> {
    Params::new(
        config.memory_cost,
        config.time_cost,
        config.parallelism,
        Some(32),
    )
    .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Hash a plaintext password using Argon2id with a random salt
///
/// # Example
///
/// ```no_run
/// use gatehouse_api::auth::password::hash_password;
/// use gatehouse_core::PasswordConfig;
///
/// let hash = hash_password("SecureP@ssw0rd!", &PasswordConfig::default()).unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str, config: &PasswordConfig) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = to_params(config)?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// * `Ok(true)` - Password matches
/// * `Ok(false)` - Password does not match
/// * `Err(PasswordError)` - The stored hash is unusable
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// Optional complexity rule applied at registration when
/// `auth.password_complexity` is enabled
///
/// Requires an uppercase letter, a lowercase letter, a digit and a
/// non-alphanumeric character. Length is checked separately.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter.".to_string());
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter.".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit.".to_string());
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err("Password must contain at least one special character.".to_string());
    }

    Ok(())
}
