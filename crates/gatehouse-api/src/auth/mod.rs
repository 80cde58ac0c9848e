//! Authentication and session lifecycle
//!
//! - Token generation and validation (HS256 JWT access/refresh pairs)
//! - Password hashing with Argon2id
//! - Credential verification
//! - Refresh token exchange with optional rotation
//! - Refresh token blacklist
//! - Request schemas and validation
//! - Middleware for request authentication
//! - Session service composing the above

pub mod credentials;
pub mod jwt;
pub mod logout;
pub mod middleware;
pub mod password;
pub mod refresh;
pub mod revocation;
pub mod service;
pub mod validation;

pub use credentials::{CredentialError, CredentialVerifier};
pub use jwt::{Claims, JwtError, TokenError, TokenIssuer, TokenKind, TokenPair};
pub use logout::{decode_for_logout, LogoutRejection, LogoutTarget};
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordError};
pub use refresh::{RefreshError, RefreshHandler, RefreshOutcome, RotationPolicy};
pub use revocation::RevocationRegistry;
pub use service::{RefreshResponse, SessionService};
pub use validation::{
    FieldErrors, LoginRequest, LogoutRequest, RefreshRequest, Registration, RegistrationRequest,
};
