//! Session service layer
//!
//! Composes the credential verifier, token issuer, refresh handler and
//! revocation registry into the five session operations exposed over HTTP:
//! register, login, refresh, logout and current user. Every outcome is
//! audited.

use super::credentials::{CredentialError, CredentialVerifier};
use super::jwt::{Claims, JwtError, TokenIssuer, TokenKind, TokenPair};
use super::logout::decode_for_logout;
use super::password::{hash_password, PasswordError};
use super::refresh::{RefreshHandler, RotationPolicy};
use super::revocation::RevocationRegistry;
use super::validation::{LoginRequest, RefreshRequest, Registration, RegistrationRequest};
use crate::audit::{audit_log, AuditEvent, ClientContext};
use crate::error::AppError;
use gatehouse_core::{Account, AccountStore, AppConfig, NewAccount, PasswordConfig, Stores};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Refresh response; `refresh` is present only when rotation is enabled
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// Session service
pub struct SessionService {
    accounts: Arc<dyn AccountStore>,
    issuer: Arc<TokenIssuer>,
    credentials: CredentialVerifier,
    refresh: RefreshHandler,
    registry: RevocationRegistry,
    password: PasswordConfig,
    password_complexity: bool,
}

impl SessionService {
    /// Wire the service from opened stores and the loaded configuration
    pub fn new(stores: &Stores, config: &AppConfig) -> Result<Self, PasswordError> {
        let issuer = Arc::new(TokenIssuer::from_config(&config.auth));
        let registry = RevocationRegistry::new(stores.revocations.clone());
        let refresh = RefreshHandler::new(
            issuer.clone(),
            registry.clone(),
            stores.accounts.clone(),
            RotationPolicy::from_config(&config.auth),
        );

        Ok(Self {
            accounts: stores.accounts.clone(),
            credentials: CredentialVerifier::new(stores.accounts.clone(), &config.password)?,
            issuer,
            refresh,
            registry,
            password: config.password.clone(),
            password_complexity: config.auth.password_complexity,
        })
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn registry(&self) -> &RevocationRegistry {
        &self.registry
    }

    /// Validate and create an account
    pub async fn register(
        &self,
        request: RegistrationRequest,
        client: &ClientContext,
    ) -> Result<Account, AppError> {
        let email = request.email.clone();

        let result = match request.validate(self.password_complexity) {
            Ok(registration) => self.create_account(registration, false).await,
            Err(errors) => Err(AppError::Validation(errors)),
        };

        match &result {
            Ok(account) => audit_log(&AuditEvent::RegistrationSuccess {
                user_id: account.id,
                email: account.email.clone(),
                username: account.username.clone(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            }),
            Err(AppError::Validation(errors)) => audit_log(&AuditEvent::RegistrationFailure {
                email,
                fields: errors.fields().map(str::to_string).collect(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            }),
            Err(_) => {}
        }

        result
    }

    /// Hash the password and insert; duplicates surface as field errors
    pub async fn create_account(
        &self,
        registration: Registration,
        is_staff: bool,
    ) -> Result<Account, AppError> {
        let password_hash = hash_password(&registration.password, &self.password)?;

        let account = NewAccount::new(&registration.email, registration.username, password_hash)
            .with_names(registration.first_name, registration.last_name)
            .staff(is_staff);

        Ok(self.accounts.insert(account).await?)
    }

    /// Exchange email + password for a token pair
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientContext,
    ) -> Result<TokenPair, AppError> {
        let (email, password) = request.validate()?;

        let account = match self.credentials.verify(&email, &password).await {
            Ok(account) => account,
            Err(err) => {
                if let CredentialError::InvalidCredentials = err {
                    audit_log(&AuditEvent::LoginFailure {
                        email,
                        reason: err.to_string(),
                        ip_address: client.ip_address.clone(),
                        user_agent: client.user_agent.clone(),
                    });
                }
                return Err(err.into());
            }
        };

        let pair = self.issuer.issue_pair(account.id)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: account.id,
            email: account.email,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        Ok(pair)
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        client: &ClientContext,
    ) -> Result<RefreshResponse, AppError> {
        let token = request.validate()?;

        match self.refresh.refresh(&token).await {
            Ok(outcome) => {
                audit_log(&AuditEvent::TokenRefresh {
                    user_id: outcome.user_id,
                    rotated: outcome.refresh.is_some(),
                    ip_address: client.ip_address.clone(),
                    user_agent: client.user_agent.clone(),
                });
                Ok(RefreshResponse {
                    access: outcome.access,
                    refresh: outcome.refresh,
                })
            }
            Err(err) => {
                audit_log(&AuditEvent::RefreshRejected {
                    reason: err.to_string(),
                    ip_address: client.ip_address.clone(),
                    user_agent: client.user_agent.clone(),
                });
                Err(err.into())
            }
        }
    }

    /// Blacklist a refresh token
    ///
    /// Every decoding or store problem becomes [`AppError::LogoutRejected`].
    /// Logging out twice with the same token succeeds.
    pub async fn logout(&self, token: Option<&str>, client: &ClientContext) -> Result<(), AppError> {
        let target = match decode_for_logout(&self.issuer, token) {
            Ok(target) => target,
            Err(rejection) => {
                self.reject_logout(rejection.to_string(), client);
                return Err(AppError::LogoutRejected);
            }
        };

        let newly_revoked = match self.registry.revoke(&target.claims).await {
            Ok(newly_revoked) => newly_revoked,
            Err(e) => {
                tracing::error!(error = %e, "Failed to blacklist refresh token");
                self.reject_logout(e.to_string(), client);
                return Err(AppError::LogoutRejected);
            }
        };

        audit_log(&AuditEvent::Logout {
            user_id: target.claims.user_id,
            newly_revoked,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        Ok(())
    }

    /// Record a logout that never reached token decoding
    pub fn reject_logout(&self, reason: String, client: &ClientContext) {
        audit_log(&AuditEvent::LogoutRejected {
            reason,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });
    }

    /// Verify an access token presented in an Authorization header
    pub fn authenticate(&self, token: &str) -> Result<Claims, JwtError> {
        self.issuer.decode_as(token, TokenKind::Access)
    }

    /// Account behind an authenticated request
    pub async fn current_user(&self, user_id: Uuid) -> Result<Account, AppError> {
        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !account.is_active {
            return Err(AppError::InactiveAccount);
        }

        Ok(account)
    }
}
