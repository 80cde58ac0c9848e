//! Security audit logging for session events
//!
//! Every login, registration, refresh and logout outcome is written as a
//! structured event under the `audit` tracing target so it can be routed
//! separately from application logs. Passwords, hashes and raw tokens never
//! appear in an event.
//!
//! # Example
//!
//! ```ignore
//! use gatehouse_api::audit::{audit_log, AuditEvent, ClientContext};
//!
//! let client = ClientContext::from_headers(request.headers());
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: account.id,
//!     email: account.email.clone(),
//!     ip_address: client.ip_address,
//!     user_agent: client.user_agent,
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Session audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// `reason` is internal only; the client sees the uniform 401
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationFailure {
        email: Option<String>,
        fields: Vec<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    TokenRefresh {
        user_id: Uuid,
        rotated: bool,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RefreshRejected {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// `newly_revoked` is false when the token was already blacklisted
    Logout {
        user_id: Uuid,
        newly_revoked: bool,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LogoutRejected {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Access token refused by the auth middleware
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RevocationPruned {
        removed: u64,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RefreshRejected { .. } => "Token refresh rejected",
            AuditEvent::Logout { .. } => "Refresh token blacklisted",
            AuditEvent::LogoutRejected { .. } => "Logout rejected",
            AuditEvent::InvalidToken { .. } => "Invalid access token",
            AuditEvent::RevocationPruned { .. } => "Expired revocations pruned",
        }
    }

    /// Failures are logged at WARN, everything else at INFO
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AuditEvent::LoginFailure { .. }
                | AuditEvent::RegistrationFailure { .. }
                | AuditEvent::RefreshRejected { .. }
                | AuditEvent::LogoutRejected { .. }
                | AuditEvent::InvalidToken { .. }
        )
    }

    fn user_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::TokenRefresh { user_id, .. }
            | AuditEvent::Logout { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}

/// Client details pulled from request headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event under the `audit` target
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    let user_id = event.user_id();

    if event.is_failure() {
        warn!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            user_id = ?user_id,
            "{}",
            event.summary()
        );
    } else {
        info!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            user_id = ?user_id,
            "{}",
            event.summary()
        );
    }
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = AuditEvent::Logout {
            user_id: Uuid::nil(),
            newly_revoked: true,
            ip_address: None,
            user_agent: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "logout");
        assert_eq!(json["newly_revoked"], true);
    }

    #[test]
    fn test_failure_classification() {
        assert!(AuditEvent::LogoutRejected {
            reason: "x".into(),
            ip_address: None,
            user_agent: None,
        }
        .is_failure());
        assert!(!AuditEvent::RevocationPruned { removed: 3 }.is_failure());
    }

    #[test]
    fn test_extract_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(extract_ip_address(&headers).as_deref(), Some("10.0.0.1"));

        headers.remove("x-forwarded-for");
        assert_eq!(extract_ip_address(&headers).as_deref(), Some("192.168.1.1"));
    }

    #[test]
    fn test_client_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        let client = ClientContext::from_headers(&headers);
        assert_eq!(client.user_agent.as_deref(), Some("curl/8.0"));
        assert!(client.ip_address.is_none());
    }
}
