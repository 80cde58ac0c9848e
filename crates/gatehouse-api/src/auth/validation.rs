//! Request schemas and field-level validation
//!
//! Every failure is collected into a [`FieldErrors`] map keyed by field name
//! so clients receive all problems at once, as `{"field": ["message"]}`.

use super::password::validate_password_strength;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::Validate;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const PASSWORD_TOO_SHORT: &str = "Ensure this field has at least 8 characters.";
pub const TOO_LONG: &str = "Ensure this field has no more than 150 characters.";
pub const EMAIL_TOO_LONG: &str = "Ensure this field has no more than 254 characters.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const DUPLICATE_EMAIL: &str = "user with this email address already exists.";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";

/// Validation messages by field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with a single message
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names with at least one message
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Presence check shared by every request schema
fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value {
        None => {
            errors.add(field, REQUIRED);
            String::new()
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, BLANK);
            String::new()
        }
        Some(v) => v,
    }
}

/// Django-compatible username rule: word characters plus `@ . + - _`
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Registration request body
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct RegistrationRequest {
    #[schema(example = "ann@example.com")]
    pub email: Option<String>,
    #[schema(example = "ann")]
    pub username: Option<String>,
    #[schema(example = "correct horse battery")]
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Registration that passed validation
#[derive(Clone, Validate)]
pub struct Registration {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: String,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub username: String,

    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: String,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: String,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RegistrationRequest {
    /// Validate every field; `password_complexity` adds the character-class rule
    pub fn validate(self, password_complexity: bool) -> Result<Registration, FieldErrors> {
        let mut errors = FieldErrors::new();

        let registration = Registration {
            email: required(&mut errors, "email", self.email).trim().to_string(),
            username: required(&mut errors, "username", self.username),
            password: required(&mut errors, "password", self.password),
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
        };

        if let Err(schema_errors) = registration.validate() {
            for (field, field_errors) in schema_errors.field_errors() {
                let field: &str = field.as_ref();
                // presence errors already cover this field
                if errors.contains(field) {
                    continue;
                }
                for error in field_errors.iter() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    errors.add(field, message);
                }
            }
        }

        if !errors.contains("username") && !is_valid_username(&registration.username) {
            errors.add("username", INVALID_USERNAME);
        }

        if password_complexity && !errors.contains("password") {
            if let Err(message) = validate_password_strength(&registration.password) {
                errors.add("password", message);
            }
        }

        errors.into_result(registration)
    }
}

/// Login request body
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ann@example.com")]
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// `(email, password)` once both are present
    pub fn validate(self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = required(&mut errors, "email", self.email);
        let password = required(&mut errors, "password", self.password);
        errors.into_result((email, password))
    }
}

/// Refresh request body
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

impl RefreshRequest {
    pub fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let refresh = required(&mut errors, "refresh", self.refresh);
        errors.into_result(refresh)
    }
}

/// Logout request body; any problem with it is a flat 400
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, username: &str, password: &str) -> RegistrationRequest {
        RegistrationRequest {
            email: Some(email.to_string()),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_registration() {
        let reg = request(" ann@example.com ", "ann.lee+1", "long enough")
            .validate(false)
            .unwrap();
        assert_eq!(reg.email, "ann@example.com");
        assert_eq!(reg.username, "ann.lee+1");
        assert!(reg.first_name.is_empty());
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let errors = RegistrationRequest::default().validate(false).unwrap_err();
        assert_eq!(errors.get("email"), Some(&[REQUIRED.to_string()][..]));
        assert_eq!(errors.get("username"), Some(&[REQUIRED.to_string()][..]));
        assert_eq!(errors.get("password"), Some(&[REQUIRED.to_string()][..]));
    }

    #[test]
    fn test_blank_field() {
        let errors = request("  ", "ann", "long enough").validate(false).unwrap_err();
        assert_eq!(errors.get("email"), Some(&[BLANK.to_string()][..]));
        assert!(!errors.contains("username"));
    }

    #[test]
    fn test_bad_email_and_short_password() {
        let errors = request("not-an-email", "ann", "short").validate(false).unwrap_err();
        assert_eq!(errors.get("email"), Some(&[INVALID_EMAIL.to_string()][..]));
        assert_eq!(errors.get("password"), Some(&[PASSWORD_TOO_SHORT.to_string()][..]));
        assert!(!errors.contains("username"));
    }

    #[test]
    fn test_username_rules() {
        let errors = request("a@example.com", "has space", "long enough")
            .validate(false)
            .unwrap_err();
        assert_eq!(errors.get("username"), Some(&[INVALID_USERNAME.to_string()][..]));

        let long = "a".repeat(151);
        let errors = request("a@example.com", &long, "long enough")
            .validate(false)
            .unwrap_err();
        assert_eq!(errors.get("username"), Some(&[TOO_LONG.to_string()][..]));

        assert!(request("a@example.com", &"a".repeat(150), "long enough")
            .validate(false)
            .is_ok());
    }

    #[test]
    fn test_email_length_cap() {
        let label = "b".repeat(60);
        let domain = format!("{label}.{label}.{label}.{label}.com");
        let long = format!("{}@{domain}", "a".repeat(60));
        assert!(long.len() > 254);

        let errors = request(&long, "ann", "long enough").validate(false).unwrap_err();
        assert!(errors
            .get("email")
            .unwrap()
            .contains(&EMAIL_TOO_LONG.to_string()));

        let fits = format!("{}@{label}.{label}.{label}.com", "a".repeat(60));
        assert!(fits.len() <= 254);
        assert!(request(&fits, "ann", "long enough").validate(false).is_ok());
    }

    #[test]
    fn test_name_length() {
        let mut req = request("a@example.com", "ann", "long enough");
        req.last_name = Some("x".repeat(151));
        let errors = req.validate(false).unwrap_err();
        assert_eq!(errors.get("last_name"), Some(&[TOO_LONG.to_string()][..]));
    }

    #[test]
    fn test_password_complexity_toggle() {
        assert!(request("a@example.com", "ann", "alllowercase")
            .validate(false)
            .is_ok());
        let errors = request("a@example.com", "ann", "alllowercase")
            .validate(true)
            .unwrap_err();
        assert!(errors.contains("password"));
        assert!(request("a@example.com", "ann", "Str0ng!Pass")
            .validate(true)
            .is_ok());
    }

    #[test]
    fn test_login_request_presence() {
        let errors = LoginRequest {
            email: Some("a@example.com".into()),
            password: None,
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("password"), Some(&[REQUIRED.to_string()][..]));
        assert!(!errors.contains("email"));
    }

    #[test]
    fn test_field_errors_json_shape() {
        let errors = FieldErrors::single("email", DUPLICATE_EMAIL);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"email": [DUPLICATE_EMAIL]}));
    }
}
