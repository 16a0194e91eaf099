use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::db::user::{hash_password, NewUser, User};
use crate::model::mongodb::{serde_id_string, Id};

use super::user::Rights;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Fields accepted at registration. Public registration always yields a
/// voter account, regardless of what the caller might wish for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub organization: Option<String>,
}

/// Raw login credentials, received from a user. These are never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued on successful registration or login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(with = "serde_id_string")]
    pub user_id: Id,
    pub role: Rights,
    pub token: String,
}

/// A user's view of their own account.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(with = "serde_id_string")]
    pub user_id: Id,
    pub email: String,
    pub full_name: String,
    pub organization: Option<String>,
    pub role: Rights,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.user.email,
            full_name: user.user.full_name,
            organization: user.user.organization,
            role: user.user.role,
            created_at: user.user.created_at,
            last_login: user.user.last_login.map(|at| at.to_chrono()),
        }
    }
}

/// Why a registration was rejected.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password must be at least 8 characters with letters, numbers, and symbols")]
    WeakPassword,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("The static regex is valid")
    })
}

/// Validate an email address shape.
pub fn validate_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Validate password strength: at least 8 characters, containing a letter,
/// a digit, and a symbol.
pub fn validate_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

impl TryFrom<RegisterRequest> for NewUser {
    type Error = CredentialsError;

    /// Convert a [`RegisterRequest`] into a storable user by validating the
    /// credentials and hashing the password.
    fn try_from(request: RegisterRequest) -> Result<Self, Self::Error> {
        if !validate_email(&request.email) {
            return Err(CredentialsError::InvalidEmail);
        }
        if !validate_password(&request.password) {
            return Err(CredentialsError::WeakPassword);
        }
        Ok(NewUser::new(
            request.email,
            hash_password(&request.password),
            request.full_name,
            request.organization,
            Rights::Voter,
        ))
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl RegisterRequest {
        pub fn example() -> Self {
            Self {
                email: "alice@example.com".to_string(),
                password: "Aa1!aaaa".to_string(),
                full_name: "Alice Example".to_string(),
                organization: Some("Example University".to_string()),
            }
        }

        pub fn example2() -> Self {
            Self {
                email: "bob@example.com".to_string(),
                password: "hunter2!H".to_string(),
                full_name: "Bob Example".to_string(),
                organization: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("a@b.com"));
        assert!(validate_email("first.last@sub.example.org"));
        assert!(!validate_email(""));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
        assert!(!validate_email("two@@example.com"));
        assert!(!validate_email("spaces in@example.com"));
    }

    #[test]
    fn password_validation() {
        assert!(validate_password("Aa1!aaaa"));
        assert!(validate_password("correct horse 1!"));
        assert!(!validate_password("Aa1!a")); // too short
        assert!(!validate_password("alllowercase")); // no digit or symbol
        assert!(!validate_password("12345678!")); // no letter
        assert!(!validate_password("Password1")); // no symbol
    }

    #[test]
    fn registration_always_yields_a_voter() {
        let user = NewUser::try_from(RegisterRequest::example()).unwrap();
        assert_eq!(user.role, Rights::Voter);
        assert!(user.verify_password("Aa1!aaaa"));
    }

    #[test]
    fn bad_registrations_are_rejected() {
        let mut request = RegisterRequest::example();
        request.email = "nope".to_string();
        assert!(matches!(
            NewUser::try_from(request),
            Err(CredentialsError::InvalidEmail)
        ));

        let mut request = RegisterRequest::example();
        request.password = "weak".to_string();
        assert!(matches!(
            NewUser::try_from(request),
            Err(CredentialsError::WeakPassword)
        ));
    }
}
