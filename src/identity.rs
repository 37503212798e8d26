use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Result, SmokeError};

pub const USERNAME_PREFIX: &str = "testuser_";
pub const EMAIL_PREFIX: &str = "test_";
pub const EMAIL_DOMAIN: &str = "@example.com";
pub const DEFAULT_PASSWORD: &str = "password123";

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
            .expect("static email pattern")
    })
}

/// Millisecond timestamp plus a random fragment, so two runs in the same
/// millisecond still get distinct identities.
pub fn unique_suffix() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", millis, &random[..8])
}

#[derive(Clone, Serialize)]
pub struct TestUser {
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    suffix: String,
}

impl TestUser {
    pub fn generate(password: &str) -> Self {
        Self::with_suffix(&unique_suffix(), password)
    }

    pub fn with_suffix(suffix: &str, password: &str) -> Self {
        Self {
            username: format!("{}{}", USERNAME_PREFIX, suffix),
            email: format!("{}{}{}", EMAIL_PREFIX, suffix, EMAIL_DOMAIN),
            password: password.to_string(),
            suffix: suffix.to_string(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn validate(&self) -> Result<()> {
        if !self.username.starts_with(USERNAME_PREFIX) || self.username.len() == USERNAME_PREFIX.len() {
            return Err(SmokeError::InvalidIdentity(format!(
                "username '{}' must be '{}' plus a unique suffix",
                self.username, USERNAME_PREFIX
            )));
        }
        if !email_pattern().is_match(&self.email) {
            return Err(SmokeError::InvalidIdentity(format!(
                "email '{}' is not a valid address",
                self.email
            )));
        }
        if self.password.is_empty() {
            return Err(SmokeError::InvalidIdentity("password is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for TestUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_literal_shape() {
        let user = TestUser::generate(DEFAULT_PASSWORD);
        assert!(user.username.starts_with("testuser_"));
        assert!(user.email.starts_with("test_"));
        assert!(user.email.ends_with("@example.com"));
        assert_eq!(user.password, "password123");
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_username_and_email_share_suffix() {
        let user = TestUser::generate(DEFAULT_PASSWORD);
        let suffix = user.suffix().to_string();
        assert_eq!(user.username, format!("testuser_{}", suffix));
        assert_eq!(user.email, format!("test_{}@example.com", suffix));
    }

    #[test]
    fn test_identities_do_not_collide_within_a_millisecond() {
        let mut usernames = HashSet::new();
        let mut emails = HashSet::new();
        for _ in 0..2000 {
            let user = TestUser::generate(DEFAULT_PASSWORD);
            assert!(usernames.insert(user.username));
            assert!(emails.insert(user.email));
        }
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        let mut user = TestUser::with_suffix("1", DEFAULT_PASSWORD);
        user.email = "not-an-email".to_string();
        assert!(matches!(user.validate(), Err(SmokeError::InvalidIdentity(_))));
    }

    #[test]
    fn test_validate_rejects_bare_prefix() {
        let user = TestUser::with_suffix("", DEFAULT_PASSWORD);
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let user = TestUser::generate("hunter2");
        let dbg = format!("{:?}", user);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_serialize_skips_password() {
        let user = TestUser::with_suffix("42", DEFAULT_PASSWORD);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["username"], "testuser_42");
        assert!(json.get("password").is_none());
    }
}
