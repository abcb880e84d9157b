use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{FormErrors, REQUIRED};
use crate::accounts::password::{PasswordPolicy, UserAttributes};
use crate::accounts::NewAccount;
use crate::store::Tables;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const USERNAME_INVALID: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn’t match.";
pub const EMAIL_INVALID: &str = "Enter a valid email address.";

/// Raw registration submission. Passwords are never echoed back.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct CleanedRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl From<CleanedRegistration> for NewAccount {
    fn from(cleaned: CleanedRegistration) -> Self {
        NewAccount {
            username: cleaned.username,
            email: cleaned.email,
            password: cleaned.password,
        }
    }
}

impl RegistrationForm {
    /// Validates every field against the committed accounts.
    pub fn validate(
        &self,
        tables: &Tables,
        policy: &PasswordPolicy,
    ) -> Result<CleanedRegistration, FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        let email = self.email.trim();

        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else {
            let length = username.chars().count();
            if length > USERNAME_MAX_LENGTH {
                errors.add(
                    "username",
                    format!(
                        "Ensure this value has at most {USERNAME_MAX_LENGTH} characters (it has {length})."
                    ),
                );
            }
            if !username.chars().all(is_username_char) {
                errors.add("username", USERNAME_INVALID);
            }
            if tables.account_by_username(username).is_some() {
                errors.add("username", USERNAME_TAKEN);
            }
        }

        if !email.is_empty() && !email_pattern().is_some_and(|p| p.is_match(email)) {
            errors.add("email", EMAIL_INVALID);
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", PASSWORD_MISMATCH);
            } else {
                let attrs = UserAttributes { username, email };
                errors.extend("password2", policy.validate(&self.password2, attrs));
            }
        }

        errors.into_result(CleanedRegistration {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password1.clone(),
        })
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

/// `None` only if the pattern fails to compile; every address is then refused.
fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").ok())
        .as_ref()
}
