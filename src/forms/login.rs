use serde::{Deserialize, Serialize};

use super::{FormErrors, REQUIRED};

pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Where to continue after a successful login.
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(&str, &str), FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result((username, self.password.as_str()))
    }

    /// The `next` target when it is a path on this site.
    pub fn safe_next(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| is_local_path(next))
    }
}

/// Accepts `/path` but not `//host`, `/\host` or absolute URLs.
pub fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
        && !target.chars().any(char::is_control)
}
