//! Password strength rules applied at registration.
//!
//! Four checks run in order and every failure is reported:
//! similarity to the username/email, minimum length, membership in the
//! common-password list, and all-digit passwords.

use std::collections::HashMap;

use crate::config::SecuritySettings;

/// Highest quick-ratio similarity a password may share with a user attribute.
pub const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &str = include_str!("common_passwords.txt");

/// Attributes a password must not resemble, paired with their display names.
#[derive(Debug, Clone, Copy)]
pub struct UserAttributes<'a> {
    pub username: &'a str,
    pub email: &'a str,
}

impl<'a> UserAttributes<'a> {
    fn named(&self) -> [(&'static str, &'a str); 2] {
        [("username", self.username), ("email address", self.email)]
    }
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl From<&SecuritySettings> for PasswordPolicy {
    fn from(settings: &SecuritySettings) -> Self {
        Self {
            min_length: settings.min_password_length,
        }
    }
}

impl PasswordPolicy {
    /// Returns one message per violated rule; empty means acceptable.
    pub fn validate(&self, password: &str, attrs: UserAttributes<'_>) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(name) = similar_attribute(password, attrs) {
            errors.push(format!("The password is too similar to the {name}."));
        }
        if password.chars().count() < self.min_length {
            errors.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }
        if is_common(password) {
            errors.push("This password is too common.".to_string());
        }
        if !password.is_empty() && password.chars().all(|c| c.is_numeric()) {
            errors.push("This password is entirely numeric.".to_string());
        }
        errors
    }
}

fn is_common(password: &str) -> bool {
    let candidate = password.trim().to_lowercase();
    COMMON_PASSWORDS
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && line == candidate)
}

fn similar_attribute(password: &str, attrs: UserAttributes<'_>) -> Option<&'static str> {
    let password = password.to_lowercase();
    for (name, value) in attrs.named() {
        if value.is_empty() {
            continue;
        }
        let value = value.to_lowercase();
        let parts = value
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .chain(std::iter::once(value.as_str()));
        for part in parts {
            if exceeds_length_ratio(&password, part) {
                continue;
            }
            if quick_ratio(&password, part) >= MAX_SIMILARITY {
                return Some(name);
            }
        }
    }
    None
}

/// Skips attributes far shorter than the password; they cannot dominate it.
fn exceeds_length_ratio(password: &str, part: &str) -> bool {
    let pwd_len = password.chars().count();
    let part_len = part.chars().count();
    let bound = MAX_SIMILARITY / 2.0 * pwd_len as f64;
    pwd_len >= 10 * part_len && (part_len as f64) < bound
}

/// Upper bound on sequence similarity: shared characters as a multiset.
fn quick_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }
    let mut matches = 0usize;
    for c in a.chars() {
        if let Some(n) = available.get_mut(&c) {
            if *n > 0 {
                *n -= 1;
                matches += 1;
            }
        }
    }
    2.0 * matches as f64 / total as f64
}
