//! Accounts: credentials and identity.
//!
//! Creating an account always creates its profile in the same transaction,
//! so no caller can observe an account without one. Later updates to an
//! account (login bookkeeping) never provision.

pub mod password;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::profiles::{provision::provision_profile, Profile};
use crate::store::{Database, StoreError, ACCOUNT_USERNAME_UNIQUE};

pub use password::PasswordPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// bcrypt hash; the raw password is never stored.
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }
}

/// Validated input for [`create_account`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

/// Creates the account and its profile as one unit of work.
///
/// A username that is already taken surfaces as a [`StoreError::UniqueViolation`]
/// on [`ACCOUNT_USERNAME_UNIQUE`] inside the returned error.
pub fn create_account(db: &Database, new: NewAccount, hash_cost: u32) -> Result<(Account, Profile)> {
    let password_hash =
        hash_password(&new.password, hash_cost).context("Failed hashing new password")?;
    let account = Account::new(new.username, new.email, password_hash);
    let (account, profile) = db.transaction(|tx| -> Result<_, StoreError> {
        tx.insert_account(account.clone())?;
        let profile = provision_profile(tx, &account)?;
        Ok((account, profile))
    })?;
    info!(account = %account.id, username = %account.username, "Account created");
    Ok((account, profile))
}

/// Returns the active account matching the credentials, if any.
pub fn authenticate(db: &Database, username: &str, password: &str) -> Result<Option<Account>> {
    let Some(account) = db.read(|t| t.account_by_username(username).cloned())? else {
        debug!(%username, "Login for unknown username");
        return Ok(None);
    };
    if !account.is_active {
        debug!(%username, "Login for inactive account");
        return Ok(None);
    }
    let matches = verify_password(password, &account.password_hash)
        .with_context(|| format!("Stored password hash for {} is unreadable", account.id))?;
    Ok(matches.then_some(account))
}

/// Stamps `last_login`. This is an account update and does not provision.
pub fn record_login(db: &Database, account_id: &Uuid) -> Result<Account> {
    let account = db.transaction(|tx| -> Result<_, StoreError> {
        let mut account = tx
            .account(account_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "account",
                id: *account_id,
            })?;
        account.last_login = Some(Utc::now());
        tx.update_account(account.clone())?;
        Ok(account)
    })?;
    Ok(account)
}

/// Deletes the account together with its profile.
pub fn delete_account(db: &Database, account_id: &Uuid) -> Result<Account> {
    let account = db.transaction(|tx| tx.delete_account(account_id))?;
    info!(account = %account.id, "Account deleted");
    Ok(account)
}

/// True when `err` is the store rejecting a duplicate username.
pub fn is_username_taken(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StoreError>()
        .is_some_and(|e| e.is_unique_violation(ACCOUNT_USERNAME_UNIQUE))
}
