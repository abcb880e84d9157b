//! File-backed relational store for accounts and profiles.
//!
//! Both tables live in a single JSON document (`data/db.json`). Every
//! mutation runs inside [`Database::transaction`]: the closure works on a
//! private copy of the tables and the copy only replaces the live state (and
//! the file on disk) when the closure succeeds and the write lands. A failed
//! closure or a failed write leaves nothing behind.
//!
//! Constraints enforced here:
//! - `accounts.username` is unique, compared case-insensitively.
//! - `profiles.account_id` is unique and must reference an existing account.
//! - deleting an account deletes its profile.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::Account;
use crate::profiles::Profile;

pub const ACCOUNT_USERNAME_UNIQUE: &str = "accounts.username";
pub const ACCOUNT_ID_UNIQUE: &str = "accounts.id";
pub const PROFILE_ACCOUNT_UNIQUE: &str = "profiles.account_id";
pub const PROFILE_ID_UNIQUE: &str = "profiles.id";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint {constraint} violated")]
    UniqueViolation { constraint: &'static str },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned by a panicked writer")]
    Poisoned,
}

impl StoreError {
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint: c } if *c == constraint)
    }
}

/// The persisted tables. Read access is shared by snapshots and transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    accounts: BTreeMap<Uuid, Account>,
    #[serde(default)]
    profiles: BTreeMap<Uuid, Profile>,
}

impl Tables {
    pub fn account(&self, id: &Uuid) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn account_by_username(&self, username: &str) -> Option<&Account> {
        let wanted = username.to_lowercase();
        self.accounts
            .values()
            .find(|a| a.username.to_lowercase() == wanted)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Zero-or-one lookup of the profile owned by `account_id`.
    pub fn profile_for_account(&self, account_id: &Uuid) -> Option<&Profile> {
        self.profiles.values().find(|p| &p.account_id == account_id)
    }

    pub fn profiles_for_account(&self, account_id: &Uuid) -> usize {
        self.profiles
            .values()
            .filter(|p| &p.account_id == account_id)
            .count()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }
}

/// Mutable view handed to transaction closures.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        self.tables
    }
}

impl Transaction<'_> {
    pub fn insert_account(&mut self, account: Account) -> Result<(), StoreError> {
        if self.tables.accounts.contains_key(&account.id) {
            return Err(StoreError::UniqueViolation {
                constraint: ACCOUNT_ID_UNIQUE,
            });
        }
        if self.tables.account_by_username(&account.username).is_some() {
            return Err(StoreError::UniqueViolation {
                constraint: ACCOUNT_USERNAME_UNIQUE,
            });
        }
        self.tables.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn update_account(&mut self, account: Account) -> Result<(), StoreError> {
        if !self.tables.accounts.contains_key(&account.id) {
            return Err(StoreError::NotFound {
                entity: "account",
                id: account.id,
            });
        }
        let clash = self
            .tables
            .account_by_username(&account.username)
            .is_some_and(|other| other.id != account.id);
        if clash {
            return Err(StoreError::UniqueViolation {
                constraint: ACCOUNT_USERNAME_UNIQUE,
            });
        }
        self.tables.accounts.insert(account.id, account);
        Ok(())
    }

    /// Removes the account and, by cascade, its profile.
    pub fn delete_account(&mut self, id: &Uuid) -> Result<Account, StoreError> {
        let account = self
            .tables
            .accounts
            .remove(id)
            .ok_or(StoreError::NotFound {
                entity: "account",
                id: *id,
            })?;
        self.tables.profiles.retain(|_, p| &p.account_id != id);
        Ok(account)
    }

    pub fn insert_profile(&mut self, profile: Profile) -> Result<(), StoreError> {
        if !self.tables.accounts.contains_key(&profile.account_id) {
            return Err(StoreError::NotFound {
                entity: "account",
                id: profile.account_id,
            });
        }
        if self.tables.profiles.contains_key(&profile.id) {
            return Err(StoreError::UniqueViolation {
                constraint: PROFILE_ID_UNIQUE,
            });
        }
        if self.tables.profile_for_account(&profile.account_id).is_some() {
            return Err(StoreError::UniqueViolation {
                constraint: PROFILE_ACCOUNT_UNIQUE,
            });
        }
        self.tables.profiles.insert(profile.id, profile);
        Ok(())
    }

    pub fn update_profile(&mut self, profile: Profile) -> Result<(), StoreError> {
        let Some(existing) = self.tables.profiles.get(&profile.id) else {
            return Err(StoreError::NotFound {
                entity: "profile",
                id: profile.id,
            });
        };
        // The owner of a profile never changes.
        if existing.account_id != profile.account_id {
            return Err(StoreError::UniqueViolation {
                constraint: PROFILE_ACCOUNT_UNIQUE,
            });
        }
        self.tables.profiles.insert(profile.id, profile);
        Ok(())
    }
}

pub struct Database {
    path: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl Database {
    /// Opens (or starts) the store persisted at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            Tables::default()
        };
        Ok(Self {
            path: Some(path),
            tables: Mutex::new(tables),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Runs `f` against the committed tables.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let guard = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&guard))
    }

    /// Runs `f` as one all-or-nothing unit of work.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        let mut working = guard.clone();
        let value = f(&mut Transaction {
            tables: &mut working,
        })?;
        self.persist(&working)?;
        *guard = working;
        Ok(value)
    }

    fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(tables)?)?;
        fs::rename(&staging, path)?;
        Ok(())
    }
}
