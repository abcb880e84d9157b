//! Keeps every account paired with exactly one profile.
//!
//! [`provision_profile`] is the primary path and runs inside the
//! account-creation transaction. [`ensure_profile`] is the repair path for
//! accounts that somehow lack a profile; it checks first and then relies on
//! the `profiles.account_id` unique constraint, so concurrent callers end up
//! sharing a single row.

use tracing::{debug, warn};
use uuid::Uuid;

use super::{default_profile, Profile};
use crate::accounts::Account;
use crate::store::{Database, StoreError, Transaction, PROFILE_ACCOUNT_UNIQUE};

/// Outcome of [`ensure_profile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLookup {
    Existing(Profile),
    /// The account had no profile and a default one was created.
    Repaired(Profile),
}

impl ProfileLookup {
    pub fn profile(&self) -> &Profile {
        match self {
            ProfileLookup::Existing(p) | ProfileLookup::Repaired(p) => p,
        }
    }

    pub fn into_profile(self) -> Profile {
        match self {
            ProfileLookup::Existing(p) | ProfileLookup::Repaired(p) => p,
        }
    }

    pub fn was_repaired(&self) -> bool {
        matches!(self, ProfileLookup::Repaired(_))
    }
}

/// Inserts the default profile for a freshly inserted account.
pub fn provision_profile(tx: &mut Transaction<'_>, account: &Account) -> Result<Profile, StoreError> {
    let profile = default_profile(account.id);
    match tx.insert_profile(profile.clone()) {
        Ok(()) => {
            debug!(account = %account.id, profile = %profile.id, "Profile provisioned");
            Ok(profile)
        }
        Err(err) if err.is_unique_violation(PROFILE_ACCOUNT_UNIQUE) => tx
            .profile_for_account(&account.id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "profile",
                id: account.id,
            }),
        Err(err) => Err(err),
    }
}

/// Returns the account's profile, creating the default one if it is missing.
pub fn ensure_profile(db: &Database, account_id: &Uuid) -> Result<ProfileLookup, StoreError> {
    if let Some(profile) = db.read(|t| t.profile_for_account(account_id).cloned())? {
        return Ok(ProfileLookup::Existing(profile));
    }
    let created = db.transaction(|tx| {
        let profile = default_profile(*account_id);
        tx.insert_profile(profile.clone()).map(|()| profile)
    });
    match created {
        Ok(profile) => {
            warn!(account = %account_id, "Account had no profile; created a default one");
            Ok(ProfileLookup::Repaired(profile))
        }
        // Another request created it between the check and the insert.
        Err(err) if err.is_unique_violation(PROFILE_ACCOUNT_UNIQUE) => db
            .read(|t| t.profile_for_account(account_id).cloned())?
            .map(ProfileLookup::Existing)
            .ok_or(StoreError::NotFound {
                entity: "profile",
                id: *account_id,
            }),
        Err(err) => Err(err),
    }
}
