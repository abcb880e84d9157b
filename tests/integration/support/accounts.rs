use anyhow::{bail, Result};
use fansite::accounts::{hash_password, Account};
use fansite::flows::registration::{register, RegistrationOutcome};
use fansite::forms::RegistrationForm;
use fansite::store::StoreError;
use fansite::Site;

use crate::TEST_HASH_COST;

pub const PASSWORD: &str = "Bikina-de-1982";

pub fn registration_form(username: &str, password1: &str, password2: &str) -> RegistrationForm {
    RegistrationForm {
        username: username.into(),
        email: format!("{}@example.com", username.to_lowercase()),
        password1: password1.into(),
        password2: password2.into(),
    }
}

/// Registers `username` through the normal flow.
pub fn register_fan(site: &Site, username: &str) -> Result<Account> {
    match register(site, registration_form(username, PASSWORD, PASSWORD))? {
        RegistrationOutcome::Registered { account, .. } => Ok(account),
        RegistrationOutcome::Rejected(page) => bail!("registration rejected: {:?}", page.errors),
    }
}

/// Inserts an account row without a profile, as legacy data would look.
pub fn insert_bare_account(site: &Site, username: &str) -> Result<Account> {
    let hash = hash_password(PASSWORD, TEST_HASH_COST)?;
    let account = Account::new(username, "", hash);
    site.db.transaction(|tx| -> Result<(), StoreError> {
        tx.insert_account(account.clone())
    })?;
    Ok(account)
}
