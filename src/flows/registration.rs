use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::Notice;
use crate::accounts::{self, Account, PasswordPolicy};
use crate::events::EventType;
use crate::forms::registration::USERNAME_TAKEN;
use crate::forms::{FormErrors, RegistrationForm};
use crate::site::Site;

/// What the registration page shows: submitted values and their errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationPage {
    pub form: RegistrationForm,
    pub errors: FormErrors,
}

#[derive(Debug)]
pub enum RegistrationOutcome {
    /// Account and profile exist; send the caller to the login page.
    Registered { account: Account, notice: Notice },
    /// Nothing was written; show the form again.
    Rejected(RegistrationPage),
}

pub fn blank() -> RegistrationPage {
    RegistrationPage::default()
}

pub fn register(site: &Site, form: RegistrationForm) -> Result<RegistrationOutcome> {
    let policy = PasswordPolicy::from(&site.config.security);
    let cleaned = match site.db.read(|tables| form.validate(tables, &policy))? {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            info!(username = %form.username.trim(), "Registration rejected");
            return Ok(RegistrationOutcome::Rejected(RegistrationPage { form, errors }));
        }
    };

    let created = accounts::create_account(
        &site.db,
        cleaned.into(),
        site.config.security.password_hash_cost,
    );
    let (account, profile) = match created {
        Ok(pair) => pair,
        // Someone registered the same name after validation read the table.
        Err(err) if accounts::is_username_taken(&err) => {
            let mut errors = FormErrors::new();
            errors.add("username", USERNAME_TAKEN);
            return Ok(RegistrationOutcome::Rejected(RegistrationPage { form, errors }));
        }
        Err(err) => return Err(err),
    };

    site.events.record(
        EventType::AccountRegistered,
        Some(account.id),
        json!({ "username": account.username }),
    );
    site.events.record(
        EventType::ProfileProvisioned,
        Some(account.id),
        json!({ "profile_id": profile.id, "foto": profile.foto }),
    );
    let notice = Notice::success(format!(
        "Account created for {}! You can now log in.",
        account.username
    ));
    Ok(RegistrationOutcome::Registered { account, notice })
}
