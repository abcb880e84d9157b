use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::accounts::{self, Account};
use crate::events::EventType;
use crate::forms::login::INVALID_LOGIN;
use crate::forms::{FormErrors, LoginForm, NON_FIELD_ERRORS};
use crate::site::Site;

/// Where callers land after logging in or out without a `next` target.
pub const HOME_URL: &str = "/";

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginPage {
    pub form: LoginForm,
    pub errors: FormErrors,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated { account: Account, redirect_to: String },
    Rejected(LoginPage),
}

pub fn blank(next: Option<String>) -> LoginPage {
    LoginPage {
        form: LoginForm {
            next,
            ..LoginForm::default()
        },
        errors: FormErrors::new(),
    }
}

pub fn login(site: &Site, form: LoginForm) -> Result<LoginOutcome> {
    let (username, password) = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => return Ok(LoginOutcome::Rejected(LoginPage { form, errors })),
    };

    let Some(account) = accounts::authenticate(&site.db, username, password)? else {
        info!(%username, "Login rejected");
        site.events
            .record(EventType::LoginRejected, None, json!({ "username": username }));
        let mut errors = FormErrors::new();
        errors.add(NON_FIELD_ERRORS, INVALID_LOGIN);
        return Ok(LoginOutcome::Rejected(LoginPage { form, errors }));
    };

    let account = accounts::record_login(&site.db, &account.id)?;
    info!(account = %account.id, "Login succeeded");
    site.events
        .record(EventType::LoginSucceeded, Some(account.id), json!({}));
    let redirect_to = form.safe_next().unwrap_or(HOME_URL).to_string();
    Ok(LoginOutcome::Authenticated {
        account,
        redirect_to,
    })
}
