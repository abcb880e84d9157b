use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::HeaderMap,
    response::Response,
    Extension, Form,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::guard::CurrentAccount;
use super::{
    found, redirect_with_notice, render, run_blocking, set_cookie, AppState, WebError, LOGIN_URL,
    PROFILE_URL,
};
use crate::events::EventType;
use crate::flows::login::{self, LoginOutcome, HOME_URL};
use crate::flows::profile::{self, ProfileUpdateOutcome};
use crate::flows::registration::{self, RegistrationOutcome};
use crate::forms::{LoginForm, ProfileUpdateForm, RegistrationForm, FOTO_FIELD};
use crate::media::UploadedFile;
use crate::sessions::{expired_session_cookie, session_cookie, session_key};

pub async fn registration_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render(&state, &headers, registration::blank()).await
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, WebError> {
    let outcome = run_blocking(&state.site, move |site| registration::register(site, form)).await?;
    match outcome {
        RegistrationOutcome::Registered { account, notice } => {
            info!(account = %account.id, username = %account.username, "Account registered");
            redirect_with_notice(&state, &headers, LOGIN_URL, notice).await
        }
        RegistrationOutcome::Rejected(page) => Ok(render(&state, &headers, page).await),
    }
}

pub async fn profile_page(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let page = run_blocking(&state.site, move |site| profile::show(site, &account)).await?;
    Ok(render(&state, &headers, page).await)
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let form = read_profile_form(multipart, state.site.config.uploads.max_image_bytes).await?;
    let outcome = run_blocking(&state.site, move |site| profile::submit(site, &account, form)).await?;
    match outcome {
        ProfileUpdateOutcome::Updated { notice, .. } => {
            redirect_with_notice(&state, &headers, PROFILE_URL, notice).await
        }
        ProfileUpdateOutcome::Rejected(page) => Ok(render(&state, &headers, page).await),
    }
}

/// Collects the `foto` part; other fields are ignored. At most
/// `max_image_bytes + 1` bytes are kept so an oversized upload still reaches
/// validation and is reported as a field error.
async fn read_profile_form(
    mut multipart: Multipart,
    max_image_bytes: usize,
) -> Result<ProfileUpdateForm, WebError> {
    let keep = max_image_bytes.saturating_add(1);
    let mut form = ProfileUpdateForm::default();
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FOTO_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let mut bytes = Vec::new();
        let mut size = 0usize;
        while let Some(chunk) = field.chunk().await? {
            size = size.saturating_add(chunk.len());
            let room = keep.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
        // Browsers send an empty, unnamed part when no file was chosen.
        if file_name.is_empty() && size == 0 {
            continue;
        }
        form.foto = Some(UploadedFile {
            file_name,
            bytes,
            size,
        });
    }
    Ok(form)
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

pub async fn login_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> Response {
    render(&state, &headers, login::blank(query.next)).await
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let outcome = run_blocking(&state.site, move |site| login::login(site, form)).await?;
    match outcome {
        LoginOutcome::Authenticated {
            account,
            redirect_to,
        } => {
            let previous = session_key(&headers, state.cookie_name());
            let key = state.sessions.login(previous.as_deref(), account.id).await;
            let mut response = found(&redirect_to);
            set_cookie(&mut response, &session_cookie(state.cookie_name(), &key))?;
            Ok(response)
        }
        LoginOutcome::Rejected(page) => Ok(render(&state, &headers, page).await),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, WebError> {
    if let Some(key) = session_key(&headers, state.cookie_name()) {
        if let Some(account_id) = state.sessions.logout(&key).await {
            info!(account = %account_id, "Logged out");
            run_blocking(&state.site, move |site| {
                site.events
                    .record(EventType::LoggedOut, Some(account_id), json!({}));
                Ok(())
            })
            .await?;
        }
    }
    let mut response = found(HOME_URL);
    set_cookie(&mut response, &expired_session_cookie(state.cookie_name()))?;
    Ok(response)
}
