//! Login gate placed in front of routes that need a caller.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::{found, run_blocking, AppState, LOGIN_URL};
use crate::accounts::Account;
use crate::sessions::session_key;
use crate::web::WebError;

/// The authenticated caller, inserted into request extensions by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

/// Resolves the caller from the session cookie.
pub async fn current_account(
    state: &AppState,
    headers: &axum::http::HeaderMap,
) -> Result<Option<Account>, WebError> {
    let Some(key) = session_key(headers, state.cookie_name()) else {
        return Ok(None);
    };
    let Some(account_id) = state.sessions.account_for(&key).await else {
        return Ok(None);
    };
    let account = run_blocking(&state.site, move |site| {
        Ok(site.db.read(|t| t.account(&account_id).cloned())?)
    })
    .await?;
    Ok(account.filter(|a| a.is_active))
}

/// Lets authenticated callers through; everyone else is sent to the login
/// page with the requested path in `next`.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, WebError> {
    match current_account(&state, request.headers()).await? {
        Some(account) => {
            request.extensions_mut().insert(CurrentAccount(account));
            Ok(next.run(request).await)
        }
        None => {
            let destination = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            debug!(%destination, "Anonymous request redirected to login");
            Ok(login_redirect(destination))
        }
    }
}

/// `302` to the login page remembering `destination`.
pub fn login_redirect(destination: &str) -> Response {
    match serde_urlencoded::to_string([("next", destination)]) {
        Ok(query) => found(&format!("{LOGIN_URL}?{query}")),
        Err(_) => found(LOGIN_URL),
    }
}
