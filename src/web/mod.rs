//! HTTP surface: routes, session cookies and JSON page rendering.

mod error;
pub mod guard;
pub mod handlers;
pub mod pages;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

pub use error::WebError;

use crate::flows::Notice;
use crate::sessions::{session_cookie, session_key, SessionStore};
use crate::site::Site;

pub const REGISTRATION_URL: &str = "/registro/";
pub const PROFILE_URL: &str = "/perfil/";
pub const LOGIN_URL: &str = "/login/";
pub const LOGOUT_URL: &str = "/logout/";

pub struct AppState {
    pub site: Arc<Site>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(site: Site) -> Arc<Self> {
        let sessions = SessionStore::new(site.config.security.session_ttl());
        Arc::new(Self {
            site: Arc::new(site),
            sessions,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.site.config.security.session_cookie
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let uploads = &state.site.config.uploads;
    let body_limit = uploads.request_body_limit();
    let media_prefix = match uploads.media_url.trim_end_matches('/') {
        "" => "/media".to_string(),
        prefix => prefix.to_string(),
    };
    let media = ServeDir::new(state.site.media.root());

    let protected = Router::new()
        .route(
            PROFILE_URL,
            get(handlers::profile_page).post(handlers::update_profile),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_login,
        ));

    let mut app = Router::new()
        .route(
            REGISTRATION_URL,
            get(handlers::registration_page).post(handlers::register),
        )
        .route(LOGIN_URL, get(handlers::login_page).post(handlers::login))
        .route(LOGOUT_URL, get(handlers::logout).post(handlers::logout))
        .merge(protected);

    for page in pages::PAGES {
        app = app.route(
            page.path,
            get(move |state: State<Arc<AppState>>, headers: HeaderMap| {
                pages::show(state, headers, page)
            }),
        );
    }

    app.nest_service(&media_prefix, media)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let server = &state.site.config.server;
    let address = format!("{}:{}", server.bind_address, server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed binding {address}"))?;
    info!("Listening on {address}");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[derive(Serialize)]
struct Rendered<T> {
    #[serde(flatten)]
    page: T,
    messages: Vec<Notice>,
}

/// Page body plus the notices queued for this caller, which are consumed.
pub(crate) async fn render<T: Serialize>(state: &AppState, headers: &HeaderMap, page: T) -> Response {
    let messages = match session_key(headers, state.cookie_name()) {
        Some(key) => state.sessions.take_notices(&key).await,
        None => Vec::new(),
    };
    Json(Rendered { page, messages }).into_response()
}

pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::FOUND, [(LOCATION, HeaderValue::from_static("/"))]).into_response(),
    }
}

pub(crate) fn set_cookie(response: &mut Response, cookie: &str) -> Result<(), WebError> {
    response
        .headers_mut()
        .append(SET_COOKIE, HeaderValue::from_str(cookie)?);
    Ok(())
}

/// `302` to `location`, queuing `notice` for the page shown there.
pub(crate) async fn redirect_with_notice(
    state: &AppState,
    headers: &HeaderMap,
    location: &str,
    notice: Notice,
) -> Result<Response, WebError> {
    let existing = session_key(headers, state.cookie_name());
    let key = state.sessions.push_notice(existing.as_deref(), notice).await;
    let mut response = found(location);
    if existing.as_deref() != Some(key.as_str()) {
        set_cookie(&mut response, &session_cookie(state.cookie_name(), &key))?;
    }
    Ok(response)
}

/// Runs a flow on the blocking pool; flows touch the disk.
pub(crate) async fn run_blocking<T, F>(site: &Arc<Site>, flow: F) -> Result<T, WebError>
where
    F: FnOnce(&Site) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let site = Arc::clone(site);
    let outcome = tokio::task::spawn_blocking(move || flow(&site)).await?;
    Ok(outcome?)
}
