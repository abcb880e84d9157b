use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::Response};
use serde::Serialize;

use super::{guard::current_account, render, AppState, WebError};

/// A public page with no behavior beyond rendering.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub slug: &'static str,
    pub path: &'static str,
    pub title: &'static str,
}

pub const PAGES: &[Page] = &[
    Page { slug: "inicio", path: "/", title: "Inicio" },
    Page { slug: "musica_disponible", path: "/musica/", title: "Música disponible" },
    Page { slug: "proximamente", path: "/proximamente/", title: "Próximamente" },
    Page { slug: "album_20", path: "/20anos/", title: "20 Años" },
    Page { slug: "album_romance", path: "/romance/", title: "Romance" },
    Page { slug: "album_2010", path: "/2010/", title: "Luis Miguel 2010" },
];

#[derive(Debug, Serialize)]
struct PageView {
    page: &'static str,
    title: &'static str,
    /// Username of the logged-in caller, for the navigation bar.
    user: Option<String>,
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    page: &'static Page,
) -> Result<Response, WebError> {
    let user = current_account(&state, &headers)
        .await?
        .map(|account| account.username);
    let view = PageView {
        page: page.slug,
        title: page.title,
        user,
    };
    Ok(render(&state, &headers, view).await)
}
