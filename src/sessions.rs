//! In-memory sessions keyed by a random cookie value.
//!
//! A session optionally carries the logged-in account and the notices queued
//! for the next page view. Logging in rotates the key so a key issued to an
//! anonymous visitor never becomes an authenticated one. Sessions older than
//! the configured lifetime read as absent and are pruned on the next write.

use std::collections::HashMap;

use axum::http::{header::COOKIE, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::flows::Notice;

pub const SESSION_KEY_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: Option<Uuid>,
    pub notices: Vec<Notice>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn anonymous() -> Self {
        Self {
            account_id: None,
            notices: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.created_at
            .checked_add_signed(ttl)
            .is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn live<'a>(&self, sessions: &'a HashMap<String, Session>, key: &str) -> Option<&'a Session> {
        sessions
            .get(key)
            .filter(|s| !s.is_expired(Utc::now(), self.ttl))
    }

    fn prune(&self, sessions: &mut HashMap<String, Session>) {
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.ttl));
        let dropped = before - sessions.len();
        if dropped > 0 {
            tracing::debug!(dropped, "pruned expired sessions");
        }
    }

    pub async fn account_for(&self, key: &str) -> Option<Uuid> {
        let sessions = self.sessions.read().await;
        self.live(&sessions, key).and_then(|s| s.account_id)
    }

    /// Binds `account_id` to a fresh key, carrying over pending notices.
    pub async fn login(&self, previous_key: Option<&str>, account_id: Uuid) -> String {
        let mut sessions = self.sessions.write().await;
        self.prune(&mut sessions);
        let mut session = previous_key
            .and_then(|key| sessions.remove(key))
            .unwrap_or_else(Session::anonymous);
        session.account_id = Some(account_id);
        session.created_at = Utc::now();
        let key = new_session_key();
        sessions.insert(key.clone(), session);
        key
    }

    /// Drops the session; returns the account that was logged in, if any.
    pub async fn logout(&self, key: &str) -> Option<Uuid> {
        self.sessions
            .write()
            .await
            .remove(key)
            .and_then(|s| s.account_id)
    }

    /// Queues a notice, creating an anonymous session when `key` is unknown.
    /// Returns the key the notice was stored under.
    pub async fn push_notice(&self, key: Option<&str>, notice: Notice) -> String {
        let mut sessions = self.sessions.write().await;
        self.prune(&mut sessions);
        if let Some(key) = key {
            if let Some(session) = sessions.get_mut(key) {
                session.notices.push(notice);
                return key.to_string();
            }
        }
        let key = new_session_key();
        let mut session = Session::anonymous();
        session.notices.push(notice);
        sessions.insert(key.clone(), session);
        key
    }

    /// Removes and returns the queued notices.
    pub async fn take_notices(&self, key: &str) -> Vec<Notice> {
        let now = Utc::now();
        self.sessions
            .write()
            .await
            .get_mut(key)
            .filter(|s| !s.is_expired(now, self.ttl))
            .map(|s| std::mem::take(&mut s.notices))
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

pub fn new_session_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Reads the session key from the request's `Cookie` headers.
pub fn session_key(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value binding the session key.
pub fn session_cookie(cookie_name: &str, key: &str) -> String {
    format!("{cookie_name}={key}; HttpOnly; Path=/; SameSite=Lax")
}

/// `Set-Cookie` value removing the session cookie.
pub fn expired_session_cookie(cookie_name: &str) -> String {
    format!(
        "{cookie_name}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    )
}
