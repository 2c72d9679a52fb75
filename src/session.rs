use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use wordwave_common::models::{AuthSession, User};

use crate::cart::Cart;
use crate::library::debounce::Debouncer;
use crate::library::LibraryView;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// Everything one visitor's browser tab would have held.
#[derive(Debug, Default)]
pub struct Session {
    pub auth: Option<AuthSession>,
    pub theme: Theme,
    pub cart: Cart,
    pub library: LibraryView,
    pub chat: Vec<ChatMessage>,
    pub search: Debouncer,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.auth.as_ref().map(|a| &a.user)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.access_token.as_str())
    }

    /// Drops the auth mirror and the cart. The theme is kept.
    pub fn sign_out(&mut self) -> Option<AuthSession> {
        self.cart.clear();
        self.auth.take()
    }
}

struct Entry {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

pub struct SessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the session for `id`, creating a fresh one for unknown ids.
    pub async fn open(&self, id: &str) -> Arc<Mutex<Session>> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!("Opening session {}", id);
            Entry {
                session: Arc::new(Mutex::new(Session::default())),
                last_seen: Instant::now(),
            }
        });
        entry.last_seen = Instant::now();
        entry.session.clone()
    }

    pub async fn close(&self, id: &str) -> bool {
        self.entries.write().await.remove(id).is_some()
    }

    /// Removes sessions idle for longer than the TTL.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen.elapsed() < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

pub fn spawn_sweeper(store: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = store.sweep().await;
            if removed > 0 {
                tracing::info!("Swept {} idle sessions", removed);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_id_same_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.open("tab-1").await;
        a.lock().await.theme = Theme::Dark;

        let again = store.open("tab-1").await;
        assert_eq!(again.lock().await.theme, Theme::Dark);

        let other = store.open("tab-2").await;
        assert_eq!(other.lock().await.theme, Theme::Light);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn closing_forgets_state() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.open("tab").await.lock().await.theme = Theme::Dark;
        assert!(store.close("tab").await);
        assert!(!store.close("tab").await);
        assert_eq!(store.open("tab").await.lock().await.theme, Theme::Light);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_swept() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.open("stale").await;
        tokio::time::advance(Duration::from_secs(45)).await;
        store.open("fresh").await;
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn sign_out_keeps_the_theme() {
        let mut session = Session {
            theme: Theme::Dark,
            ..Session::default()
        };
        assert!(session.sign_out().is_none());
        assert_eq!(session.theme, Theme::Dark);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
    }
}
