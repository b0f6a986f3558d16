//! Session store collaborator.
//!
//! The client never reads credentials from global state; it asks a
//! [`SessionStore`] for the current bearer token and tells it when the server
//! rejected that token.

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::RwLock;

/// Credential source and invalidation sink supplied by the application.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// The current bearer token, if any.
    fn token(&self) -> Option<String>;

    /// Whether the store currently considers the user signed in.
    fn is_authenticated(&self) -> bool;

    /// Invalidate the local session. Called at most once per request, and only
    /// while [`is_authenticated`](SessionStore::is_authenticated) is true.
    ///
    /// Any redirect to a sign-in surface is the implementor's business.
    fn logout(&self);

    /// Try to obtain a fresh credential after a 401.
    ///
    /// Returns `true` if a new token is now available from
    /// [`token`](SessionStore::token). The default does not support refresh.
    async fn refresh(&self) -> bool {
        false
    }
}

/// Format a bearer `Authorization` header value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Anonymous session: no credential, never authenticated.
#[derive(Debug, Clone, Default)]
pub struct NoSession;

#[async_trait]
impl SessionStore for NoSession {
    fn token(&self) -> Option<String> {
        None
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn logout(&self) {}
}

/// Simple in-process session store.
///
/// Holds the current token behind a lock, counts logouts, and can be primed
/// with the token a subsequent [`refresh`](SessionStore::refresh) hands out.
#[derive(Default)]
pub struct InMemorySession {
    token: RwLock<Option<String>>,
    refreshed: RwLock<Option<String>>,
    logouts: AtomicUsize,
}

impl InMemorySession {
    /// Create an empty, signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signed-in session holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_token(token);
        session
    }

    /// Replace the current token.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        *self.token.write() = Some(token).filter(|t| !t.trim().is_empty());
    }

    /// Make the next `refresh()` succeed with `token`.
    pub fn prime_refresh(&self, token: impl Into<String>) {
        *self.refreshed.write() = Some(token.into());
    }

    /// Number of times `logout()` has been invoked.
    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySession")
            .field("authenticated", &self.is_authenticated())
            .field("logouts", &self.logout_count())
            .finish()
    }
}

#[async_trait]
impl SessionStore for InMemorySession {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    fn logout(&self) {
        self.logouts.fetch_add(1, Ordering::Relaxed);
        *self.token.write() = None;
    }

    async fn refresh(&self) -> bool {
        match self.refreshed.write().take() {
            Some(token) => {
                self.set_token(token);
                true
            }
            None => false,
        }
    }
}
