//! Session state and the events published when it changes.

use std::fmt;

use crate::models::User;

/// Where a token pair is persisted. Chosen at login and fixed for the life of
/// that pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistenceScope {
    /// Survives restarts (the configured storage backend).
    Durable,
    /// Lives as long as the process.
    Session,
}

impl PersistenceScope {
    /// Scope selected by a "remember me" flag.
    pub fn from_remember(remember: bool) -> Self {
        if remember { Self::Durable } else { Self::Session }
    }
}

impl fmt::Display for PersistenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable => write!(f, "durable"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Snapshot of the authentication state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub scope: Option<PersistenceScope>,
}

impl Session {
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("user", &self.username())
            .field("is_authenticated", &self.is_authenticated)
            .field("is_loading", &self.is_loading)
            .field("error", &self.error)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Published on the manager's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    LoggedOut,
    /// A refresh failed; the UI should send the user to `route`.
    SignInRequired { route: String },
}
