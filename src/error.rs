//! Error types for the feed client.
//!
//! Every variant carries owned strings so an error can be cloned: a single
//! outcome is handed to every caller collapsed onto one cache fetch and to every
//! request queued behind one token refresh.

use thiserror::Error;

/// Unified client error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------
    /// Invalid credentials or registration conflict. The message is meant for
    /// display.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Refresh token missing or rejected; the session has been logged out.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// 401 on a request that was already retried once after a refresh.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // -----------------------------------------------------------------------
    // API
    // -----------------------------------------------------------------------
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// The task driving a shared operation was dropped before it settled.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    // -----------------------------------------------------------------------
    // Local
    // -----------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify a non-success HTTP status.
    ///
    /// 401 maps to [`Error::Unauthorized`]; callers that still have a retry
    /// available intercept 401 before reaching this.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Api { status, message },
        }
    }

    /// The HTTP status this error was classified from, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Server { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the user has to sign in again.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::SessionExpired(_) | Self::Unauthorized(_))
    }

    /// Returns true for 404, which edit flows read as "deleted elsewhere".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            tracing::error!(error = %err, "HTTP client error");
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Understands `{"detail": ".."}`, `{"error": ".."}` and field-keyed
/// validation errors such as `{"email": ["already taken"]}`.
pub(crate) fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    for key in ["detail", "error", "message"] {
        if let Some(text) = object.get(key).and_then(|v| v.as_str()) {
            return Some(text.to_string());
        }
    }

    object.iter().find_map(|(field, v)| {
        let first = match v {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Array(items) => items.first().and_then(|i| i.as_str()),
            _ => None,
        }?;
        if field == "non_field_errors" {
            Some(first.to_string())
        } else {
            Some(format!("{field}: {first}"))
        }
    })
}

/// Convenience type alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
