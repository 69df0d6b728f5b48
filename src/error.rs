//! Error types
//!
//! Typed failures for locator parsing, configuration resolution, provider
//! dispatch, and backend operations.

use thiserror::Error;

/// Errors surfaced by gcpio operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The locator URL is malformed or names no bucket/topic.
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    /// No provider is registered for the locator's scheme.
    #[error("no provider registered for scheme '{0}'")]
    UnknownScheme(String),

    /// No configuration tier matched and the backend cannot proceed without one.
    #[error("no configuration resolved for '{0}'")]
    UnresolvedConfig(String),

    /// The target of a create/mkdir call is already present.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The operation is not meaningful for this backend.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A receive call timed out with nothing collected.
    ///
    /// This is a normal outcome of polling an idle subscription; callers are
    /// expected to retry on their own schedule.
    #[error("no messages found")]
    NoMessagesFound,

    /// Non-success response from a Google API, surfaced verbatim.
    #[error("API request failed: {status} {message}")]
    Api { status: u16, message: String },

    /// Token acquisition failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] gcp_auth::Error),

    /// HTTP transport failure.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the backend reported the object or resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
