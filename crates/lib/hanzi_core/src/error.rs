//! Client error types.
//!
//! Every repository, gateway and pipeline call returns [`Result`]. Controllers
//! record the message of a failed call and otherwise leave their state alone;
//! nothing in the crate retries automatically.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Client-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A session is required but nobody is signed in.
    #[error("Not signed in")]
    Unauthenticated,

    /// The identity provider rejected the request (bad credentials, duplicate sign-up, ...).
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A required field is missing or out of range. Raised before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A device permission was refused.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The request did not complete before its deadline and was aborted.
    /// Carries the deadline when the caller set it.
    #[error("Request timed out{}", deadline_suffix(.0))]
    Timeout(Option<Duration>),

    /// The server could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The relational or object store rejected the operation.
    #[error("Store error: {0}")]
    Store(String),

    /// An application API answered with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Required configuration is missing or malformed.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures where retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Network(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not expose the configured deadline on the error.
            Error::Timeout(None)
        } else if e.is_decode() {
            Error::Decode(e.to_string())
        } else if e.is_connect() || e.is_request() || e.is_body() {
            Error::Network(e.to_string())
        } else if let Some(status) = e.status() {
            Error::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            Error::Network(e.to_string())
        }
    }
}

fn deadline_suffix(deadline: &Option<Duration>) -> String {
    deadline
        .map(|d| format!(" after {}ms", d.as_millis()))
        .unwrap_or_default()
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Decode(format!("invalid base64 image data: {e}"))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {e}"))
    }
}
