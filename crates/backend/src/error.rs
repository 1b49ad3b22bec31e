//! Error types for backend adapters.

use thiserror::Error;

/// Failures surfaced by an `AttendanceBackend`.
///
/// Transport details are flattened to strings so results can be cloned into
/// events and compared in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("server error (status {status})")]
    Server { status: u16, message: Option<String> },

    #[error("network error: {0}")]
    Network(String),

    #[error("empty result")]
    EmptyResult,

    #[error("unexpected status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Network failures and 5xx answers are worth retrying; everything else is terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Server { .. } | BackendError::Network(_))
    }

    /// Map a non-success HTTP status (plus the body's `message`, if any).
    #[must_use]
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            400 | 422 => {
                BackendError::Validation(message.unwrap_or_else(|| "invalid request".into()))
            }
            401 | 403 => BackendError::Forbidden,
            404 => BackendError::NotFound,
            500..=599 => BackendError::Server { status, message },
            _ => BackendError::Status { status, message },
        }
    }

    /// Server-provided message, when the response carried one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            BackendError::Validation(message) => Some(message),
            BackendError::Server { message, .. } | BackendError::Status { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return BackendError::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => BackendError::from_status(status.as_u16(), None),
            None => BackendError::Network(err.to_string()),
        }
    }
}

/// Errors raised while building a backend configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendConfigError {
    #[error("invalid base URL: {raw}")]
    InvalidBaseUrl { raw: String },
    #[error("ATTEND_TOKEN is not set")]
    MissingToken,
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}
