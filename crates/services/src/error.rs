//! Shared error types for the services crate.

use thiserror::Error;

use attend_core::model::{SessionDraftError, SessionId, SessionTransitionError};
use backend::BackendError;

/// Machine-readable class of a user-facing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    TransientServer,
    Network,
    EmptyResult,
    Decode,
    Busy,
    Unexpected,
}

impl From<&BackendError> for ErrorKind {
    fn from(err: &BackendError) -> Self {
        match err {
            BackendError::Validation(_) => ErrorKind::Validation,
            BackendError::NotFound => ErrorKind::NotFound,
            BackendError::Forbidden => ErrorKind::Forbidden,
            BackendError::Server { .. } => ErrorKind::TransientServer,
            BackendError::Network(_) => ErrorKind::Network,
            BackendError::EmptyResult => ErrorKind::EmptyResult,
            BackendError::Decode(_) => ErrorKind::Decode,
            _ => ErrorKind::Unexpected,
        }
    }
}

/// A failure as the operator sees it: one message plus its kind.
///
/// Raw transport errors never leave the services layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UserError {
    pub kind: ErrorKind,
    pub message: String,
}

impl UserError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Generic mapping: prefer the server's own message, else `fallback`.
    #[must_use]
    pub fn from_backend(err: &BackendError, fallback: &str) -> Self {
        let message = err.server_message().unwrap_or(fallback);
        Self::new(ErrorKind::from(err), message)
    }

    /// Terminal roster fetch failure, after any retries.
    #[must_use]
    pub fn roster(err: &BackendError) -> Self {
        let kind = ErrorKind::from(err);
        let message = match err {
            BackendError::NotFound => "Session not found. It may have been deleted.",
            BackendError::Forbidden => "You do not have access to this session.",
            BackendError::Server { .. } => {
                "Server error when fetching session. Please try again later."
            }
            BackendError::Network(_) => "Network error when fetching session details.",
            other => other.server_message().unwrap_or("Failed to fetch session details"),
        };
        Self::new(kind, message)
    }

    /// Spreadsheet export failure.
    #[must_use]
    pub fn export(err: &BackendError) -> Self {
        let kind = ErrorKind::from(err);
        match err {
            BackendError::EmptyResult => Self::new(kind, "Received empty Excel file"),
            BackendError::Network(_) => Self::new(kind, "Network error during Excel download"),
            BackendError::NotFound => {
                Self::new(kind, "Failed to download Excel file (Status: 404)")
            }
            BackendError::Forbidden => {
                Self::new(kind, "Failed to download Excel file (Status: 403)")
            }
            BackendError::Server { status, .. } | BackendError::Status { status, .. } => {
                Self::new(kind, format!("Failed to download Excel file (Status: {status})"))
            }
            other => Self::from_backend(other, "Failed to download Excel file"),
        }
    }
}

impl From<SessionDraftError> for UserError {
    fn from(err: SessionDraftError) -> Self {
        Self::new(ErrorKind::Validation, err.to_string())
    }
}

/// Why an asynchronous result was not applied to the session store.
///
/// These are expected outcomes of superseded timers and retry chains, not faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StaleUpdate {
    #[error("no current session")]
    NoSession,
    #[error("session {0} is no longer current")]
    Superseded(SessionId),
    #[error(transparent)]
    Transition(#[from] SessionTransitionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_messages_distinguish_deleted_from_no_access() {
        let deleted = UserError::roster(&BackendError::NotFound);
        let denied = UserError::roster(&BackendError::Forbidden);
        assert_eq!(deleted.kind, ErrorKind::NotFound);
        assert_eq!(denied.kind, ErrorKind::Forbidden);
        assert_ne!(deleted.message, denied.message);
    }

    #[test]
    fn export_reports_status() {
        let err = UserError::export(&BackendError::Server {
            status: 502,
            message: None,
        });
        assert_eq!(err.message, "Failed to download Excel file (Status: 502)");
        assert_eq!(
            UserError::export(&BackendError::EmptyResult).kind,
            ErrorKind::EmptyResult
        );
    }

    #[test]
    fn generic_mapping_prefers_server_message() {
        let err = BackendError::Validation("Subject is required".into());
        assert_eq!(
            UserError::from_backend(&err, "Failed to generate QR code").message,
            "Subject is required"
        );
        let err = BackendError::Network("connection reset".into());
        assert_eq!(
            UserError::from_backend(&err, "Failed to fetch reports").message,
            "Failed to fetch reports"
        );
    }
}
