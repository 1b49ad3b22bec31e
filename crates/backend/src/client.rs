use async_trait::async_trait;
use attend_core::model::{ReportSet, RosterEntry, SessionId, SessionRequest, SessionStatus};
use serde::Deserialize;

use crate::error::BackendError;

/// What the server hands back for a freshly generated QR session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: SessionId,
    #[serde(rename = "qrCode")]
    pub qr_payload: String,
}

/// Server view of a session and who registered against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRoster {
    pub status: SessionStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub students: Vec<RosterEntry>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<RosterEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<RosterEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Operations the dashboard consumes from the attendance server.
///
/// Transport-agnostic: implementations decide how requests travel and how
/// authentication is attached.
#[async_trait]
pub trait AttendanceBackend: Send + Sync {
    /// Issue a new QR session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Validation` if the server rejects the input,
    /// or a transport error.
    async fn create_session(&self, request: &SessionRequest)
    -> Result<CreatedSession, BackendError>;

    /// Fetch the roster for a session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound`/`Forbidden` for terminal failures and
    /// `Server`/`Network` for transient ones.
    async fn get_session_roster(&self, id: &SessionId) -> Result<SessionRoster, BackendError>;

    /// Fetch every subject report visible to the caller.
    ///
    /// # Errors
    ///
    /// Returns a transport or decode error.
    async fn get_report_set(&self) -> Result<ReportSet, BackendError>;

    /// Download the spreadsheet export for a session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::EmptyResult` for a zero-byte file, or a transport error.
    async fn export_session_report(&self, id: &SessionId) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_session_reads_wire_names() {
        let created: CreatedSession =
            serde_json::from_str(r#"{"sessionId":"abc","qrCode":"data:image/png;base64,xyz"}"#)
                .unwrap();
        assert_eq!(created.session_id, SessionId::new("abc"));
        assert_eq!(created.qr_payload, "data:image/png;base64,xyz");
    }

    #[test]
    fn roster_tolerates_null_students() {
        let roster: SessionRoster =
            serde_json::from_str(r#"{"status":"expired","students":null}"#).unwrap();
        assert_eq!(roster.status, SessionStatus::Expired);
        assert!(roster.students.is_empty());

        let roster: SessionRoster = serde_json::from_str(r#"{"status":"active"}"#).unwrap();
        assert!(roster.students.is_empty());
    }
}
