use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SessionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionDraftError {
    #[error("Please fill in all fields")]
    MissingFields,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionTransitionError {
    #[error("session cannot move from {from:?} to {to:?}")]
    Status {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("roster is not awaiting a fetch result")]
    RosterNotLoading,
}

//
// ─── DRAFT ────────────────────────────────────────────────────────────────────
//

/// Unvalidated input for a new attendance session.
#[derive(Clone, Debug, Default)]
pub struct SessionDraft {
    pub subject: String,
    pub classroom: String,
}

/// Validated create-session input: both fields trimmed and non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRequest {
    subject: String,
    classroom: String,
}

impl SessionDraft {
    #[must_use]
    pub fn new(subject: impl Into<String>, classroom: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            classroom: classroom.into(),
        }
    }

    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `SessionDraftError::MissingFields` if either field is blank.
    pub fn validate(self) -> Result<SessionRequest, SessionDraftError> {
        let subject = self.subject.trim().to_string();
        let classroom = self.classroom.trim().to_string();
        if subject.is_empty() || classroom.is_empty() {
            return Err(SessionDraftError::MissingFields);
        }
        Ok(SessionRequest { subject, classroom })
    }
}

impl SessionRequest {
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn classroom(&self) -> &str {
        &self.classroom
    }
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Lifecycle status of a session, shared by the client model and the server payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
}

impl SessionStatus {
    /// Permitted status transitions. Only forward moves exist.
    #[must_use]
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!((self, next), (SessionStatus::Active, SessionStatus::Expired))
    }
}

/// What ended the active phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// The validity window elapsed.
    ClockElapsed,
    /// The operator closed the QR view early.
    Dismissed,
}

//
// ─── ROSTER ───────────────────────────────────────────────────────────────────
//

/// One student who registered attendance against a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "id")]
    pub student_id: String,
    pub name: String,
    pub email: String,
}

/// Terminal result of the post-expiry roster fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roster {
    pub entries: Vec<RosterEntry>,
    /// The server already considered the session expired when it answered.
    pub server_expired: bool,
    /// The fetch failed; `entries` is empty so the operator can still export.
    pub fetch_failed: bool,
}

impl Roster {
    #[must_use]
    pub fn fetched(entries: Vec<RosterEntry>, server_status: SessionStatus) -> Self {
        Self {
            entries,
            server_expired: server_status == SessionStatus::Expired,
            fetch_failed: false,
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            entries: Vec::new(),
            server_expired: false,
            fetch_failed: true,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterState {
    /// Session is still active; nothing has been requested.
    NotRequested,
    /// A fetch-and-retry chain is in flight.
    Loading,
    Settled(Roster),
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// A single QR issuance bound to a subject and classroom.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    subject: String,
    classroom: String,
    qr_payload: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: SessionStatus,
    expired_by: Option<ExpiryReason>,
    roster: RosterState,
}

impl Session {
    /// Build a freshly issued, active session.
    #[must_use]
    pub fn start(
        id: SessionId,
        request: &SessionRequest,
        qr_payload: impl Into<String>,
        created_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            id,
            subject: request.subject().to_string(),
            classroom: request.classroom().to_string(),
            qr_payload: qr_payload.into(),
            created_at,
            expires_at: created_at + validity,
            status: SessionStatus::Active,
            expired_by: None,
            roster: RosterState::NotRequested,
        }
    }

    /// Move the session to `Expired` and mark the roster as loading.
    ///
    /// # Errors
    ///
    /// Returns `SessionTransitionError::Status` if the session is not active.
    pub fn expire(&mut self, reason: ExpiryReason) -> Result<(), SessionTransitionError> {
        self.transition(SessionStatus::Expired)?;
        self.expired_by = Some(reason);
        self.roster = RosterState::Loading;
        Ok(())
    }

    /// Record the terminal roster fetch outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionTransitionError::RosterNotLoading` unless a fetch is pending.
    pub fn settle_roster(&mut self, roster: Roster) -> Result<(), SessionTransitionError> {
        if self.roster != RosterState::Loading {
            return Err(SessionTransitionError::RosterNotLoading);
        }
        self.roster = RosterState::Settled(roster);
        Ok(())
    }

    fn transition(&mut self, next: SessionStatus) -> Result<(), SessionTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(SessionTransitionError::Status {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Time left in the validity window, clamped at zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn classroom(&self) -> &str {
        &self.classroom
    }

    #[must_use]
    pub fn qr_payload(&self) -> &str {
        &self.qr_payload
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn expired_by(&self) -> Option<ExpiryReason> {
        self.expired_by
    }

    #[must_use]
    pub fn roster(&self) -> &RosterState {
        &self.roster
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn math_session() -> Session {
        let request = SessionDraft::new("Math", "Room 1").validate().unwrap();
        Session::start(
            SessionId::new("s-1"),
            &request,
            "qr:s-1",
            fixed_now(),
            Duration::seconds(120),
        )
    }

    #[test]
    fn draft_rejects_blank_fields() {
        assert_eq!(
            SessionDraft::new("Math", "  ").validate(),
            Err(SessionDraftError::MissingFields)
        );
        assert_eq!(
            SessionDraft::new("", "Room 1").validate(),
            Err(SessionDraftError::MissingFields)
        );
    }

    #[test]
    fn draft_trims_input() {
        let request = SessionDraft::new(" Math ", "Room 1\n").validate().unwrap();
        assert_eq!(request.subject(), "Math");
        assert_eq!(request.classroom(), "Room 1");
    }

    #[test]
    fn only_active_to_expired_is_permitted() {
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Expired));
        assert!(!SessionStatus::Expired.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Active.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Expired.can_transition_to(SessionStatus::Expired));
    }

    #[test]
    fn session_expires_once() {
        let mut session = math_session();
        assert_eq!(session.expires_at() - session.created_at(), Duration::seconds(120));

        session.expire(ExpiryReason::Dismissed).unwrap();
        assert_eq!(session.status(), SessionStatus::Expired);
        assert_eq!(session.roster(), &RosterState::Loading);

        let err = session.expire(ExpiryReason::ClockElapsed).unwrap_err();
        assert_eq!(
            err,
            SessionTransitionError::Status {
                from: SessionStatus::Expired,
                to: SessionStatus::Expired,
            }
        );
        assert_eq!(session.expired_by(), Some(ExpiryReason::Dismissed));
    }

    #[test]
    fn roster_settles_only_while_loading() {
        let mut session = math_session();
        assert!(session.settle_roster(Roster::failed()).is_err());

        session.expire(ExpiryReason::ClockElapsed).unwrap();
        session.settle_roster(Roster::failed()).unwrap();
        assert!(matches!(session.roster(), RosterState::Settled(r) if r.fetch_failed));
        assert!(session.settle_roster(Roster::default()).is_err());
    }

    #[test]
    fn remaining_is_clamped() {
        let session = math_session();
        let now = fixed_now() + Duration::seconds(30);
        assert_eq!(session.remaining(now), Duration::seconds(90));
        assert_eq!(
            session.remaining(fixed_now() + Duration::minutes(5)),
            Duration::zero()
        );
    }

    #[test]
    fn roster_entry_reads_wire_id() {
        let entry: RosterEntry =
            serde_json::from_str(r#"{"id":"u1","name":"Ada","email":"ada@uni.edu"}"#).unwrap();
        assert_eq!(entry.student_id, "u1");
    }
}
