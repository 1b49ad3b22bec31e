use chrono::{DateTime, Utc};
use std::time::Duration;

use attend_core::model::{
    ExpiryReason, Roster, Session, SessionDraft, SessionId, SessionRequest,
};
use backend::{CreatedSession, SessionRoster};
use tracing::{debug, info};

use crate::error::{StaleUpdate, UserError};

/// Owner of the single current session.
///
/// Every asynchronous result is applied through an id check first, so work
/// started for a superseded session can never touch the new one.
pub struct SessionStore {
    current: Option<Session>,
    validity: chrono::Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(validity: Duration) -> Self {
        let validity = chrono::Duration::from_std(validity)
            .unwrap_or_else(|_| chrono::Duration::seconds(120));
        Self {
            current: None,
            validity,
        }
    }

    /// Validate create-session input before any request is issued.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` `UserError` when subject or classroom is blank.
    pub fn validate(draft: SessionDraft) -> Result<SessionRequest, UserError> {
        Ok(draft.validate()?)
    }

    /// Install a freshly created session as current, replacing any previous one.
    pub fn install(
        &mut self,
        request: &SessionRequest,
        created: CreatedSession,
        now: DateTime<Utc>,
    ) -> &Session {
        if let Some(previous) = self.current.as_ref() {
            debug!(session_id = %previous.id(), "discarding previous session");
        }
        info!(
            session_id = %created.session_id,
            subject = request.subject(),
            classroom = request.classroom(),
            "session created"
        );
        let session = Session::start(
            created.session_id,
            request,
            created.qr_payload,
            now,
            self.validity,
        );
        self.current.insert(session)
    }

    /// `Active → Expired` for the current session. Stale ids are rejected.
    ///
    /// # Errors
    ///
    /// Returns `StaleUpdate` if `id` is not current or the session is already expired.
    pub fn expire(&mut self, id: &SessionId, reason: ExpiryReason) -> Result<(), StaleUpdate> {
        let session = self.guard(id)?;
        session.expire(reason)?;
        info!(session_id = %id, ?reason, "session expired");
        Ok(())
    }

    /// Settle the roster from a successful fetch.
    ///
    /// Returns the informational notice to show when the server already
    /// considered the session expired.
    ///
    /// # Errors
    ///
    /// Returns `StaleUpdate` if `id` is not current or no fetch was pending.
    pub fn set_roster(
        &mut self,
        id: &SessionId,
        roster: SessionRoster,
    ) -> Result<Option<String>, StaleUpdate> {
        let session = self.guard(id)?;
        let roster = Roster::fetched(roster.students, roster.status);
        let notice = roster.server_expired.then(|| {
            format!(
                "This session has expired. Showing {} students who marked attendance.",
                roster.entries.len()
            )
        });
        let count = roster.entries.len();
        session.settle_roster(roster)?;
        info!(session_id = %id, students = count, "roster settled");
        Ok(notice)
    }

    /// Settle the roster as empty after a terminal fetch failure.
    ///
    /// # Errors
    ///
    /// Returns `StaleUpdate` if `id` is not current or no fetch was pending.
    pub fn fail_roster(&mut self, id: &SessionId, error: &UserError) -> Result<(), StaleUpdate> {
        let session = self.guard(id)?;
        session.settle_roster(Roster::failed())?;
        info!(session_id = %id, kind = ?error.kind, "roster fetch failed, showing empty roster");
        Ok(())
    }

    /// Drop the current session entirely.
    pub fn clear(&mut self) -> Option<Session> {
        let cleared = self.current.take();
        if let Some(session) = cleared.as_ref() {
            debug!(session_id = %session.id(), "session cleared");
        }
        cleared
    }

    #[must_use]
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    fn guard(&mut self, id: &SessionId) -> Result<&mut Session, StaleUpdate> {
        match self.current.as_mut() {
            None => Err(StaleUpdate::NoSession),
            Some(session) if session.id() != id => Err(StaleUpdate::Superseded(id.clone())),
            Some(session) => Ok(session),
        }
    }
}
