use attend_core::model::{Roster, RosterEntry, RosterState, Session};
use chrono::{DateTime, Utc};

use crate::vm::time_fmt::{format_countdown, format_datetime};

pub const EMPTY_ROSTER_MESSAGE: &str = "No students marked attendance for this session.";

/// The live QR panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrVm {
    pub session_id: String,
    pub subject: String,
    pub classroom: String,
    pub qr_payload: String,
    pub remaining_str: String,
    pub expires_at_str: String,
}

impl QrVm {
    #[must_use]
    pub fn new(session: &Session, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.id().to_string(),
            subject: session.subject().to_string(),
            classroom: session.classroom().to_string(),
            qr_payload: session.qr_payload().to_string(),
            remaining_str: format_countdown(session.remaining(now)),
            expires_at_str: format_datetime(session.expires_at()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterRowVm {
    pub student_id: String,
    pub name: String,
    pub email: String,
}

impl From<&RosterEntry> for RosterRowVm {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            student_id: entry.student_id.clone(),
            name: entry.name.clone(),
            email: entry.email.clone(),
        }
    }
}

/// Post-expiry roster panel. Export stays enabled even for an empty or failed roster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterVm {
    pub session_id: String,
    pub subject: String,
    pub classroom: String,
    pub rows: Vec<RosterRowVm>,
    pub empty_message: Option<&'static str>,
    pub fetch_failed: bool,
    pub export_enabled: bool,
}

impl RosterVm {
    /// `None` unless the session's roster has settled.
    #[must_use]
    pub fn new(session: &Session) -> Option<Self> {
        let RosterState::Settled(roster) = session.roster() else {
            return None;
        };
        Some(Self::from_roster(session, roster))
    }

    fn from_roster(session: &Session, roster: &Roster) -> Self {
        Self {
            session_id: session.id().to_string(),
            subject: session.subject().to_string(),
            classroom: session.classroom().to_string(),
            rows: roster.entries.iter().map(RosterRowVm::from).collect(),
            empty_message: roster.is_empty().then_some(EMPTY_ROSTER_MESSAGE),
            fetch_failed: roster.fetch_failed,
            export_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_core::model::{ExpiryReason, SessionDraft, SessionId, SessionStatus};
    use attend_core::time::fixed_now;

    fn session() -> Session {
        let request = SessionDraft::new(" Math ", "Room 1").validate().unwrap();
        Session::start(
            SessionId::new("abc"),
            &request,
            "attendance:abc",
            fixed_now(),
            chrono::Duration::seconds(120),
        )
    }

    #[test]
    fn qr_counts_down() {
        let session = session();
        let vm = QrVm::new(&session, fixed_now() + chrono::Duration::seconds(30));
        assert_eq!(vm.subject, "Math");
        assert_eq!(vm.remaining_str, "01:30");
        assert_eq!(vm.qr_payload, "attendance:abc");
    }

    #[test]
    fn roster_hidden_until_settled() {
        let mut session = session();
        assert!(RosterVm::new(&session).is_none());
        session.expire(ExpiryReason::ClockElapsed).unwrap();
        assert!(RosterVm::new(&session).is_none());
    }

    #[test]
    fn empty_roster_keeps_export() {
        let mut session = session();
        session.expire(ExpiryReason::ClockElapsed).unwrap();
        session
            .settle_roster(Roster::fetched(Vec::new(), SessionStatus::Expired))
            .unwrap();

        let vm = RosterVm::new(&session).unwrap();
        assert!(vm.rows.is_empty());
        assert_eq!(vm.empty_message, Some(EMPTY_ROSTER_MESSAGE));
        assert!(vm.export_enabled);
        assert!(!vm.fetch_failed);
    }
}
