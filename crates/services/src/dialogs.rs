use attend_core::model::{RosterState, Session, SessionStatus};

/// The modal surface currently shown, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibleView {
    None,
    Qr,
    Roster,
    ReportDetail,
}

/// When each surface was last opened, from one monotonically increasing counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenStamps {
    pub session: Option<u64>,
    pub report: Option<u64>,
}

/// Derives the visible view from session and selection state. Holds no state.
///
/// Priority is QR, then roster, then report detail; when a session view and
/// the report detail compete, whichever was opened last wins.
pub struct DialogCoordinator;

impl DialogCoordinator {
    #[must_use]
    pub fn visible(session: Option<&Session>, stamps: OpenStamps) -> VisibleView {
        let session_view = session.and_then(Self::session_view);
        match (session_view, stamps.report) {
            (Some(view), Some(report_at)) => {
                if report_at > stamps.session.unwrap_or(0) {
                    VisibleView::ReportDetail
                } else {
                    view
                }
            }
            (Some(view), None) => view,
            (None, Some(_)) => VisibleView::ReportDetail,
            (None, None) => VisibleView::None,
        }
    }

    fn session_view(session: &Session) -> Option<VisibleView> {
        match (session.status(), session.roster()) {
            (SessionStatus::Active, _) => Some(VisibleView::Qr),
            (SessionStatus::Expired, RosterState::Loading) => None,
            (SessionStatus::Expired, _) => Some(VisibleView::Roster),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_core::model::{ExpiryReason, Roster, SessionDraft, SessionId};
    use attend_core::time::fixed_now;

    fn session() -> Session {
        let request = SessionDraft::new("Math", "Room 1").validate().unwrap();
        Session::start(
            SessionId::new("a"),
            &request,
            "qr:a",
            fixed_now(),
            chrono::Duration::seconds(120),
        )
    }

    fn stamps(session: Option<u64>, report: Option<u64>) -> OpenStamps {
        OpenStamps { session, report }
    }

    #[test]
    fn nothing_open() {
        assert_eq!(
            DialogCoordinator::visible(None, OpenStamps::default()),
            VisibleView::None
        );
    }

    #[test]
    fn follows_session_lifecycle() {
        let mut session = session();
        let s = stamps(Some(1), None);
        assert_eq!(DialogCoordinator::visible(Some(&session), s), VisibleView::Qr);

        session.expire(ExpiryReason::ClockElapsed).unwrap();
        assert_eq!(DialogCoordinator::visible(Some(&session), s), VisibleView::None);

        session.settle_roster(Roster::default()).unwrap();
        assert_eq!(DialogCoordinator::visible(Some(&session), s), VisibleView::Roster);
    }

    #[test]
    fn last_opened_wins() {
        let session = session();
        assert_eq!(
            DialogCoordinator::visible(Some(&session), stamps(Some(1), Some(2))),
            VisibleView::ReportDetail
        );
        assert_eq!(
            DialogCoordinator::visible(Some(&session), stamps(Some(3), Some(2))),
            VisibleView::Qr
        );
    }

    #[test]
    fn report_shows_while_roster_loads() {
        let mut session = session();
        session.expire(ExpiryReason::Dismissed).unwrap();
        assert_eq!(
            DialogCoordinator::visible(Some(&session), stamps(Some(3), Some(2))),
            VisibleView::ReportDetail
        );
    }
}
