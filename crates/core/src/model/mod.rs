mod ids;
mod report;
mod session;

pub use ids::{ParseIdError, SessionId};
pub use report::{ReportSet, ReportSnapshot, StudentStats, derive_percentage};
pub use session::{
    ExpiryReason, Roster, RosterEntry, RosterState, Session, SessionDraft, SessionDraftError,
    SessionRequest, SessionStatus, SessionTransitionError,
};
