#![forbid(unsafe_code)]

pub mod config;
pub mod dashboard;
pub mod dialogs;
pub mod error;
pub mod notices;
pub mod report_sync;
pub mod retry;
pub mod session_clock;
pub mod session_store;

pub use attend_core::Clock;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, DashboardEvent, ExportedReport};
pub use dialogs::{DialogCoordinator, OpenStamps, VisibleView};
pub use error::{ErrorKind, StaleUpdate, UserError};
pub use notices::Notices;
pub use report_sync::{ReportSync, SyncOutcome};
pub use retry::{RetryDecision, RetryOutcome, RetryPolicy, classify_backend};
pub use session_clock::SessionClock;
pub use session_store::SessionStore;
