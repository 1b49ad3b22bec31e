mod dashboard_vm;
mod report_vm;
mod session_vm;
mod time_fmt;

pub use dashboard_vm::{DashboardVm, NoticeVm, map_dashboard};
pub use report_vm::{ReportDetailVm, ReportRowVm, StudentRowVm, map_report_rows};
pub use session_vm::{EMPTY_ROSTER_MESSAGE, QrVm, RosterRowVm, RosterVm};
pub use time_fmt::{format_countdown, format_datetime, format_percent};
