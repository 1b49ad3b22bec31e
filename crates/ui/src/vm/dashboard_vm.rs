use services::{Dashboard, Notices, VisibleView};

use crate::vm::report_vm::{ReportDetailVm, ReportRowVm, map_report_rows};
use crate::vm::session_vm::{QrVm, RosterVm};
use crate::vm::time_fmt::format_datetime;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoticeVm {
    pub success: Option<String>,
    pub error: Option<String>,
}

impl From<&Notices> for NoticeVm {
    fn from(notices: &Notices) -> Self {
        Self {
            success: notices.current_success().map(str::to_string),
            error: notices.current_error().map(|e| e.message.clone()),
        }
    }
}

/// Everything a front end needs for one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardVm {
    pub view: VisibleView,
    pub creating: bool,
    pub roster_loading: bool,
    pub qr: Option<QrVm>,
    pub roster: Option<RosterVm>,
    pub reports: Vec<ReportRowVm>,
    pub report_detail: Option<ReportDetailVm>,
    pub last_updated_str: Option<String>,
    pub notices: NoticeVm,
}

#[must_use]
pub fn map_dashboard(dashboard: &Dashboard) -> DashboardVm {
    let now = dashboard.clock().now();
    let view = dashboard.visible_view();
    let session = dashboard.session();

    DashboardVm {
        view,
        creating: dashboard.is_creating(),
        roster_loading: dashboard.roster_loading(),
        qr: session
            .filter(|_| view == VisibleView::Qr)
            .map(|s| QrVm::new(s, now)),
        roster: session
            .filter(|_| view == VisibleView::Roster)
            .and_then(RosterVm::new),
        reports: dashboard.reports().map(map_report_rows).unwrap_or_default(),
        report_detail: dashboard
            .selected_report()
            .filter(|_| view == VisibleView::ReportDetail)
            .map(ReportDetailVm::from),
        last_updated_str: dashboard.report_sync().last_updated().map(format_datetime),
        notices: NoticeVm::from(dashboard.notices()),
    }
}
