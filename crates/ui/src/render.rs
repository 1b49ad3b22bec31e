use std::fmt::Write;

use services::VisibleView;

use crate::vm::{DashboardVm, QrVm, ReportDetailVm, RosterVm};

/// Plain-text frame for terminal front ends.
#[must_use]
pub fn render_dashboard(vm: &DashboardVm) -> String {
    let mut out = String::new();

    if let Some(message) = &vm.notices.success {
        let _ = writeln!(out, "[ok] {message}");
    }
    if let Some(message) = &vm.notices.error {
        let _ = writeln!(out, "[error] {message}");
    }
    if vm.creating {
        out.push_str("Generating QR code...\n");
    }
    if vm.roster_loading {
        out.push_str("Session expired. Fetching attendance...\n");
    }

    match vm.view {
        VisibleView::Qr => {
            if let Some(qr) = &vm.qr {
                render_qr(&mut out, qr);
            }
        }
        VisibleView::Roster => {
            if let Some(roster) = &vm.roster {
                render_roster(&mut out, roster);
            }
        }
        VisibleView::ReportDetail => {
            if let Some(detail) = &vm.report_detail {
                render_detail(&mut out, detail);
            }
        }
        VisibleView::None => {}
    }

    render_reports(&mut out, vm);
    out
}

fn render_qr(out: &mut String, qr: &QrVm) {
    let _ = writeln!(out, "== {} / {} ==", qr.subject, qr.classroom);
    let _ = writeln!(out, "QR: {}", qr.qr_payload);
    let _ = writeln!(out, "Expires in {} ({})", qr.remaining_str, qr.expires_at_str);
}

fn render_roster(out: &mut String, roster: &RosterVm) {
    let _ = writeln!(
        out,
        "== Attendance: {} / {} ({} students) ==",
        roster.subject,
        roster.classroom,
        roster.rows.len()
    );
    if let Some(message) = roster.empty_message {
        let _ = writeln!(out, "{message}");
    }
    for row in &roster.rows {
        let _ = writeln!(out, "  {:<12} {:<24} {}", row.student_id, row.name, row.email);
    }
    if roster.export_enabled {
        let _ = writeln!(out, "Export available for session {}", roster.session_id);
    }
}

fn render_detail(out: &mut String, detail: &ReportDetailVm) {
    let _ = writeln!(
        out,
        "== {} ({} sessions) ==",
        detail.subject, detail.total_sessions
    );
    for student in &detail.students {
        let _ = writeln!(
            out,
            "  {:<24} {:<28} {:>3} {:>7}",
            student.name, student.email, student.attendance_count, student.percentage_str
        );
    }
}

fn render_reports(out: &mut String, vm: &DashboardVm) {
    if vm.reports.is_empty() {
        return;
    }
    out.push_str("-- Reports --\n");
    for row in &vm.reports {
        let _ = writeln!(
            out,
            "  {:<20} {:>3} sessions {:>4} students",
            row.subject, row.total_sessions, row.student_count
        );
    }
    if let Some(updated) = &vm.last_updated_str {
        let _ = writeln!(out, "Last updated {updated}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{EMPTY_ROSTER_MESSAGE, NoticeVm, ReportRowVm, RosterVm};

    fn empty_vm(view: VisibleView) -> DashboardVm {
        DashboardVm {
            view,
            creating: false,
            roster_loading: false,
            qr: None,
            roster: None,
            reports: Vec::new(),
            report_detail: None,
            last_updated_str: None,
            notices: NoticeVm::default(),
        }
    }

    #[test]
    fn empty_roster_renders_message_and_export() {
        let mut vm = empty_vm(VisibleView::Roster);
        vm.roster = Some(RosterVm {
            session_id: "abc".into(),
            subject: "Math".into(),
            classroom: "Room 1".into(),
            rows: Vec::new(),
            empty_message: Some(EMPTY_ROSTER_MESSAGE),
            fetch_failed: true,
            export_enabled: true,
        });
        vm.notices.error = Some("Session not found. It may have been deleted.".into());

        let text = render_dashboard(&vm);
        assert!(text.starts_with("[error] Session not found."));
        assert!(text.contains(EMPTY_ROSTER_MESSAGE));
        assert!(text.contains("Export available for session abc"));
    }

    #[test]
    fn reports_listed_after_view() {
        let mut vm = empty_vm(VisibleView::None);
        vm.reports.push(ReportRowVm {
            subject: "Math".into(),
            total_sessions: 4,
            student_count: 2,
        });
        vm.last_updated_str = Some("2023-11-14T22:13:20+00:00".into());

        let text = render_dashboard(&vm);
        assert!(text.contains("-- Reports --"));
        assert!(text.contains("Math"));
        assert!(text.ends_with("Last updated 2023-11-14T22:13:20+00:00\n"));
    }

    #[test]
    fn nothing_to_show_is_empty() {
        assert_eq!(render_dashboard(&empty_vm(VisibleView::None)), "");
    }
}
