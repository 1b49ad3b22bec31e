use attend_core::model::{ReportSet, ReportSnapshot};

use crate::vm::time_fmt::format_percent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRowVm {
    pub subject: String,
    pub total_sessions: u32,
    pub student_count: usize,
}

impl From<&ReportSnapshot> for ReportRowVm {
    fn from(snapshot: &ReportSnapshot) -> Self {
        Self {
            subject: snapshot.subject().to_string(),
            total_sessions: snapshot.total_sessions,
            student_count: snapshot.student_count(),
        }
    }
}

#[must_use]
pub fn map_report_rows(reports: &ReportSet) -> Vec<ReportRowVm> {
    reports.iter().map(ReportRowVm::from).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudentRowVm {
    pub name: String,
    pub email: String,
    pub attendance_count: u32,
    pub percentage_str: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportDetailVm {
    pub subject: String,
    pub total_sessions: u32,
    pub students: Vec<StudentRowVm>,
}

impl From<&ReportSnapshot> for ReportDetailVm {
    fn from(snapshot: &ReportSnapshot) -> Self {
        let students = snapshot
            .student_percentages()
            .map(|(_, stats, percent)| StudentRowVm {
                name: stats.name.clone(),
                email: stats.email.clone(),
                attendance_count: stats.attendance_count,
                percentage_str: format_percent(percent),
            })
            .collect();
        Self {
            subject: snapshot.subject().to_string(),
            total_sessions: snapshot.total_sessions,
            students,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_core::model::StudentStats;
    use std::collections::BTreeMap;

    fn snapshot(total: u32, server_percentage: Option<f64>) -> ReportSnapshot {
        let mut students = BTreeMap::new();
        students.insert(
            "u1".to_string(),
            StudentStats {
                name: "Ada".into(),
                email: "ada@uni.edu".into(),
                attendance_count: 3,
                attendance_percentage: server_percentage,
            },
        );
        ReportSnapshot::new("Math", total, students)
    }

    #[test]
    fn detail_derives_missing_percentage() {
        let vm = ReportDetailVm::from(&snapshot(4, None));
        assert_eq!(vm.students[0].percentage_str, "75.0%");
    }

    #[test]
    fn detail_prefers_server_percentage() {
        let vm = ReportDetailVm::from(&snapshot(4, Some(80.0)));
        assert_eq!(vm.students[0].percentage_str, "80.0%");
    }

    #[test]
    fn zero_sessions_is_zero_percent() {
        let vm = ReportDetailVm::from(&snapshot(0, None));
        assert_eq!(vm.students[0].percentage_str, "0.0%");
    }

    #[test]
    fn rows_follow_subject_order() {
        let set = ReportSet::from_snapshots([
            ReportSnapshot::new("Physics", 2, BTreeMap::new()),
            snapshot(4, None),
        ]);
        let rows = map_report_rows(&set);
        let subjects: Vec<_> = rows.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, ["Math", "Physics"]);
        assert_eq!(rows[0].student_count, 1);
    }
}
