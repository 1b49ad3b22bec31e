use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

//
// ─── STUDENT STATS ────────────────────────────────────────────────────────────
//

/// Per-student attendance figures inside one subject report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub name: String,
    pub email: String,
    pub attendance_count: u32,
    /// Server-supplied percentage. Absent values are derived on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_percentage: Option<f64>,
}

impl StudentStats {
    /// Percentage as the server reported it, or derived from the counts.
    ///
    /// A subject with no sessions yields `0.0`.
    #[must_use]
    pub fn effective_percentage(&self, total_sessions: u32) -> f64 {
        self.attendance_percentage
            .unwrap_or_else(|| derive_percentage(self.attendance_count, total_sessions))
    }
}

/// `count / total * 100`, or `0.0` when `total` is zero.
#[must_use]
pub fn derive_percentage(attendance_count: u32, total_sessions: u32) -> f64 {
    if total_sessions == 0 {
        return 0.0;
    }
    f64::from(attendance_count) / f64::from(total_sessions) * 100.0
}

//
// ─── SNAPSHOTS ────────────────────────────────────────────────────────────────
//

/// Aggregate attendance for one subject as of a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    #[serde(skip)]
    subject: String,
    pub total_sessions: u32,
    #[serde(default)]
    pub students: BTreeMap<String, StudentStats>,
}

impl ReportSnapshot {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        total_sessions: u32,
        students: BTreeMap<String, StudentStats>,
    ) -> Self {
        Self {
            subject: subject.into(),
            total_sessions,
            students,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    /// Students with their effective percentage, ordered by student id.
    pub fn student_percentages(&self) -> impl Iterator<Item = (&str, &StudentStats, f64)> {
        self.students.iter().map(|(id, stats)| {
            (
                id.as_str(),
                stats,
                stats.effective_percentage(self.total_sessions),
            )
        })
    }
}

/// Every subject report from one poll, keyed by subject.
///
/// Replaced wholesale on publish; equality is deep and structural.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ReportSet(BTreeMap<String, ReportSnapshot>);

impl ReportSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = ReportSnapshot>) -> Self {
        Self(
            snapshots
                .into_iter()
                .map(|snapshot| (snapshot.subject.clone(), snapshot))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, subject: &str) -> Option<&ReportSnapshot> {
        self.0.get(subject)
    }

    pub fn get_mut(&mut self, subject: &str) -> Option<&mut ReportSnapshot> {
        self.0.get_mut(subject)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportSnapshot> {
        self.0.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// The subject lives in the map key on the wire; copy it into each snapshot.
impl<'de> Deserialize<'de> for ReportSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut raw = BTreeMap::<String, ReportSnapshot>::deserialize(deserializer)?;
        for (subject, snapshot) in &mut raw {
            snapshot.subject.clone_from(subject);
        }
        Ok(Self(raw))
    }
}
