use chrono::{DateTime, Utc};

use attend_core::model::{ReportSet, ReportSnapshot};
use backend::{AttendanceBackend, BackendError};
use tracing::{debug, info, warn};

use crate::error::UserError;

/// Result of applying one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The set differed from the cache and replaced it.
    Published,
    /// Deep-equal to the cache; nothing downstream needs to change.
    Unchanged,
    Failed(UserError),
}

/// Cached report set plus the non-overlapping poll gate.
#[derive(Debug, Default)]
pub struct ReportSync {
    cache: Option<ReportSet>,
    last_updated: Option<DateTime<Utc>>,
    in_flight: bool,
    publishes: u64,
}

impl ReportSync {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One fetch of the full report set.
    ///
    /// # Errors
    ///
    /// Returns the backend failure unchanged.
    pub async fn poll_once(backend: &dyn AttendanceBackend) -> Result<ReportSet, BackendError> {
        backend.get_report_set().await
    }

    /// Claim the poll slot. Returns `false` (skip this tick) if a poll is outstanding.
    pub fn begin_poll(&mut self) -> bool {
        if self.in_flight {
            debug!("report poll still in flight, skipping tick");
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Release the poll slot and apply its result.
    pub fn finish_poll(
        &mut self,
        result: Result<ReportSet, BackendError>,
        now: DateTime<Utc>,
    ) -> SyncOutcome {
        self.in_flight = false;
        match result {
            Ok(next) => {
                if self.apply(next, now) {
                    SyncOutcome::Published
                } else {
                    SyncOutcome::Unchanged
                }
            }
            Err(err) => {
                warn!(error = %err, "report poll failed");
                SyncOutcome::Failed(UserError::from_backend(&err, "Failed to fetch reports"))
            }
        }
    }

    /// Replace the cache if `next` differs from it. Returns whether it published.
    pub fn apply(&mut self, next: ReportSet, now: DateTime<Utc>) -> bool {
        if self.cache.as_ref() == Some(&next) {
            return false;
        }
        info!(subjects = next.len(), "reports updated");
        self.cache = Some(next);
        self.last_updated = Some(now);
        self.publishes += 1;
        true
    }

    /// Refresh an open detail view from the cache.
    ///
    /// Returns `false` and leaves `selected` untouched if its subject is gone.
    pub fn refresh_selection(&self, selected: &mut ReportSnapshot) -> bool {
        match self.cache.as_ref().and_then(|c| c.get(selected.subject())) {
            Some(fresh) => {
                if *fresh != *selected {
                    *selected = fresh.clone();
                }
                true
            }
            None => {
                debug!(
                    subject = selected.subject(),
                    "selected report missing from poll, keeping stale view"
                );
                false
            }
        }
    }

    #[must_use]
    pub fn reports(&self) -> Option<&ReportSet> {
        self.cache.as_ref()
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub fn publish_count(&self) -> u64 {
        self.publishes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_core::model::StudentStats;
    use attend_core::time::fixed_now;
    use std::collections::BTreeMap;

    fn report_set(count: u32) -> ReportSet {
        let mut students = BTreeMap::new();
        students.insert(
            "u1".to_string(),
            StudentStats {
                name: "Ada".into(),
                email: "ada@uni.edu".into(),
                attendance_count: count,
                attendance_percentage: None,
            },
        );
        ReportSet::from_snapshots([ReportSnapshot::new("Math", 4, students)])
    }

    #[test]
    fn identical_poll_does_not_publish() {
        let mut sync = ReportSync::new();
        let t0 = fixed_now();
        let t1 = t0 + chrono::Duration::seconds(5);

        assert!(sync.begin_poll());
        assert_eq!(sync.finish_poll(Ok(report_set(1)), t0), SyncOutcome::Published);

        assert!(sync.begin_poll());
        assert_eq!(sync.finish_poll(Ok(report_set(1)), t1), SyncOutcome::Unchanged);
        assert_eq!(sync.last_updated(), Some(t0));
        assert_eq!(sync.reports(), Some(&report_set(1)));
        assert_eq!(sync.publish_count(), 1);
    }

    #[test]
    fn changed_poll_publishes_and_advances_timestamp() {
        let mut sync = ReportSync::new();
        let t0 = fixed_now();
        let t1 = t0 + chrono::Duration::seconds(5);

        sync.apply(report_set(1), t0);
        assert!(sync.apply(report_set(2), t1));
        assert_eq!(sync.last_updated(), Some(t1));
        assert_eq!(sync.reports(), Some(&report_set(2)));
    }

    #[test]
    fn first_poll_publishes_even_when_empty() {
        let mut sync = ReportSync::new();
        assert!(sync.apply(ReportSet::new(), fixed_now()));
        assert!(!sync.apply(ReportSet::new(), fixed_now()));
    }

    #[test]
    fn overlapping_poll_is_skipped() {
        let mut sync = ReportSync::new();
        assert!(sync.begin_poll());
        assert!(!sync.begin_poll());
        assert!(sync.is_polling());

        let outcome = sync.finish_poll(
            Err(BackendError::Server {
                status: 503,
                message: None,
            }),
            fixed_now(),
        );
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert!(!sync.is_polling());
        assert!(sync.begin_poll());
    }

    #[test]
    fn failed_poll_keeps_cache() {
        let mut sync = ReportSync::new();
        sync.apply(report_set(1), fixed_now());
        sync.begin_poll();
        sync.finish_poll(Err(BackendError::Network("reset".into())), fixed_now());
        assert_eq!(sync.reports(), Some(&report_set(1)));
    }

    #[test]
    fn selection_refreshes_or_stays_stale() {
        let mut sync = ReportSync::new();
        sync.apply(report_set(1), fixed_now());
        let mut selected = report_set(1).get("Math").unwrap().clone();

        sync.apply(report_set(3), fixed_now());
        assert!(sync.refresh_selection(&mut selected));
        assert_eq!(selected.students["u1"].attendance_count, 3);

        sync.apply(ReportSet::new(), fixed_now());
        assert!(!sync.refresh_selection(&mut selected));
        assert_eq!(selected.students["u1"].attendance_count, 3);
    }
}
