use std::sync::Arc;
use std::time::Duration;

use attend_core::Clock;
use attend_core::model::{
    ExpiryReason, ReportSet, ReportSnapshot, RosterState, Session, SessionDraft, SessionId,
    SessionRequest, SessionStatus,
};
use backend::{AttendanceBackend, BackendError, CreatedSession, SessionRoster};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{DashboardConfig, MIN_POLL_INTERVAL};
use crate::dialogs::{DialogCoordinator, OpenStamps, VisibleView};
use crate::error::{ErrorKind, UserError};
use crate::notices::Notices;
use crate::report_sync::{ReportSync, SyncOutcome};
use crate::retry::classify_backend;
use crate::session_clock::SessionClock;
use crate::session_store::SessionStore;

/// Completions posted back to the dashboard by its timers and background requests.
#[derive(Debug)]
pub enum DashboardEvent {
    SessionCreated {
        request: SessionRequest,
        outcome: Result<CreatedSession, BackendError>,
    },
    SessionExpired(SessionId),
    RosterSettled {
        session_id: SessionId,
        outcome: Result<SessionRoster, BackendError>,
        attempts: u32,
    },
    PollTick,
    ReportsFetched(Result<ReportSet, BackendError>),
    ExportFinished {
        session_id: SessionId,
        outcome: Result<Vec<u8>, BackendError>,
    },
}

/// A downloaded spreadsheet, ready to be written wherever the caller likes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The faculty dashboard engine.
///
/// One task owns this value and is its only writer. Timers, retry chains and
/// polls run as spawned tasks that report back through `DashboardEvent`s;
/// [`Dashboard::handle`] applies them after checking they are still relevant.
pub struct Dashboard {
    backend: Arc<dyn AttendanceBackend>,
    config: DashboardConfig,
    clock: Clock,
    store: SessionStore,
    session_clock: SessionClock,
    sync: ReportSync,
    selected: Option<ReportSnapshot>,
    notices: Notices,
    creating: bool,
    exporting: Option<SessionId>,
    finished_export: Option<Result<ExportedReport, UserError>>,
    stamps: OpenStamps,
    next_stamp: u64,
    events_tx: UnboundedSender<DashboardEvent>,
    events_rx: UnboundedReceiver<DashboardEvent>,
    ticker: Option<JoinHandle<()>>,
}

impl Dashboard {
    #[must_use]
    pub fn new(backend: Arc<dyn AttendanceBackend>, config: DashboardConfig, clock: Clock) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            store: SessionStore::new(config.qr_validity),
            config,
            clock,
            session_clock: SessionClock::new(),
            sync: ReportSync::new(),
            selected: None,
            notices: Notices::new(),
            creating: false,
            exporting: None,
            finished_export: None,
            stamps: OpenStamps::default(),
            next_stamp: 0,
            events_tx,
            events_rx,
            ticker: None,
        }
    }

    //
    // ─── SESSION LIFECYCLE ─────────────────────────────────────────────────────
    //

    /// Validate the input and issue the create-session request in the background.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for blank fields and `Busy` while a
    /// previous request is outstanding.
    pub fn create_session(&mut self, draft: SessionDraft) -> Result<(), UserError> {
        let request = match SessionStore::validate(draft) {
            Ok(request) => request,
            Err(err) => {
                self.notices.error(err.clone());
                return Err(err);
            }
        };
        if self.creating {
            return Err(UserError::new(
                ErrorKind::Busy,
                "A QR code is already being generated.",
            ));
        }

        self.creating = true;
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = backend.create_session(&request).await;
            let _ = events.send(DashboardEvent::SessionCreated { request, outcome });
        });
        Ok(())
    }

    fn on_session_created(
        &mut self,
        request: SessionRequest,
        outcome: Result<CreatedSession, BackendError>,
    ) {
        self.creating = false;
        let created = match outcome {
            Ok(created) => created,
            Err(err) => {
                warn!(error = %err, "create session failed");
                self.notices
                    .error(UserError::from_backend(&err, "Failed to generate QR code"));
                return;
            }
        };

        self.session_clock.disarm();
        let now = self.clock.now();
        let session_id = self.store.install(&request, created, now).id().clone();
        self.session_clock
            .arm(session_id, self.config.qr_validity, &self.events_tx);
        self.stamps.session = Some(self.stamp());
        self.notices.success("QR code generated successfully!");
        self.request_poll();
    }

    /// Operator closed the QR view early: expire now and fetch the roster without delay.
    pub fn close_qr_view(&mut self) {
        let Some(id) = self
            .store
            .current()
            .filter(|s| s.is_active())
            .map(|s| s.id().clone())
        else {
            return;
        };
        self.session_clock.disarm();
        if self.store.expire(&id, ExpiryReason::Dismissed).is_ok() {
            self.start_roster_fetch(id, Duration::ZERO);
        }
    }

    fn on_session_expired(&mut self, id: &SessionId) {
        match self.store.expire(id, ExpiryReason::ClockElapsed) {
            Ok(()) => {
                self.session_clock.disarm();
                self.start_roster_fetch(id.clone(), self.config.roster_settle_delay);
            }
            Err(stale) => debug!(session_id = %id, %stale, "ignoring expiry"),
        }
    }

    fn start_roster_fetch(&mut self, id: SessionId, settle: Duration) {
        self.notices.dismiss_error();
        let backend = Arc::clone(&self.backend);
        let policy = self.config.retry;
        let events = self.events_tx.clone();
        debug!(session_id = %id, ?settle, "starting roster fetch");
        tokio::spawn(async move {
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            let outcome = policy
                .run(
                    |_| {
                        let backend = Arc::clone(&backend);
                        let id = id.clone();
                        async move { backend.get_session_roster(&id).await }
                    },
                    classify_backend,
                )
                .await;
            let _ = events.send(DashboardEvent::RosterSettled {
                session_id: id,
                outcome: outcome.result,
                attempts: outcome.attempts,
            });
        });
    }

    fn on_roster_settled(
        &mut self,
        id: &SessionId,
        outcome: Result<SessionRoster, BackendError>,
        attempts: u32,
    ) {
        match outcome {
            Ok(roster) => match self.store.set_roster(id, roster) {
                Ok(notice) => {
                    if let Some(notice) = notice {
                        self.notices.success(notice);
                    }
                }
                Err(stale) => debug!(session_id = %id, %stale, "dropping roster"),
            },
            Err(err) => {
                let error = UserError::roster(&err);
                match self.store.fail_roster(id, &error) {
                    Ok(()) => {
                        warn!(session_id = %id, attempts, error = %err, "roster fetch failed");
                        self.notices.error(error);
                    }
                    Err(stale) => debug!(session_id = %id, %stale, "dropping roster failure"),
                }
            }
        }
    }

    /// Operator dismissed the roster view: the session is forgotten.
    pub fn close_roster_view(&mut self) {
        let is_roster = self
            .store
            .current()
            .is_some_and(|s| s.status() == SessionStatus::Expired);
        if !is_roster {
            return;
        }
        self.session_clock.disarm();
        self.store.clear();
        self.stamps.session = None;
    }

    //
    // ─── REPORTS ───────────────────────────────────────────────────────────────
    //

    /// Start the fixed-cadence poll. The first tick fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate_polling(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let events = self.events_tx.clone();
        let period = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        info!(?period, "report polling activated");
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if events.send(DashboardEvent::PollTick).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn deactivate_polling(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            info!("report polling stopped");
        }
    }

    /// Start a poll unless one is already in flight. Returns whether it started.
    pub fn request_poll(&mut self) -> bool {
        if !self.sync.begin_poll() {
            return false;
        }
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = ReportSync::poll_once(backend.as_ref()).await;
            let _ = events.send(DashboardEvent::ReportsFetched(result));
        });
        true
    }

    fn on_reports_fetched(&mut self, result: Result<ReportSet, BackendError>) {
        match self.sync.finish_poll(result, self.clock.now()) {
            SyncOutcome::Published => {
                if let Some(selected) = self.selected.as_mut() {
                    self.sync.refresh_selection(selected);
                }
            }
            SyncOutcome::Unchanged => {}
            SyncOutcome::Failed(err) => self.notices.error(err),
        }
    }

    /// Open the detail view for `subject`. Returns `false` if it is not in the cache.
    pub fn select_report(&mut self, subject: &str) -> bool {
        let Some(snapshot) = self.sync.reports().and_then(|r| r.get(subject)).cloned() else {
            return false;
        };
        self.selected = Some(snapshot);
        self.stamps.report = Some(self.stamp());
        true
    }

    pub fn close_report_view(&mut self) {
        self.selected = None;
        self.stamps.report = None;
    }

    //
    // ─── EXPORT ────────────────────────────────────────────────────────────────
    //

    /// Start downloading the spreadsheet for a session in the background.
    ///
    /// The result is applied by [`Dashboard::handle`] and collected with
    /// [`Dashboard::take_export`]. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Busy` while another export is outstanding.
    pub fn start_export(&mut self, id: SessionId) -> Result<(), UserError> {
        if self.exporting.is_some() {
            return Err(UserError::new(
                ErrorKind::Busy,
                "An export is already in progress.",
            ));
        }
        self.notices.dismiss_error();
        self.notices.success("Preparing Excel file for download...");
        self.finished_export = None;
        self.exporting = Some(id.clone());

        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = backend.export_session_report(&id).await;
            let _ = events.send(DashboardEvent::ExportFinished {
                session_id: id,
                outcome,
            });
        });
        Ok(())
    }

    fn on_export_finished(&mut self, id: &SessionId, outcome: Result<Vec<u8>, BackendError>) {
        if self.exporting.as_ref() != Some(id) {
            debug!(session_id = %id, "dropping unrequested export");
            return;
        }
        self.exporting = None;
        let result = match outcome {
            Ok(bytes) => {
                let file_name =
                    format!("attendance_{}.xlsx", self.clock.now().format("%Y-%m-%d"));
                info!(session_id = %id, bytes = bytes.len(), %file_name, "export downloaded");
                self.notices.success("Excel file downloaded successfully!");
                Ok(ExportedReport { file_name, bytes })
            }
            Err(err) => {
                let error = UserError::export(&err);
                warn!(session_id = %id, error = %err, "export failed");
                self.notices.dismiss_success();
                self.notices.error(error.clone());
                Err(error)
            }
        };
        self.finished_export = Some(result);
    }

    /// Collect the outcome of the last finished export, once.
    pub fn take_export(&mut self) -> Option<Result<ExportedReport, UserError>> {
        self.finished_export.take()
    }

    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.exporting.is_some()
    }

    /// Start an export and keep applying events until it finishes.
    ///
    /// Timers, roster fetches and polls are handled while the download runs.
    ///
    /// # Errors
    ///
    /// Returns `UserError` when the download fails, the file is empty, or
    /// another export is already outstanding.
    pub async fn export_session(&mut self, id: &SessionId) -> Result<ExportedReport, UserError> {
        self.start_export(id.clone())?;
        loop {
            if let Some(result) = self.take_export() {
                return result;
            }
            match self.next_event().await {
                Some(event) => self.handle(event),
                None => {
                    return Err(UserError::new(
                        ErrorKind::Unexpected,
                        "Export was interrupted",
                    ));
                }
            }
        }
    }

    /// The export action stays enabled on the roster view, even after a failed fetch.
    #[must_use]
    pub fn export_available(&self) -> bool {
        self.visible_view() == VisibleView::Roster
    }

    //
    // ─── EVENT LOOP ────────────────────────────────────────────────────────────
    //

    /// Wait for the next completion. Never returns `None` while `self` is alive.
    pub async fn next_event(&mut self) -> Option<DashboardEvent> {
        self.events_rx.recv().await
    }

    /// Apply one completion on the owning task.
    pub fn handle(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::SessionCreated { request, outcome } => {
                self.on_session_created(request, outcome);
            }
            DashboardEvent::SessionExpired(id) => self.on_session_expired(&id),
            DashboardEvent::RosterSettled {
                session_id,
                outcome,
                attempts,
            } => self.on_roster_settled(&session_id, outcome, attempts),
            DashboardEvent::PollTick => {
                self.request_poll();
            }
            DashboardEvent::ReportsFetched(result) => self.on_reports_fetched(result),
            DashboardEvent::ExportFinished {
                session_id,
                outcome,
            } => self.on_export_finished(&session_id, outcome),
        }
    }

    /// Wait for and apply one event.
    pub async fn pump(&mut self) {
        if let Some(event) = self.next_event().await {
            self.handle(event);
        }
    }

    /// Pump events until `done` holds or `limit` elapses. Returns whether `done` held.
    pub async fn pump_until(&mut self, limit: Duration, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + limit;
        while !done(self) {
            match tokio::time::timeout_at(deadline, self.next_event()).await {
                Ok(Some(event)) => self.handle(event),
                Ok(None) | Err(_) => return done(self),
            }
        }
        true
    }

    //
    // ─── READ SIDE ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn visible_view(&self) -> VisibleView {
        DialogCoordinator::visible(self.store.current(), self.stamps)
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.store.current()
    }

    #[must_use]
    pub fn roster_loading(&self) -> bool {
        self.store
            .current()
            .is_some_and(|s| *s.roster() == RosterState::Loading)
    }

    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.creating
    }

    #[must_use]
    pub fn reports(&self) -> Option<&ReportSet> {
        self.sync.reports()
    }

    #[must_use]
    pub fn report_sync(&self) -> &ReportSync {
        &self.sync
    }

    #[must_use]
    pub fn selected_report(&self) -> Option<&ReportSnapshot> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.deactivate_polling();
    }
}
