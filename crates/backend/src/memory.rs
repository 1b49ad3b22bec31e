use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use attend_core::model::{ReportSet, RosterEntry, SessionId, SessionRequest, SessionStatus};
use uuid::Uuid;

use crate::client::{AttendanceBackend, CreatedSession, SessionRoster};
use crate::error::BackendError;

#[derive(Debug, Clone)]
struct StoredSession {
    subject: String,
    classroom: String,
    status: SessionStatus,
    students: Vec<RosterEntry>,
    export: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<SessionId, StoredSession>,
    reports: ReportSet,
    create_faults: VecDeque<BackendError>,
    roster_faults: VecDeque<BackendError>,
    report_faults: VecDeque<BackendError>,
    export_faults: VecDeque<BackendError>,
    create_calls: u32,
    roster_calls: u32,
    report_calls: u32,
    report_latency: Duration,
    export_latency: Duration,
}

/// Scriptable in-memory attendance server for tests and the offline demo.
///
/// Queued faults are returned (oldest first) before any real answer.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every report fetch, to keep a poll in flight across ticks.
    #[must_use]
    pub fn with_report_latency(self, latency: Duration) -> Self {
        self.lock().report_latency = latency;
        self
    }

    /// Delay every export download.
    #[must_use]
    pub fn with_export_latency(self, latency: Duration) -> Self {
        self.lock().export_latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_create_fault(&self, fault: BackendError) {
        self.lock().create_faults.push_back(fault);
    }

    pub fn push_roster_fault(&self, fault: BackendError) {
        self.lock().roster_faults.push_back(fault);
    }

    pub fn push_report_fault(&self, fault: BackendError) {
        self.lock().report_faults.push_back(fault);
    }

    pub fn push_export_fault(&self, fault: BackendError) {
        self.lock().export_faults.push_back(fault);
    }

    /// Register a student scan against a session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for an unknown session.
    pub fn record_attendance(
        &self,
        id: &SessionId,
        entry: RosterEntry,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        let session = state.sessions.get_mut(id).ok_or(BackendError::NotFound)?;
        session.students.push(entry);
        Ok(())
    }

    /// Mark a session expired on the server side.
    pub fn expire_session(&self, id: &SessionId) {
        if let Some(session) = self.lock().sessions.get_mut(id) {
            session.status = SessionStatus::Expired;
        }
    }

    /// Drop a session, as if deleted server-side.
    pub fn delete_session(&self, id: &SessionId) {
        self.lock().sessions.remove(id);
    }

    /// Override the export bytes for a session (empty means "zero-byte file").
    pub fn set_export(&self, id: &SessionId, bytes: Vec<u8>) {
        if let Some(session) = self.lock().sessions.get_mut(id) {
            session.export = Some(bytes);
        }
    }

    pub fn set_reports(&self, reports: ReportSet) {
        self.lock().reports = reports;
    }

    pub fn update_reports(&self, update: impl FnOnce(&mut ReportSet)) {
        update(&mut self.lock().reports);
    }

    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.lock().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn session_subject(&self, id: &SessionId) -> Option<(String, String)> {
        self.lock()
            .sessions
            .get(id)
            .map(|s| (s.subject.clone(), s.classroom.clone()))
    }

    #[must_use]
    pub fn create_calls(&self) -> u32 {
        self.lock().create_calls
    }

    #[must_use]
    pub fn roster_calls(&self) -> u32 {
        self.lock().roster_calls
    }

    #[must_use]
    pub fn report_calls(&self) -> u32 {
        self.lock().report_calls
    }
}

#[async_trait]
impl AttendanceBackend for InMemoryBackend {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<CreatedSession, BackendError> {
        let mut state = self.lock();
        state.create_calls += 1;
        if let Some(fault) = state.create_faults.pop_front() {
            return Err(fault);
        }

        let session_id = SessionId::new(Uuid::new_v4().simple().to_string());
        state.sessions.insert(
            session_id.clone(),
            StoredSession {
                subject: request.subject().to_string(),
                classroom: request.classroom().to_string(),
                status: SessionStatus::Active,
                students: Vec::new(),
                export: None,
            },
        );
        Ok(CreatedSession {
            qr_payload: format!("attendance:{session_id}"),
            session_id,
        })
    }

    async fn get_session_roster(&self, id: &SessionId) -> Result<SessionRoster, BackendError> {
        let mut state = self.lock();
        state.roster_calls += 1;
        if let Some(fault) = state.roster_faults.pop_front() {
            return Err(fault);
        }
        let session = state.sessions.get(id).ok_or(BackendError::NotFound)?;
        Ok(SessionRoster {
            status: session.status,
            students: session.students.clone(),
        })
    }

    async fn get_report_set(&self) -> Result<ReportSet, BackendError> {
        let latency = {
            let mut state = self.lock();
            state.report_calls += 1;
            state.report_latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if let Some(fault) = state.report_faults.pop_front() {
            return Err(fault);
        }
        Ok(state.reports.clone())
    }

    async fn export_session_report(&self, id: &SessionId) -> Result<Vec<u8>, BackendError> {
        let latency = self.lock().export_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if let Some(fault) = state.export_faults.pop_front() {
            return Err(fault);
        }
        let session = state.sessions.get(id).ok_or(BackendError::NotFound)?;
        let bytes = match &session.export {
            Some(bytes) => bytes.clone(),
            None => tab_separated(&session.students),
        };
        if bytes.is_empty() {
            return Err(BackendError::EmptyResult);
        }
        Ok(bytes)
    }
}

fn tab_separated(students: &[RosterEntry]) -> Vec<u8> {
    let mut out = String::from("student_id\tname\temail\n");
    for entry in students {
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            entry.student_id, entry.name, entry.email
        ));
    }
    out.into_bytes()
}
