use std::time::Duration;

use attend_core::model::SessionId;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dashboard::DashboardEvent;

struct PendingExpiry {
    session_id: SessionId,
    handle: JoinHandle<()>,
}

/// Countdown for the one active session.
///
/// At most one expiry is pending. The event carries the session id it was
/// armed with; the store ignores it if that session is no longer current.
#[derive(Default)]
pub struct SessionClock {
    pending: Option<PendingExpiry>,
}

impl SessionClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `SessionExpired(session_id)` after `duration`, replacing any pending expiry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(
        &mut self,
        session_id: SessionId,
        duration: Duration,
        events: &UnboundedSender<DashboardEvent>,
    ) {
        self.disarm();
        let events = events.clone();
        let tagged = session_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Receiver gone means the dashboard was dropped.
            let _ = events.send(DashboardEvent::SessionExpired(tagged));
        });
        debug!(%session_id, ?duration, "session clock armed");
        self.pending = Some(PendingExpiry { session_id, handle });
    }

    /// Cancel the pending expiry, returning the session it was armed for.
    pub fn disarm(&mut self) -> Option<SessionId> {
        let pending = self.pending.take()?;
        pending.handle.abort();
        debug!(session_id = %pending.session_id, "session clock disarmed");
        Some(pending.session_id)
    }

    #[must_use]
    pub fn armed_for(&self) -> Option<&SessionId> {
        self.pending.as_ref().map(|p| &p.session_id)
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fires_once_for_armed_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut clock = SessionClock::new();
        let started = Instant::now();

        clock.arm(SessionId::new("a"), Duration::from_secs(120), &tx);
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, DashboardEvent::SessionExpired(id) if id.as_str() == "a"));
        assert_eq!(started.elapsed(), Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_previous_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut clock = SessionClock::new();

        clock.arm(SessionId::new("a"), Duration::from_secs(120), &tx);
        tokio::time::sleep(Duration::from_secs(60)).await;
        clock.arm(SessionId::new("b"), Duration::from_secs(120), &tx);
        assert_eq!(clock.armed_for(), Some(&SessionId::new("b")));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, DashboardEvent::SessionExpired(id) if id.as_str() == "b"));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut clock = SessionClock::new();

        clock.arm(SessionId::new("a"), Duration::from_secs(1), &tx);
        assert_eq!(clock.disarm(), Some(SessionId::new("a")));
        assert_eq!(clock.disarm(), None);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
