use std::env;
use std::time::Duration;

use tracing::warn;

use crate::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryPolicy};

pub const DEFAULT_QR_VALIDITY: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Floor for the poll period; a zero period would stop the ticker.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Pause between a clock-driven expiry and the first roster request, so the
/// server has closed the session before we ask for it.
pub const DEFAULT_ROSTER_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Timing knobs for the dashboard engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DashboardConfig {
    pub qr_validity: Duration,
    pub poll_interval: Duration,
    pub roster_settle_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            qr_validity: DEFAULT_QR_VALIDITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            roster_settle_delay: DEFAULT_ROSTER_SETTLE_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

impl DashboardConfig {
    /// Defaults, overridden by `ATTEND_QR_VALIDITY_SECS`, `ATTEND_POLL_INTERVAL_SECS`,
    /// `ATTEND_ROSTER_SETTLE_MS`, `ATTEND_RETRY_ATTEMPTS` and `ATTEND_RETRY_DELAY_MS`.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let qr_validity = env_u64("ATTEND_QR_VALIDITY_SECS")
            .map_or(DEFAULT_QR_VALIDITY, Duration::from_secs);
        let poll_interval = env_u64("ATTEND_POLL_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs);
        let roster_settle_delay = env_u64("ATTEND_ROSTER_SETTLE_MS")
            .map_or(DEFAULT_ROSTER_SETTLE_DELAY, Duration::from_millis);
        let attempts = env_u64("ATTEND_RETRY_ATTEMPTS")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let delay = env_u64("ATTEND_RETRY_DELAY_MS")
            .map_or(DEFAULT_RETRY_DELAY, Duration::from_millis);

        Self {
            qr_validity,
            poll_interval,
            roster_settle_delay,
            retry: RetryPolicy::new(attempts, delay),
        }
    }

    #[must_use]
    pub fn with_qr_validity(mut self, validity: Duration) -> Self {
        self.qr_validity = validity;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    #[must_use]
    pub fn with_roster_settle_delay(mut self, delay: Duration) -> Self {
        self.roster_settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}
