use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backend::BackendError;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// How a single attempt's result should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision<T, E> {
    Succeed(T),
    Retry(E),
    Fail(E),
}

/// The one terminal result of a retry chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the initial attempt and is at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `operation` until `classify` accepts or rejects its result, or the
    /// attempt budget is spent. `operation` receives the zero-based attempt index.
    pub async fn run<T, E, F, Fut, C>(&self, mut operation: F, classify: C) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(Result<T, E>) -> RetryDecision<T, E>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            let decision = classify(operation(attempt).await);
            attempt += 1;
            match decision {
                RetryDecision::Succeed(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                RetryDecision::Fail(err) => {
                    debug!(attempt, error = %err, "terminal failure, not retrying");
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
                RetryDecision::Retry(err) if attempt >= self.max_attempts => {
                    warn!(attempts = attempt, error = %err, "retries exhausted");
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
                RetryDecision::Retry(err) => {
                    debug!(
                        attempt,
                        error = %err,
                        delay = ?self.delay,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

/// Retry transient backend failures; fail at once on anything else.
pub fn classify_backend<T>(result: Result<T, BackendError>) -> RetryDecision<T, BackendError> {
    match result {
        Ok(value) => RetryDecision::Succeed(value),
        Err(err) if err.is_transient() => RetryDecision::Retry(err),
        Err(err) => RetryDecision::Fail(err),
    }
}
