//! Retry policy: bounded attempts with a fixed backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::AttemptState;

/// Retry policy for a single fallible operation.
///
/// The delay between attempts is constant. The policy keeps no state of its
/// own, so one instance serves every request of every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_delay: Duration,
}

/// The operation failed on its last allowed attempt.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub error: E,
    pub attempts: AttemptState,
}

impl RetryPolicy {
    /// `max_attempts` below one is treated as one.
    pub fn new(max_attempts: u32, backoff_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }

    /// Run `op` until it succeeds or `max_attempts` attempts have failed.
    ///
    /// `op` receives the 1-based attempt number. Every error is retried;
    /// after the final attempt the last error is returned.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, Exhausted<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut state = AttemptState::default();
        loop {
            let attempt = state.begin();
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    state.fail(&error);
                    if attempt >= self.max_attempts {
                        return Err(Exhausted {
                            error,
                            attempts: state,
                        });
                    }
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.backoff_delay.as_millis() as u64,
                        %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff_delay).await;
                }
            }
        }
    }
}
