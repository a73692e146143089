use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ScenarioConfig;
use crate::error::{PracticeError, Result};

/// Linear backoff: retry `k` (0-indexed) waits `(k + 1) * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * (retry + 1)
    }

    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempt: 0,
        }
    }

    /// Run `op` until it succeeds or the retries are used up.
    ///
    /// Firing `cancel` abandons the attempt in flight and any pending backoff
    /// and yields `SessionInvalidated`.
    pub async fn run<T, F, Fut>(&self, what: &str, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = self.start();
        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("{} cancelled after {} attempts", what, state.attempt());
                    return Err(PracticeError::SessionInvalidated);
                }
                outcome = op() => outcome,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => match state.next_delay() {
                    Some(delay) => {
                        warn!(
                            "{} failed (attempt {}): {}; retrying in {:?}",
                            what,
                            state.attempt(),
                            e,
                            delay
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                debug!("{} cancelled during backoff", what);
                                return Err(PracticeError::SessionInvalidated);
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => {
                        return Err(PracticeError::RetryExhausted {
                            attempts: state.attempt(),
                            last: e.to_string(),
                        })
                    }
                },
            }
        }
    }
}

impl From<&ScenarioConfig> for RetryPolicy {
    fn from(config: &ScenarioConfig) -> Self {
        Self::new(config.max_retries, config.base_delay())
    }
}

/// Progress through one retried call
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    /// Attempts made so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt. Returns the wait before the next one, or
    /// `None` when exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let retry = self.attempt;
        self.attempt += 1;
        (retry < self.policy.max_retries).then(|| self.policy.delay_for(retry))
    }
}
