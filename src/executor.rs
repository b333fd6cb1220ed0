//! Timeout-bounded retry loop for one operation's remote action.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{error::AttemptError, op::Action};

/// Attempt budget and pacing for [`Executor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Constant delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(15_000),
            max_retries: 2,
            retry_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    /// Total attempts per attempt-sequence.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Successful end of an attempt-sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed<T> {
    /// Value the action resolved with.
    pub value: Option<T>,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Terminal failure of an attempt-sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("gave up after {attempts} attempt(s): {last}")]
pub struct Exhausted {
    /// Attempts made.
    pub attempts: u32,
    /// Error of the final attempt.
    pub last: AttemptError,
}

/// Runs actions under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct Executor {
    policy: RetryPolicy,
}

impl Executor {
    /// Creates an executor for `policy`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Active policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `action` until it resolves or the attempt budget is spent.
    pub async fn run<T: Send + 'static>(
        &self,
        op_id: &str,
        action: &Action<T>,
    ) -> Result<Confirmed<T>, Exhausted> {
        self.run_observed(op_id, action, |_, _| {}).await
    }

    /// Like [`Executor::run`], calling `on_failure(attempt, error)` after each
    /// failed attempt.
    pub async fn run_observed<T, F>(
        &self,
        op_id: &str,
        action: &Action<T>,
        mut on_failure: F,
    ) -> Result<Confirmed<T>, Exhausted>
    where
        T: Send + 'static,
        F: FnMut(u32, &AttemptError),
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(op_id, attempt, max_attempts, "remote attempt");

            match self.attempt(action).await {
                Ok(value) => {
                    return Ok(Confirmed {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    warn!(op_id, attempt, error = %err, "remote attempt failed");
                    on_failure(attempt, &err);
                    if attempt >= max_attempts {
                        return Err(Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }

    // Each attempt owns a task. On timeout the handle is dropped, the task
    // keeps running detached and its late result is discarded.
    async fn attempt<T: Send + 'static>(&self, action: &Action<T>) -> Result<Option<T>, AttemptError> {
        let action = Arc::clone(action);
        let task = tokio::spawn(async move { action().await });

        match tokio::time::timeout(self.policy.timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(remote))) => Err(AttemptError::Remote(remote)),
            Ok(Err(join)) => Err(AttemptError::Aborted(join.to_string())),
            Err(_) => Err(AttemptError::Timeout(self.policy.timeout)),
        }
    }
}
