//! Error types shared by the executor and the engine.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by an operation's remote action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Human-readable cause.
    pub message: String,
}

impl RemoteError {
    /// Builds a remote error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for RemoteError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RemoteError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Why one attempt (or the whole submission) did not confirm.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The action resolved with an error.
    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// The action did not settle within the configured timeout.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The task running the action panicked or was cancelled.
    #[error("remote task aborted: {0}")]
    Aborted(String),

    /// A view callback panicked while the engine was driving the operation.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}
