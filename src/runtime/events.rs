//! Engine event stream payloads.

use crate::{
    error::AttemptError,
    types::{OpId, OperationKind},
};

/// Events emitted while operations move through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// An operation was applied to the view and marked pending.
    Submitted {
        /// Operation id.
        id: OpId,
        /// Operation kind.
        kind: OperationKind,
    },
    /// One attempt failed; more may follow.
    AttemptFailed {
        /// Operation id.
        id: OpId,
        /// 1-based attempt number.
        attempt: u32,
        /// Attempt error.
        error: AttemptError,
    },
    /// The remote call confirmed the operation.
    Confirmed {
        /// Operation id.
        id: OpId,
        /// Attempts used.
        attempts: u32,
    },
    /// Attempts were exhausted and the view was rolled back.
    RolledBack {
        /// Operation id.
        id: OpId,
        /// Terminal error.
        error: AttemptError,
    },
    /// A completion arrived for an id the registry no longer tracks under
    /// that attempt-sequence.
    Abandoned {
        /// Operation id.
        id: OpId,
    },
    /// The registry was emptied by an emergency refresh.
    Reset,
}
