//! User-facing status notifications.

use tracing::{error, info};

use crate::{runtime::engine::RetryAction, types::OperationKind};

/// Presentational sink for operation outcomes (toast equivalent).
pub trait StatusReporter<T>: Send + Sync + 'static {
    /// An operation of `kind` was confirmed.
    fn notify_success(&self, kind: OperationKind);

    /// An operation of `kind` was rolled back. `retry` re-submits the whole
    /// descriptor.
    fn notify_error(&self, kind: OperationKind, message: &str, retry: RetryAction<T>);

    /// Informational message, e.g. an emergency resync.
    fn notify_info(&self, message: &str);
}

/// Text shown for a confirmed operation.
pub fn success_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Create => "Item created successfully",
        OperationKind::Update => "Item updated successfully",
        OperationKind::Delete => "Item deleted successfully",
    }
}

/// Prefix shown for a rolled-back operation.
pub fn failure_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Create => "Error while creating",
        OperationKind::Update => "Error while updating",
        OperationKind::Delete => "Error while deleting",
    }
}

/// Reporter that writes notifications to the `tracing` log and drops the
/// retry handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl<T> StatusReporter<T> for TracingReporter {
    fn notify_success(&self, kind: OperationKind) {
        info!(%kind, "{}", success_message(kind));
    }

    fn notify_error(&self, kind: OperationKind, message: &str, retry: RetryAction<T>) {
        error!(%kind, op_id = retry.operation_id(), "{message}");
    }

    fn notify_info(&self, message: &str) {
        info!("{message}");
    }
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl<T> StatusReporter<T> for SilentReporter {
    fn notify_success(&self, _kind: OperationKind) {}

    fn notify_error(&self, _kind: OperationKind, _message: &str, _retry: RetryAction<T>) {}

    fn notify_info(&self, _message: &str) {}
}
