use std::{
    any::Any,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    adapter::ViewAdapter,
    config::EngineConfig,
    core::registry::Registry,
    error::AttemptError,
    executor::{Confirmed, Executor},
    op::Operation,
    status::{StatusReporter, TracingReporter, failure_message},
    types::{OpId, OperationKind, Ticket},
};

use super::events::EngineEvent;

/// Future returned by [`OptimisticEngine::submit`].
pub type SubmitFuture<T> = Pin<Box<dyn Future<Output = SubmitOutcome<T>> + Send>>;

/// Future returned by [`OptimisticEngine::retry_failed_operations`].
pub type RetryAllFuture<T> = Pin<Box<dyn Future<Output = Vec<SubmitOutcome<T>>> + Send>>;

/// How one attempt-sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome<T> {
    /// The remote call confirmed the operation.
    Confirmed {
        /// Operation id.
        id: OpId,
        /// Value the action resolved with.
        result: Option<T>,
        /// Attempts used.
        attempts: u32,
    },
    /// The operation failed and the view was rolled back.
    RolledBack {
        /// Operation id.
        id: OpId,
        /// Terminal error.
        error: AttemptError,
        /// Attempts made; `0` when the apply callback failed.
        attempts: u32,
    },
    /// The registry dropped this attempt-sequence before it finished
    /// (emergency refresh or a newer submission with the same id).
    Abandoned {
        /// Operation id.
        id: OpId,
    },
}

impl<T> SubmitOutcome<T> {
    /// True for [`SubmitOutcome::Confirmed`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    /// Operation id.
    pub fn id(&self) -> &str {
        match self {
            Self::Confirmed { id, .. } | Self::RolledBack { id, .. } | Self::Abandoned { id } => id,
        }
    }

    /// Server-confirmed value, if any.
    pub fn result(&self) -> Option<&T> {
        match self {
            Self::Confirmed { result, .. } => result.as_ref(),
            _ => None,
        }
    }
}

/// Applies operations to a view optimistically and reverts them when their
/// remote confirmation fails.
///
/// Cloning is cheap; clones share one registry.
pub struct OptimisticEngine<T> {
    inner: Arc<EngineInner<T>>,
}

struct EngineInner<T> {
    config: EngineConfig,
    executor: Executor,
    registry: Mutex<Registry<T>>,
    view: Arc<dyn ViewAdapter<T>>,
    reporter: Arc<dyn StatusReporter<T>>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl<T> Clone for OptimisticEngine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> OptimisticEngine<T>
where
    T: Send + Sync + 'static,
{
    /// Creates an engine driving `view`, reporting through `reporter`.
    pub fn new(
        view: Arc<dyn ViewAdapter<T>>,
        reporter: Arc<dyn StatusReporter<T>>,
        config: EngineConfig,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(EngineInner {
                executor: Executor::new(config.retry_policy()),
                config,
                registry: Mutex::new(Registry::new()),
                view,
                reporter,
                events_tx,
            }),
        }
    }

    /// Engine with default config and a [`TracingReporter`].
    pub fn with_view(view: Arc<dyn ViewAdapter<T>>) -> Self {
        Self::new(view, Arc::new(TracingReporter), EngineConfig::default())
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// New receiver for the engine's event stream.
    ///
    /// Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Submits `op`.
    ///
    /// Before this returns, `op` is pending and [`ViewAdapter::apply`] has
    /// run. The remote action runs on its own task, so the operation is
    /// confirmed or rolled back even if the returned future is dropped. The
    /// future resolves with the outcome of that task.
    ///
    /// Outside a tokio runtime nothing is spawned and the returned future
    /// must be polled to drive the operation.
    pub fn submit(&self, op: Operation<T>) -> SubmitFuture<T> {
        self.submit_shared(Arc::new(op))
    }

    fn submit_shared(&self, op: Arc<Operation<T>>) -> SubmitFuture<T> {
        let ticket = self.registry().begin(Arc::clone(&op));
        info!(op_id = %op.id, kind = %op.kind, "optimistic submit");
        self.emit(EngineEvent::Submitted {
            id: op.id.clone(),
            kind: op.kind,
        });

        debug!(op_id = %op.id, "applying optimistic view update");
        let applied = guarded("apply", || self.inner.view.apply(&op));

        let id = op.id.clone();
        let driver = self.clone().drive(op, ticket, applied);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Box::pin(driver);
        };

        let task = runtime.spawn(driver);
        Box::pin(async move {
            task.await.unwrap_or_else(|err| {
                error!(op_id = %id, error = %err, "operation task did not finish");
                SubmitOutcome::Abandoned { id }
            })
        })
    }

    async fn drive(
        self,
        op: Arc<Operation<T>>,
        ticket: Ticket,
        applied: Result<(), AttemptError>,
    ) -> SubmitOutcome<T> {
        if let Err(err) = applied {
            return self.finish_failed(&op, ticket, err, 0);
        }

        let events_tx = self.inner.events_tx.clone();
        let action = op.action();
        let run = self
            .inner
            .executor
            .run_observed(&op.id, &action, |attempt, error| {
                let _ = events_tx.send(EngineEvent::AttemptFailed {
                    id: op.id.clone(),
                    attempt,
                    error: error.clone(),
                });
            })
            .await;

        match run {
            Ok(confirmed) => self.finish_confirmed(&op, ticket, confirmed),
            Err(exhausted) => self.finish_failed(&op, ticket, exhausted.last, exhausted.attempts),
        }
    }

    /// Re-submits every failed operation still in the log.
    ///
    /// The failed set is emptied and every descriptor is re-applied before
    /// this returns. Each retry runs on its own task; the future only
    /// collects their outcomes in order.
    pub fn retry_failed_operations(&self) -> RetryAllFuture<T> {
        let ops = self.registry().take_failed();
        if !ops.is_empty() {
            info!(count = ops.len(), "retrying failed operations");
        }

        let submissions: Vec<SubmitFuture<T>> =
            ops.into_iter().map(|op| self.submit_shared(op)).collect();

        Box::pin(async move {
            let mut outcomes = Vec::with_capacity(submissions.len());
            for submission in submissions {
                outcomes.push(submission.await);
            }
            outcomes
        })
    }

    /// Forgets failed operations. Pending ones are left to finish.
    pub fn clear_completed_operations(&self) -> usize {
        let cleared = self.registry().clear_failed();
        info!(cleared, "cleared failed operations");
        cleared
    }

    /// Drops all bookkeeping and reloads the view from the source of truth.
    ///
    /// In-flight actions keep running; their completions are abandoned.
    pub fn emergency_refresh(&self) {
        warn!("emergency refresh triggered");
        self.registry().reset();
        self.emit(EngineEvent::Reset);

        self.inner.view.refresh();

        if self.inner.config.show_error_notification {
            let _ = guarded("notify", || {
                self.inner.reporter.notify_info("Synchronizing data...")
            });
        }
    }

    /// Whether `id` is in flight.
    pub fn is_pending(&self, id: &str) -> bool {
        self.registry().is_pending(id)
    }

    /// Whether `id` failed and is waiting for a retry.
    pub fn is_failed(&self, id: &str) -> bool {
        self.registry().is_failed(id)
    }

    /// Whether any operation is in flight.
    pub fn has_pending(&self) -> bool {
        self.registry().has_pending()
    }

    /// Whether any operation is waiting for a retry.
    pub fn has_failed(&self) -> bool {
        self.registry().has_failed()
    }

    /// Number of in-flight operations.
    pub fn pending_count(&self) -> usize {
        self.registry().pending_len()
    }

    /// Number of failed operations.
    pub fn failed_count(&self) -> usize {
        self.registry().failed_len()
    }

    /// Ids of in-flight operations, sorted.
    pub fn pending_operations(&self) -> Vec<OpId> {
        self.registry().pending_ids()
    }

    /// Ids of failed operations, sorted.
    pub fn failed_operations(&self) -> Vec<OpId> {
        self.registry().failed_ids()
    }

    /// Descriptor of a failed operation, for inspection or a targeted retry.
    pub fn failed_operation(&self, id: &str) -> Option<Arc<Operation<T>>> {
        let registry = self.registry();
        if registry.is_failed(id) {
            registry.logged(id)
        } else {
            None
        }
    }

    fn finish_confirmed(
        &self,
        op: &Arc<Operation<T>>,
        ticket: Ticket,
        confirmed: Confirmed<T>,
    ) -> SubmitOutcome<T> {
        if !self.registry().owns(&op.id, ticket) {
            return self.abandon(op);
        }

        if self.inner.config.reconcile_on_success {
            let reconciled = guarded("confirm", || {
                self.inner.view.confirm(op, confirmed.value.as_ref())
            });
            if let Err(err) = reconciled {
                return self.finish_failed(op, ticket, err, confirmed.attempts);
            }
        }

        if !self.registry().confirm(&op.id, ticket) {
            return self.abandon(op);
        }

        info!(op_id = %op.id, attempts = confirmed.attempts, "operation confirmed");
        self.emit(EngineEvent::Confirmed {
            id: op.id.clone(),
            attempts: confirmed.attempts,
        });
        if self.inner.config.show_success_notification {
            let _ = guarded("notify", || self.inner.reporter.notify_success(op.kind));
        }

        SubmitOutcome::Confirmed {
            id: op.id.clone(),
            result: confirmed.value,
            attempts: confirmed.attempts,
        }
    }

    fn finish_failed(
        &self,
        op: &Arc<Operation<T>>,
        ticket: Ticket,
        error: AttemptError,
        attempts: u32,
    ) -> SubmitOutcome<T> {
        if !self.registry().fail(&op.id, ticket) {
            return self.abandon(op);
        }

        error!(op_id = %op.id, attempts, error = %error, "operation failed, rolling back");
        if let Err(err) = guarded("rollback", || self.inner.view.rollback(op)) {
            error!(op_id = %op.id, error = %err, "rollback did not complete");
        }

        self.emit(EngineEvent::RolledBack {
            id: op.id.clone(),
            error: error.clone(),
        });
        if self.inner.config.show_error_notification {
            let message = format!("{}: {error}", failure_message(op.kind));
            let retry = RetryAction {
                engine: self.clone(),
                op: Arc::clone(op),
            };
            let _ = guarded("notify", || {
                self.inner.reporter.notify_error(op.kind, &message, retry)
            });
        }

        SubmitOutcome::RolledBack {
            id: op.id.clone(),
            error,
            attempts,
        }
    }

    fn abandon(&self, op: &Operation<T>) -> SubmitOutcome<T> {
        warn!(op_id = %op.id, "completion for untracked operation discarded");
        self.emit(EngineEvent::Abandoned { id: op.id.clone() });
        SubmitOutcome::Abandoned { id: op.id.clone() }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.inner.events_tx.send(event);
    }

    fn registry(&self) -> MutexGuard<'_, Registry<T>> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Retry affordance handed to [`StatusReporter::notify_error`].
pub struct RetryAction<T> {
    engine: OptimisticEngine<T>,
    op: Arc<Operation<T>>,
}

impl<T> Clone for RetryAction<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            op: Arc::clone(&self.op),
        }
    }
}

impl<T> fmt::Debug for RetryAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAction")
            .field("op_id", &self.op.id)
            .field("kind", &self.op.kind)
            .finish()
    }
}

impl<T> RetryAction<T> {
    /// Id of the failed operation.
    pub fn operation_id(&self) -> &str {
        &self.op.id
    }

    /// Kind of the failed operation.
    pub fn kind(&self) -> OperationKind {
        self.op.kind
    }

    /// The descriptor [`RetryAction::run`] re-submits.
    pub fn operation(&self) -> &Operation<T> {
        &self.op
    }
}

impl<T: Send + Sync + 'static> RetryAction<T> {
    /// Re-submits the whole descriptor as a fresh attempt-sequence.
    pub fn run(self) -> SubmitFuture<T> {
        self.engine.submit_shared(self.op)
    }
}

fn guarded(stage: &'static str, f: impl FnOnce()) -> Result<(), AttemptError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let detail = panic_detail(payload.as_ref());
        error!(stage, %detail, "callback panicked");
        AttemptError::Unexpected(format!("{stage} panicked: {detail}"))
    })
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
