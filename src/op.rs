//! Operation descriptor model.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use crate::{
    error::RemoteError,
    types::{OpId, OperationKind, generate_op_id},
};

/// Future returned by one invocation of a remote action.
///
/// `Ok(Some(entity))` carries the server-confirmed entity, `Ok(None)` a
/// confirmation without payload.
pub type ActionFuture<T> = Pin<Box<dyn Future<Output = Result<Option<T>, RemoteError>> + Send>>;

/// Re-invocable remote call confirming an operation.
pub type Action<T> = Arc<dyn Fn() -> ActionFuture<T> + Send + Sync>;

/// One mutation attempt: what to show now, what to restore on failure, and
/// the remote call that confirms it.
#[derive(Clone)]
pub struct Operation<T> {
    /// Registry key for this submission.
    pub id: OpId,
    /// Which apply/rollback semantics are expected.
    pub kind: OperationKind,
    /// Entity reflected in the local view immediately.
    pub proposed: T,
    /// Entity as it was before the operation; `None` for creates.
    pub prior: Option<T>,
    action: Action<T>,
}

impl<T> Operation<T> {
    /// Builds a descriptor with a generated id.
    pub fn new<F, Fut>(kind: OperationKind, proposed: T, prior: Option<T>, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, RemoteError>> + Send + 'static,
    {
        Self {
            id: generate_op_id(kind),
            kind,
            proposed,
            prior,
            action: Arc::new(move || Box::pin(action()) as ActionFuture<T>),
        }
    }

    /// Descriptor for a provisional entity.
    pub fn create<F, Fut>(proposed: T, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, RemoteError>> + Send + 'static,
    {
        Self::new(OperationKind::Create, proposed, None, action)
    }

    /// Descriptor replacing `prior` with `proposed`.
    pub fn update<F, Fut>(proposed: T, prior: T, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, RemoteError>> + Send + 'static,
    {
        Self::new(OperationKind::Update, proposed, Some(prior), action)
    }

    /// Descriptor removing `entity`; the same value is kept as the rollback target.
    pub fn delete<F, Fut>(entity: T, action: F) -> Self
    where
        T: Clone,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, RemoteError>> + Send + 'static,
    {
        let prior = entity.clone();
        Self::new(OperationKind::Delete, entity, Some(prior), action)
    }

    /// Replaces the generated id with a caller-chosen one.
    pub fn with_id(mut self, id: impl Into<OpId>) -> Self {
        self.id = id.into();
        self
    }

    /// Shared handle to the remote action.
    pub fn action(&self) -> Action<T> {
        Arc::clone(&self.action)
    }
}

impl<T: fmt::Debug> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("proposed", &self.proposed)
            .field("prior", &self.prior)
            .finish_non_exhaustive()
    }
}
