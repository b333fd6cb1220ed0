//! View-side contract implemented by each consumer.

use crate::op::Operation;

/// Representative consumer adapter for lead notes.
pub mod notes;

/// Mutations the engine performs on a consumer's local view.
///
/// Callbacks are synchronous and are never invoked while the engine holds
/// its registry lock, so they may query the engine.
pub trait ViewAdapter<T>: Send + Sync + 'static {
    /// Reflects `op.proposed` in the view. Runs before `submit` returns.
    fn apply(&self, op: &Operation<T>);

    /// Undoes [`ViewAdapter::apply`] after terminal failure. Called at most
    /// once per attempt-sequence.
    fn rollback(&self, op: &Operation<T>);

    /// Starts an authoritative reload of the whole collection.
    fn refresh(&self);

    /// Receives the server-confirmed value after success. Only called when
    /// reconciliation is enabled in the engine config.
    fn confirm(&self, _op: &Operation<T>, _confirmed: Option<&T>) {}
}
