//! Registry bookkeeping owned by each engine.

/// Pending/failed/log registry with ownership tickets.
pub mod registry;
