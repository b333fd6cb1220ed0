//! Update engine and its event stream.

/// Optimistic update engine, outcomes, and retry handles.
pub mod engine;
/// Event stream types emitted by the engine.
pub mod events;
