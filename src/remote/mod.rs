//! Backing store that note actions talk to.

/// SQLite implementation.
pub mod sqlite;

use thiserror::Error;

use crate::{
    error::RemoteError,
    note::{Note, NoteDraft, NotePatch},
};

/// Failure of a [`NoteRemote`] call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Storage engine error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// No note with this id.
    #[error("note not found: {0}")]
    NotFound(String),
}

impl From<BackendError> for RemoteError {
    fn from(value: BackendError) -> Self {
        RemoteError::new(value.to_string())
    }
}

/// Result of a [`NoteRemote`] call.
pub type BackendResult<T> = Result<T, BackendError>;

/// Source of truth for notes. Calls block and are made from
/// `spawn_blocking`.
pub trait NoteRemote: Send + Sync + 'static {
    /// Notes of `lead_id`, or of every lead, in insertion order.
    fn list(&self, lead_id: Option<&str>) -> BackendResult<Vec<Note>>;
    /// Stores a new note and returns it with its server id.
    fn create(&self, draft: &NoteDraft) -> BackendResult<Note>;
    /// Patches note `id` and returns the stored result.
    fn update(&self, id: &str, patch: &NotePatch) -> BackendResult<Note>;
    /// Removes note `id`.
    fn delete(&self, id: &str) -> BackendResult<()>;
}
