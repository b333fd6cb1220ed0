//! SQLite-backed note store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    note::{Note, NoteDraft, NotePatch},
    types::now_ms,
};

use super::{BackendError, BackendResult, NoteRemote};

const NOTE_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NoteEnvelope {
    format_version: u16,
    note: Note,
}

/// SQLite implementation of [`crate::remote::NoteRemote`].
pub struct SqliteNoteRemote {
    conn: Mutex<Connection>,
}

impl SqliteNoteRemote {
    /// Opens or creates a note database at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory note database.
    pub fn open_in_memory() -> BackendResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> BackendResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Stores `note` under its own id, replacing any row with that id.
    pub fn seed(&self, note: &Note) -> BackendResult<()> {
        let payload = encode(note)?;
        self.conn().execute(
            "INSERT INTO notes(id, lead_id, updated_ms, payload) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET lead_id = ?2, updated_ms = ?3, payload = ?4",
            params![note.id, note.lead_id, note.updated_ms as i64, payload],
        )?;
        Ok(())
    }

    /// Fetches one note.
    pub fn get(&self, id: &str) -> BackendResult<Option<Note>> {
        load(&self.conn(), id)
    }

    /// Number of stored notes.
    pub fn count(&self) -> BackendResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NoteRemote for SqliteNoteRemote {
    fn list(&self, lead_id: Option<&str>) -> BackendResult<Vec<Note>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT payload FROM notes WHERE ?1 IS NULL OR lead_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![lead_id], |row| row.get::<_, Vec<u8>>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode(&row?)?);
        }
        Ok(out)
    }

    fn create(&self, draft: &NoteDraft) -> BackendResult<Note> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let updated_ms = now_ms();

        // Reserve the row first; its seq becomes the server id.
        tx.execute(
            "INSERT INTO notes(id, lead_id, updated_ms, payload) VALUES (?1, ?2, ?3, x'')",
            params![format!("pending-{}", rand::random::<u64>()), draft.lead_id, updated_ms as i64],
        )?;
        let seq = tx.last_insert_rowid();
        let note = draft.clone().into_note(format!("note-{seq}"), updated_ms);
        tx.execute(
            "UPDATE notes SET id = ?1, payload = ?2 WHERE seq = ?3",
            params![note.id, encode(&note)?, seq],
        )?;
        tx.commit()?;

        debug!(note_id = %note.id, "note created");
        Ok(note)
    }

    fn update(&self, id: &str, patch: &NotePatch) -> BackendResult<Note> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut note = load(&tx, id)?.ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        patch.apply_to(&mut note);
        note.updated_ms = now_ms();

        let changed = tx.execute(
            "UPDATE notes SET updated_ms = ?1, payload = ?2 WHERE id = ?3",
            params![note.updated_ms as i64, encode(&note)?, id],
        )?;
        if changed == 0 {
            return Err(BackendError::NotFound(id.to_string()));
        }
        tx.commit()?;
        Ok(note)
    }

    fn delete(&self, id: &str) -> BackendResult<()> {
        let removed = self
            .conn()
            .execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn load(conn: &Connection, id: &str) -> BackendResult<Option<Note>> {
    let payload: Option<Vec<u8>> = conn
        .query_row("SELECT payload FROM notes WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    payload.map(|p| decode(&p)).transpose()
}

fn encode(note: &Note) -> BackendResult<Vec<u8>> {
    Ok(serde_json::to_vec(&NoteEnvelope {
        format_version: NOTE_FORMAT_VERSION,
        note: note.clone(),
    })?)
}

fn decode(payload: &[u8]) -> BackendResult<Note> {
    let env: NoteEnvelope = serde_json::from_slice(payload)?;
    if env.format_version != NOTE_FORMAT_VERSION {
        return Err(BackendError::Serde(serde::de::Error::custom(format!(
            "unsupported note format version: {}",
            env.format_version
        ))));
    }
    Ok(env.note)
}
