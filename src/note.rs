//! Lead note records, drafts, and patches.

use serde::{Deserialize, Serialize};

/// Identifier of a note. Server-issued ids look like `note-7`, provisional
/// ones start with [`PROVISIONAL_PREFIX`].
pub type NoteId = String;

/// Prefix of ids assigned to notes that the server has not confirmed yet.
pub const PROVISIONAL_PREFIX: &str = "temp-";

/// Returns true for ids minted locally for provisional notes.
pub fn is_provisional_id(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

/// Category of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Free-form thought.
    #[default]
    Reflection,
    /// Something to remember.
    Reminder,
    /// Follow-up to schedule.
    FollowUp,
    /// Information about the customer.
    CustomerInfo,
}

/// A note attached to a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note id.
    pub id: NoteId,
    /// Owning lead.
    pub lead_id: String,
    /// Body text.
    pub content: String,
    /// Category.
    pub kind: NoteKind,
    /// Pinned notes are shown first by the UI.
    pub pinned: bool,
    /// Last modification, milliseconds since epoch.
    pub updated_ms: u64,
}

/// Insert payload for a new note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    /// Owning lead.
    pub lead_id: String,
    /// Body text.
    pub content: String,
    /// Category; [`NoteKind::default`] when absent.
    pub kind: Option<NoteKind>,
    /// Pinned flag; `false` when absent.
    pub pinned: Option<bool>,
}

impl NoteDraft {
    /// Materializes the draft under `id`.
    pub fn into_note(self, id: NoteId, updated_ms: u64) -> Note {
        Note {
            id,
            lead_id: self.lead_id,
            content: self.content,
            kind: self.kind.unwrap_or_default(),
            pinned: self.pinned.unwrap_or(false),
            updated_ms,
        }
    }
}

/// Sparse patch where each `Some` field overwrites the note value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotePatch {
    /// Optional replacement body.
    pub content: Option<String>,
    /// Optional replacement category.
    pub kind: Option<NoteKind>,
    /// Optional replacement pinned flag.
    pub pinned: Option<bool>,
}

impl NotePatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `note`.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(v) = &self.content {
            note.content = v.clone();
        }
        if let Some(v) = self.kind {
            note.kind = v;
        }
        if let Some(v) = self.pinned {
            note.pinned = v;
        }
    }

    /// Returns a copy of `note` with this patch applied.
    pub fn applied(&self, note: &Note) -> Note {
        let mut out = note.clone();
        self.apply_to(&mut out);
        out
    }
}
