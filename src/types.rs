//! Shared primitive IDs, operation kinds, and clock helpers.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identifier of one submitted operation.
pub type OpId = String;
/// Registry ownership token for one attempt-sequence.
pub type Ticket = u64;

/// Mutation category carried by an operation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A provisional entity is added to the view.
    Create,
    /// An existing entity is replaced by a modified copy.
    Update,
    /// An existing entity is removed from the view.
    Delete,
}

impl OperationKind {
    /// Lowercase name used in generated ids and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generates `"{kind}-{unix_ms}-{random}"`.
///
/// Unique in practice, not cryptographically.
pub fn generate_op_id(kind: OperationKind) -> OpId {
    format!("{}-{}-{}", kind, now_ms(), rand::random::<u32>())
}

/// Milliseconds since the unix epoch, `0` if the clock is before it.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
