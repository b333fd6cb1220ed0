use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::{
    op::Operation,
    types::{OpId, Ticket},
};

/// Bookkeeping of in-flight and failed operations for one engine.
///
/// An id lives in at most one of `pending`/`failed`, and has a `log` entry
/// exactly while it lives in either.
pub struct Registry<T> {
    pending: HashMap<OpId, Ticket>,
    failed: HashSet<OpId>,
    log: HashMap<OpId, Arc<Operation<T>>>,
    next_ticket: Ticket,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            failed: HashSet::new(),
            log: HashMap::new(),
            next_ticket: 1,
        }
    }

    /// Marks `op` pending, superseding any failed or pending entry with the
    /// same id, and returns the ticket that now owns the id.
    pub fn begin(&mut self, op: Arc<Operation<T>>) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        self.failed.remove(&op.id);
        self.pending.insert(op.id.clone(), ticket);
        self.log.insert(op.id.clone(), op);
        ticket
    }

    /// Whether `ticket` is the live attempt-sequence for a pending `id`.
    pub fn owns(&self, id: &str, ticket: Ticket) -> bool {
        self.pending.get(id) == Some(&ticket)
    }

    /// Drops a confirmed id. Returns false when `ticket` no longer owns it.
    pub fn confirm(&mut self, id: &str, ticket: Ticket) -> bool {
        if !self.owns(id, ticket) {
            return false;
        }
        self.pending.remove(id);
        self.log.remove(id);
        true
    }

    /// Moves an id from pending to failed, keeping its log entry. Returns
    /// false when `ticket` no longer owns it.
    pub fn fail(&mut self, id: &str, ticket: Ticket) -> bool {
        if !self.owns(id, ticket) {
            return false;
        }
        self.pending.remove(id);
        self.failed.insert(id.to_string());
        true
    }

    /// Empties the failed set and hands back the logged descriptors.
    pub fn take_failed(&mut self) -> Vec<Arc<Operation<T>>> {
        let failed = std::mem::take(&mut self.failed);
        failed
            .into_iter()
            .filter_map(|id| self.log.remove(&id))
            .collect()
    }

    /// Forgets every failed id. Returns how many were dropped.
    pub fn clear_failed(&mut self) -> usize {
        let failed = std::mem::take(&mut self.failed);
        for id in &failed {
            self.log.remove(id);
        }
        failed.len()
    }

    /// Forgets everything. Tickets handed out earlier stay invalid.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.failed.clear();
        self.log.clear();
    }

    /// Whether `id` is pending.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Whether `id` is failed.
    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    /// Whether anything is pending.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether anything is failed.
    pub fn has_failed(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Number of pending ids.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of failed ids.
    pub fn failed_len(&self) -> usize {
        self.failed.len()
    }

    /// Number of logged descriptors.
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Pending ids, sorted.
    pub fn pending_ids(&self) -> Vec<OpId> {
        let mut ids: Vec<OpId> = self.pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Failed ids, sorted.
    pub fn failed_ids(&self) -> Vec<OpId> {
        let mut ids: Vec<OpId> = self.failed.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Logged descriptor for a pending or failed `id`.
    pub fn logged(&self, id: &str) -> Option<Arc<Operation<T>>> {
        self.log.get(id).cloned()
    }
}
