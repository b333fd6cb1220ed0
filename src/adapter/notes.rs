//! Optimistic note collection for one lead (or all leads).

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    error::RemoteError,
    note::{Note, NoteDraft, NotePatch, PROVISIONAL_PREFIX},
    op::Operation,
    remote::{BackendResult, NoteRemote},
    runtime::engine::{OptimisticEngine, SubmitFuture},
    status::StatusReporter,
    types::{OperationKind, now_ms},
};

use super::ViewAdapter;

/// Local note list mutated by the engine and reloaded from a [`NoteRemote`].
#[derive(Clone)]
pub struct NoteView {
    state: Arc<ViewState>,
}

struct ViewState {
    lead_id: Option<String>,
    notes: Mutex<Vec<Note>>,
    remote: Arc<dyn NoteRemote>,
    reload: Mutex<Option<JoinHandle<()>>>,
    refreshes: AtomicUsize,
}

impl NoteView {
    /// Empty view over `remote`, scoped to `lead_id` when given.
    pub fn new(remote: Arc<dyn NoteRemote>, lead_id: Option<String>) -> Self {
        Self {
            state: Arc::new(ViewState {
                lead_id,
                notes: Mutex::new(Vec::new()),
                remote,
                reload: Mutex::new(None),
                refreshes: AtomicUsize::new(0),
            }),
        }
    }

    /// Lead the view is scoped to; `None` for all leads.
    pub fn lead_id(&self) -> Option<&str> {
        self.state.lead_id.as_deref()
    }

    /// Snapshot of the current list.
    pub fn notes(&self) -> Vec<Note> {
        self.notes_mut().clone()
    }

    /// Note with `id`, if currently shown.
    pub fn get(&self, id: &str) -> Option<Note> {
        self.notes_mut().iter().find(|n| n.id == id).cloned()
    }

    /// Number of reloads requested so far.
    pub fn refresh_count(&self) -> usize {
        self.state.refreshes.load(Ordering::SeqCst)
    }

    /// Waits for the most recently started reload to finish.
    pub async fn refreshed(&self) {
        let handle = self
            .state
            .reload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "note reload task failed");
            }
        }
    }

    fn in_scope(&self, note: &Note) -> bool {
        self.lead_id().is_none_or(|lead| lead == note.lead_id)
    }

    fn notes_mut(&self) -> MutexGuard<'_, Vec<Note>> {
        self.state.notes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, id: &str, note: Note) {
        let mut notes = self.notes_mut();
        for slot in notes.iter_mut().filter(|n| n.id == id) {
            *slot = note.clone();
        }
    }

    fn remove(&self, id: &str) {
        self.notes_mut().retain(|n| n.id != id);
    }

    // Only the newest reload may write; a slower, older one is dropped.
    fn reload_blocking(state: &ViewState, generation: usize) {
        match state.remote.list(state.lead_id.as_deref()) {
            Ok(notes) => {
                let mut current = state.notes.lock().unwrap_or_else(PoisonError::into_inner);
                if state.refreshes.load(Ordering::SeqCst) != generation {
                    debug!(generation, "stale note reload discarded");
                    return;
                }
                info!(count = notes.len(), "notes reloaded");
                *current = notes;
            }
            Err(err) => warn!(error = %err, "note reload failed"),
        }
    }
}

impl ViewAdapter<Note> for NoteView {
    fn apply(&self, op: &Operation<Note>) {
        let note = &op.proposed;
        debug!(op_id = %op.id, note_id = %note.id, kind = %op.kind, "apply note");
        match op.kind {
            OperationKind::Create if !self.in_scope(note) => {
                warn!(op_id = %op.id, lead_id = %note.lead_id, "note outside view scope, not shown");
            }
            OperationKind::Create => self.notes_mut().push(note.clone()),
            OperationKind::Update => self.replace(&note.id, note.clone()),
            OperationKind::Delete => self.remove(&note.id),
        }
    }

    fn rollback(&self, op: &Operation<Note>) {
        let note = &op.proposed;
        debug!(op_id = %op.id, note_id = %note.id, kind = %op.kind, "roll back note");
        match op.kind {
            OperationKind::Create => self.remove(&note.id),
            OperationKind::Update => match &op.prior {
                Some(prior) => self.replace(&note.id, prior.clone()),
                None => {
                    warn!(op_id = %op.id, "update without prior state, reloading instead");
                    self.refresh();
                }
            },
            OperationKind::Delete => {
                let restored = op.prior.as_ref().unwrap_or(note);
                let mut notes = self.notes_mut();
                if !notes.iter().any(|n| n.id == restored.id) {
                    notes.push(restored.clone());
                }
            }
        }
    }

    fn refresh(&self) {
        let generation = self.state.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            Self::reload_blocking(&self.state, generation);
            return;
        };

        let state = Arc::clone(&self.state);
        let handle = runtime.spawn_blocking(move || Self::reload_blocking(&state, generation));
        let previous = self
            .state
            .reload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        drop(previous);
    }

    fn confirm(&self, op: &Operation<Note>, confirmed: Option<&Note>) {
        let Some(server) = confirmed else {
            return;
        };
        match op.kind {
            OperationKind::Create | OperationKind::Update => {
                debug!(from = %op.proposed.id, to = %server.id, "reconcile note");
                self.replace(&op.proposed.id, server.clone());
            }
            OperationKind::Delete => {}
        }
    }
}

/// Note operations for one collection: builds descriptors, supplies the
/// view callbacks, and runs the remote calls.
#[derive(Clone)]
pub struct NoteService {
    view: NoteView,
    remote: Arc<dyn NoteRemote>,
    engine: OptimisticEngine<Note>,
}

impl NoteService {
    /// Builds an empty view over `remote` and an engine driving it.
    ///
    /// Call [`NoteService::refresh`] to load the initial list.
    pub fn new(
        remote: Arc<dyn NoteRemote>,
        lead_id: Option<String>,
        reporter: Arc<dyn StatusReporter<Note>>,
        config: EngineConfig,
    ) -> Self {
        let view = NoteView::new(Arc::clone(&remote), lead_id);
        let engine = OptimisticEngine::new(Arc::new(view.clone()), reporter, config);
        Self {
            view,
            remote,
            engine,
        }
    }

    /// Engine running this collection's operations.
    pub fn engine(&self) -> &OptimisticEngine<Note> {
        &self.engine
    }

    /// Local view the engine mutates.
    pub fn view(&self) -> &NoteView {
        &self.view
    }

    /// Snapshot of the notes currently shown.
    pub fn notes(&self) -> Vec<Note> {
        self.view.notes()
    }

    /// Reloads the collection from the remote.
    pub fn refresh(&self) {
        self.view.refresh();
    }

    /// Shows a provisional note immediately and creates it remotely.
    pub fn create(&self, draft: NoteDraft) -> SubmitFuture<Note> {
        let provisional = draft.clone().into_note(provisional_id(), now_ms());
        let remote = Arc::clone(&self.remote);

        self.engine.submit(Operation::create(provisional, move || {
            let remote = Arc::clone(&remote);
            let draft = draft.clone();
            async move { blocking(move || remote.create(&draft)).await.map(Some) }
        }))
    }

    /// Shows `original` with `patch` applied and updates it remotely.
    pub fn update(&self, original: &Note, patch: NotePatch) -> SubmitFuture<Note> {
        let mut proposed = patch.applied(original);
        proposed.updated_ms = now_ms();
        let remote = Arc::clone(&self.remote);
        let id = original.id.clone();

        self.engine.submit(Operation::update(proposed, original.clone(), move || {
            let remote = Arc::clone(&remote);
            let id = id.clone();
            let patch = patch.clone();
            async move { blocking(move || remote.update(&id, &patch)).await.map(Some) }
        }))
    }

    /// Flips the pinned flag of `note`.
    pub fn toggle_pin(&self, note: &Note) -> SubmitFuture<Note> {
        self.update(
            note,
            NotePatch {
                pinned: Some(!note.pinned),
                ..NotePatch::default()
            },
        )
    }

    /// Hides `note` immediately and deletes it remotely.
    pub fn delete(&self, note: &Note) -> SubmitFuture<Note> {
        let remote = Arc::clone(&self.remote);
        let id = note.id.clone();

        self.engine.submit(Operation::delete(note.clone(), move || {
            let remote = Arc::clone(&remote);
            let id = id.clone();
            async move { blocking(move || remote.delete(&id)).await.map(|()| None) }
        }))
    }
}

fn provisional_id() -> String {
    format!("{PROVISIONAL_PREFIX}{}-{}", now_ms(), rand::random::<u32>())
}

async fn blocking<R, F>(call: F) -> Result<R, RemoteError>
where
    R: Send + 'static,
    F: FnOnce() -> BackendResult<R> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| RemoteError::new(format!("join error: {e}")))?
        .map_err(RemoteError::from)
}
