mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use optimist::{
    adapter::notes::NoteService,
    config::EngineConfig,
    error::RemoteError,
    note::{Note, NoteDraft, NoteKind, NotePatch, is_provisional_id},
    op::Operation,
    remote::{BackendError, BackendResult, NoteRemote, sqlite::SqliteNoteRemote},
    status::SilentReporter,
    types::OperationKind,
};

/// SQLite store whose writes can be switched off and whose next list can stall.
struct FlakyRemote {
    inner: SqliteNoteRemote,
    offline: AtomicBool,
    stall_next_list: AtomicBool,
}

impl FlakyRemote {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteNoteRemote::open_in_memory().expect("open sqlite"),
            offline: AtomicBool::new(false),
            stall_next_list: AtomicBool::new(false),
        })
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn guard(&self) -> BackendResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        Ok(())
    }
}

impl NoteRemote for FlakyRemote {
    fn list(&self, lead_id: Option<&str>) -> BackendResult<Vec<Note>> {
        let notes = self.inner.list(lead_id)?;
        if self.stall_next_list.swap(false, Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(500));
        }
        Ok(notes)
    }

    fn create(&self, draft: &NoteDraft) -> BackendResult<Note> {
        self.guard()?;
        self.inner.create(draft)
    }

    fn update(&self, id: &str, patch: &NotePatch) -> BackendResult<Note> {
        self.guard()?;
        self.inner.update(id, patch)
    }

    fn delete(&self, id: &str) -> BackendResult<()> {
        self.guard()?;
        self.inner.delete(id)
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        timeout_ms: 2_000,
        max_retries: 1,
        retry_delay_ms: 5,
        reconcile_on_success: true,
        ..EngineConfig::default()
    }
}

fn service(remote: &Arc<FlakyRemote>) -> NoteService {
    common::init_tracing();
    NoteService::new(
        remote.clone(),
        Some("lead-1".to_string()),
        Arc::new(SilentReporter),
        config(),
    )
}

fn draft(content: &str) -> NoteDraft {
    NoteDraft {
        lead_id: "lead-1".to_string(),
        content: content.to_string(),
        kind: None,
        pinned: None,
    }
}

fn stored(id: &str, content: &str) -> Note {
    Note {
        id: id.to_string(),
        lead_id: "lead-1".to_string(),
        content: content.to_string(),
        kind: NoteKind::Reminder,
        pinned: false,
        updated_ms: 1,
    }
}

async fn loaded(remote: &Arc<FlakyRemote>, notes: &[Note]) -> NoteService {
    for note in notes {
        remote.inner.seed(note).expect("seed");
    }
    let svc = service(remote);
    svc.refresh();
    svc.view().refreshed().await;
    svc
}

#[tokio::test]
async fn create_shows_provisional_note_then_server_id() {
    let remote = FlakyRemote::new();
    let svc = service(&remote);

    let pending = svc.create(draft("Call back on Monday"));
    let shown = svc.notes();
    assert_eq!(shown.len(), 1);
    assert!(is_provisional_id(&shown[0].id), "{}", shown[0].id);
    assert_eq!(shown[0].kind, NoteKind::Reflection);

    let outcome = pending.await;
    assert!(outcome.is_success());
    assert_eq!(outcome.result().map(|n| n.id.as_str()), Some("note-1"));

    let shown = svc.notes();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].id, "note-1");
    assert_eq!(shown[0].content, "Call back on Monday");
    assert_eq!(remote.inner.count().expect("count"), 1);
}

#[tokio::test]
async fn failed_create_removes_provisional_note_and_retries_later() {
    let remote = FlakyRemote::new();
    let svc = service(&remote);
    remote.set_offline(true);

    let outcome = svc.create(draft("draft")).await;
    assert!(!outcome.is_success());
    assert!(svc.notes().is_empty());
    assert!(svc.engine().has_failed());

    remote.set_offline(false);
    let outcomes = svc.engine().retry_failed_operations().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_success());

    let shown = svc.notes();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].id, "note-1");
    assert!(!svc.engine().has_failed());
}

#[tokio::test]
async fn failed_update_restores_original_note() {
    let remote = FlakyRemote::new();
    let svc = loaded(&remote, &[stored("note-1", "before")]).await;
    let original = svc.notes()[0].clone();
    remote.set_offline(true);

    let pending = svc.update(
        &original,
        NotePatch {
            content: Some("after".to_string()),
            ..NotePatch::default()
        },
    );
    assert_eq!(svc.notes()[0].content, "after");

    let outcome = pending.await;
    assert!(!outcome.is_success());
    assert_eq!(svc.notes(), vec![original]);
    assert_eq!(svc.engine().failed_count(), 1);
    assert_eq!(
        remote.inner.get("note-1").expect("get").map(|n| n.content),
        Some("before".to_string())
    );
}

#[tokio::test]
async fn concurrent_failed_deletes_restore_note_once() {
    let remote = FlakyRemote::new();
    let svc = loaded(&remote, &[stored("note-1", "keep me")]).await;
    let note = svc.notes()[0].clone();
    remote.set_offline(true);

    let first = svc.delete(&note);
    let second = svc.delete(&note);
    assert!(svc.notes().is_empty());

    let (first, second) = tokio::join!(first, second);
    assert!(!first.is_success() && !second.is_success());
    assert_eq!(svc.notes(), vec![note]);
}

#[tokio::test]
async fn delete_confirms_against_store() {
    let remote = FlakyRemote::new();
    let svc = loaded(&remote, &[stored("note-1", "a"), stored("note-2", "b")]).await;
    let note = svc.view().get("note-1").expect("note-1 loaded");

    assert!(svc.delete(&note).await.is_success());

    assert_eq!(svc.notes().len(), 1);
    assert!(remote.inner.get("note-1").expect("get").is_none());
}

#[tokio::test]
async fn toggle_pin_persists() {
    let remote = FlakyRemote::new();
    let svc = loaded(&remote, &[stored("note-1", "pin me")]).await;
    let note = svc.notes()[0].clone();

    let pending = svc.toggle_pin(&note);
    assert!(svc.notes()[0].pinned);
    assert!(pending.await.is_success());

    assert!(svc.notes()[0].pinned);
    assert!(remote.inner.get("note-1").expect("get").expect("stored").pinned);
}

#[tokio::test]
async fn emergency_refresh_reloads_collection() {
    let remote = FlakyRemote::new();
    let svc = service(&remote);
    remote.inner.seed(&stored("note-1", "a")).expect("seed");
    remote.inner.seed(&stored("note-2", "b")).expect("seed");
    remote
        .inner
        .seed(&Note {
            lead_id: "lead-2".to_string(),
            ..stored("note-3", "other lead")
        })
        .expect("seed");

    svc.engine().emergency_refresh();
    svc.view().refreshed().await;

    let ids: Vec<String> = svc.notes().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["note-1".to_string(), "note-2".to_string()]);
    assert_eq!(svc.view().refresh_count(), 1);
}

#[tokio::test]
async fn update_rollback_without_prior_reloads() {
    let remote = FlakyRemote::new();
    let svc = loaded(&remote, &[stored("note-1", "server copy")]).await;
    let refreshes = svc.view().refresh_count();

    let proposed = Note {
        content: "local edit".to_string(),
        ..stored("note-1", "")
    };
    let op = Operation::new(OperationKind::Update, proposed, None, || async {
        Err(RemoteError::new("rejected"))
    });

    let pending = svc.engine().submit(op);
    assert_eq!(svc.notes()[0].content, "local edit");
    assert!(!pending.await.is_success());
    svc.view().refreshed().await;

    assert_eq!(svc.view().refresh_count(), refreshes + 1);
    assert_eq!(svc.notes()[0].content, "server copy");
}

#[tokio::test]
async fn older_reload_finishing_last_is_discarded() {
    let remote = FlakyRemote::new();
    remote.inner.seed(&stored("note-1", "a")).expect("seed");
    let svc = service(&remote);

    remote.stall_next_list.store(true, Ordering::SeqCst);
    svc.refresh();
    tokio::time::sleep(Duration::from_millis(100)).await;

    remote.inner.seed(&stored("note-2", "b")).expect("seed");
    svc.refresh();
    svc.view().refreshed().await;
    assert_eq!(svc.notes().len(), 2);

    tokio::time::sleep(Duration::from_millis(800)).await;
    let ids: Vec<String> = svc.notes().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["note-1".to_string(), "note-2".to_string()]);
    assert_eq!(svc.view().refresh_count(), 2);
}

#[tokio::test]
async fn create_for_other_lead_is_not_shown_in_scoped_view() {
    let remote = FlakyRemote::new();
    let svc = service(&remote);

    let outcome = svc
        .create(NoteDraft {
            lead_id: "lead-2".to_string(),
            ..draft("belongs elsewhere")
        })
        .await;

    assert!(outcome.is_success());
    assert!(svc.notes().is_empty());
    assert_eq!(remote.inner.list(Some("lead-2")).expect("list").len(), 1);
}
