#![allow(dead_code)]

use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicBool, AtomicU32, Ordering},
};
use std::time::Duration;

use optimist::{
    adapter::ViewAdapter,
    config::EngineConfig,
    error::RemoteError,
    op::{ActionFuture, Operation},
    runtime::engine::{OptimisticEngine, RetryAction},
    status::StatusReporter,
    types::OperationKind,
};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub name: String,
}

pub fn item(id: &str, name: &str) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
    }
}

#[derive(Default)]
pub struct ItemView {
    pub items: Mutex<Vec<Item>>,
    pub rollbacks: Mutex<Vec<String>>,
    pub confirms: Mutex<Vec<(String, Option<Item>)>>,
    pub refreshes: AtomicU32,
    pub panic_on_apply: AtomicBool,
}

impl ItemView {
    pub fn seeded(items: Vec<Item>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    pub fn items(&self) -> Vec<Item> {
        self.items.lock().expect("lock").clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.items().into_iter().map(|i| i.name).collect()
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.lock().expect("lock").len()
    }

    pub fn rollbacks_for(&self, op_id: &str) -> usize {
        self.rollbacks
            .lock()
            .expect("lock")
            .iter()
            .filter(|id| id.as_str() == op_id)
            .count()
    }
}

impl ViewAdapter<Item> for ItemView {
    fn apply(&self, op: &Operation<Item>) {
        if self.panic_on_apply.load(Ordering::SeqCst) {
            panic!("apply exploded");
        }
        let mut items = self.items.lock().expect("lock");
        match op.kind {
            OperationKind::Create => items.push(op.proposed.clone()),
            OperationKind::Update => {
                for slot in items.iter_mut().filter(|i| i.id == op.proposed.id) {
                    *slot = op.proposed.clone();
                }
            }
            OperationKind::Delete => items.retain(|i| i.id != op.proposed.id),
        }
    }

    fn rollback(&self, op: &Operation<Item>) {
        self.rollbacks.lock().expect("lock").push(op.id.clone());
        let mut items = self.items.lock().expect("lock");
        match op.kind {
            OperationKind::Create => items.retain(|i| i.id != op.proposed.id),
            OperationKind::Update => {
                let prior = op.prior.clone().expect("prior state");
                for slot in items.iter_mut().filter(|i| i.id == prior.id) {
                    *slot = prior.clone();
                }
            }
            OperationKind::Delete => {
                let prior = op.prior.clone().expect("prior state");
                if !items.iter().any(|i| i.id == prior.id) {
                    items.push(prior);
                }
            }
        }
    }

    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn confirm(&self, op: &Operation<Item>, confirmed: Option<&Item>) {
        self.confirms
            .lock()
            .expect("lock")
            .push((op.id.clone(), confirmed.cloned()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(OperationKind),
    Error {
        kind: OperationKind,
        message: String,
        op_id: String,
    },
    Info(String),
}

#[derive(Default)]
pub struct RecordingReporter {
    pub notices: Mutex<Vec<Notice>>,
    pub retries: Mutex<Vec<RetryAction<Item>>>,
}

impl RecordingReporter {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("lock").clone()
    }

    pub fn take_retry(&self) -> Option<RetryAction<Item>> {
        self.retries.lock().expect("lock").pop()
    }
}

impl StatusReporter<Item> for RecordingReporter {
    fn notify_success(&self, kind: OperationKind) {
        self.notices.lock().expect("lock").push(Notice::Success(kind));
    }

    fn notify_error(&self, kind: OperationKind, message: &str, retry: RetryAction<Item>) {
        self.notices.lock().expect("lock").push(Notice::Error {
            kind,
            message: message.to_string(),
            op_id: retry.operation_id().to_string(),
        });
        self.retries.lock().expect("lock").push(retry);
    }

    fn notify_info(&self, message: &str) {
        self.notices
            .lock()
            .expect("lock")
            .push(Notice::Info(message.to_string()));
    }
}

pub struct Harness {
    pub engine: OptimisticEngine<Item>,
    pub view: Arc<ItemView>,
    pub reporter: Arc<RecordingReporter>,
}

pub fn harness(view: ItemView, config: EngineConfig) -> Harness {
    init_tracing();
    let view = Arc::new(view);
    let reporter = Arc::new(RecordingReporter::default());
    let engine = OptimisticEngine::new(view.clone(), reporter.clone(), config);
    Harness {
        engine,
        view,
        reporter,
    }
}

/// Action failing its first `fail_first` calls, then resolving with `value`.
pub fn flaky(
    calls: &Arc<AtomicU32>,
    fail_first: u32,
    value: Option<Item>,
) -> impl Fn() -> ActionFuture<Item> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || -> ActionFuture<Item> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let value = value.clone();
        Box::pin(async move {
            if n <= fail_first {
                Err(RemoteError::new(format!("attempt {n} refused")))
            } else {
                Ok(value)
            }
        })
    }
}

pub fn always_fail(calls: &Arc<AtomicU32>) -> impl Fn() -> ActionFuture<Item> + Send + Sync + 'static {
    flaky(calls, u32::MAX, None)
}

/// Action that resolves with `value` after `delay`.
pub fn slow(
    calls: &Arc<AtomicU32>,
    delay: Duration,
    value: Option<Item>,
) -> impl Fn() -> ActionFuture<Item> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || -> ActionFuture<Item> {
        calls.fetch_add(1, Ordering::SeqCst);
        let value = value.clone();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok::<_, RemoteError>(value)
        })
    }
}

pub fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

pub fn calls(counter: &Arc<AtomicU32>) -> u32 {
    counter.load(Ordering::SeqCst)
}
