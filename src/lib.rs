//! Optimistic updates with automatic rollback.
//!
//! An [`runtime::engine::OptimisticEngine`] applies a mutation to a local
//! view as soon as it is submitted, confirms it with a remote call that is
//! retried under a timeout, and rolls the view back exactly once if every
//! attempt fails.
//!
//! # Examples
//!
//! Driving a view directly:
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use optimist::{
//!     adapter::ViewAdapter,
//!     config::EngineConfig,
//!     op::Operation,
//!     runtime::engine::OptimisticEngine,
//!     status::SilentReporter,
//! };
//!
//! #[derive(Default)]
//! struct Names(Mutex<Vec<String>>);
//!
//! impl ViewAdapter<String> for Names {
//!     fn apply(&self, op: &Operation<String>) {
//!         self.0.lock().unwrap().push(op.proposed.clone());
//!     }
//!     fn rollback(&self, op: &Operation<String>) {
//!         self.0.lock().unwrap().retain(|n| n != &op.proposed);
//!     }
//!     fn refresh(&self) {}
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let names = Arc::new(Names::default());
//! let engine = OptimisticEngine::new(names.clone(), Arc::new(SilentReporter), EngineConfig::default());
//!
//! let pending = engine.submit(Operation::create("ada".to_string(), || async {
//!     Ok(Some("ada".to_string()))
//! }));
//! assert_eq!(names.0.lock().unwrap().len(), 1);
//! assert!(pending.await.is_success());
//! assert!(!engine.has_pending());
//! # }
//! ```
//!
//! Notes backed by SQLite:
//! ```no_run
//! use std::sync::Arc;
//!
//! use optimist::{
//!     adapter::notes::NoteService,
//!     config::EngineConfig,
//!     note::NoteDraft,
//!     remote::sqlite::SqliteNoteRemote,
//!     status::TracingReporter,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let remote = Arc::new(SqliteNoteRemote::open("notes.db").expect("open sqlite"));
//! let notes = NoteService::new(remote, Some("lead-1".into()), Arc::new(TracingReporter), EngineConfig::default());
//! let outcome = notes.create(NoteDraft {
//!     lead_id: "lead-1".to_string(),
//!     content: "Call back on Monday".to_string(),
//!     kind: None,
//!     pinned: None,
//! }).await;
//! assert!(outcome.is_success());
//! # }
//! ```
#![deny(missing_docs)]

/// View-side callbacks and the note consumer adapter.
pub mod adapter;
/// Engine configuration.
pub mod config;
/// Registry bookkeeping.
pub mod core;
/// Error types.
pub mod error;
/// Timeout and retry executor.
pub mod executor;
/// Lead note domain records.
pub mod note;
/// Operation descriptor model.
pub mod op;
/// Note backing store abstraction and SQLite implementation.
pub mod remote;
/// Update engine and events.
pub mod runtime;
/// Status notification contract and reporters.
pub mod status;
/// Shared primitive types.
pub mod types;
