//! Per-run event log storage for a job execution engine.
//!
//! This crate provides:
//! - The [`EventLogStorage`] trait: append a run's records, read them back
//!   from a [`Cursor`], wipe everything
//! - [`InMemoryEventLogStorage`] for process-local runs
//! - [`FilesystemEventLogStorage`], one journal file per run with cached
//!   read offsets
//! - [`Tailer`] and [`WatchService`] for following a running job's log until
//!   it reports a terminal [`RunStatus`]
//!
//! ## Quick Start
//!
//! ```rust
//! use runlog_store::{Cursor, EventLogStorage, InMemoryEventLogStorage};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryEventLogStorage::<String>::new());
//! let handler = store.clone().event_handler("run-1");
//! handler.handle_new_event(&"step started".to_string())?;
//! handler.handle_new_event(&"step finished".to_string())?;
//!
//! assert_eq!(store.get_logs_for_run("run-1", Cursor::BEGINNING)?.len(), 2);
//! assert_eq!(store.get_logs_for_run("run-1", Cursor::after(0))?, vec!["step finished"]);
//! # Ok::<(), runlog_store::StoreError>(())
//! ```

#![deny(missing_docs)]

/// Store configuration and default locations.
pub mod config;
/// Read positions into a run's log.
pub mod cursor;
/// Error types for store operations.
pub mod error;
/// Filesystem-backed storage implementation.
pub mod filesystem;
/// Lazily created per-run locks.
pub mod lock_table;
/// In-memory storage implementation.
pub mod memory;
/// Run status values.
pub mod status;
/// Live tailing of a run's log.
pub mod tailer;
/// Storage backend traits.
pub mod traits;
/// Filesystem change monitoring.
pub mod watch;

pub use config::{base_runs_directory, StoreOptions};
pub use cursor::Cursor;
pub use error::StoreError;
pub use filesystem::FilesystemEventLogStorage;
pub use lock_table::LockTable;
pub use memory::InMemoryEventLogStorage;
pub use status::RunStatus;
pub use tailer::{TailCallback, TailProgress, Tailer};
pub use traits::{EventHandler, EventLogStorage, Record};
pub use watch::{SubscriptionId, TailHandle, WatchService};
