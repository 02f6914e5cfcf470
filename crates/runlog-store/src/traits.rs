//! Storage backend traits.

use crate::cursor::Cursor;
use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// An event payload produced by the execution engine.
///
/// Stores never look inside a record; they only need to copy it and to
/// round-trip it through the journal encoding.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Per-run, append-only event log storage.
///
/// All state is partitioned by run id: calls for different runs never block
/// each other, and calls for the same run are serialized so a reader never
/// observes a partially appended record.
pub trait EventLogStorage<R: Record>: Send + Sync {
    /// Returns every record stored for `run_id` after `cursor`, in append order.
    ///
    /// This is a point-in-time read; it never waits for new records.
    fn get_logs_for_run(&self, run_id: &str, cursor: Cursor) -> Result<Vec<R>, StoreError>;

    /// Appends `record` to the log for `run_id`, creating the log if needed.
    fn store_event(&self, run_id: &str, record: &R) -> Result<(), StoreError>;

    /// Whether the logs outlive the process that wrote them.
    fn is_persistent(&self) -> bool;

    /// Whether a log exists for `run_id`, so it can be read without error.
    fn logs_ready(&self, run_id: &str) -> bool;

    /// Discards the logs of every run, along with all cached positions and locks.
    fn wipe(&self) -> Result<(), StoreError>;

    /// Returns a handler that appends records to `run_id`'s log.
    fn event_handler(self: Arc<Self>, run_id: &str) -> EventHandler<R>
    where
        Self: Sized + 'static,
    {
        EventHandler::new(self, run_id)
    }
}

/// Producer-side adapter bound to one run.
///
/// Lets the code emitting events push records without knowing which backend
/// is in use.
#[derive(Clone)]
pub struct EventHandler<R: Record> {
    run_id: String,
    storage: Arc<dyn EventLogStorage<R>>,
}

impl<R: Record> EventHandler<R> {
    /// Creates a handler writing into `storage` for `run_id`.
    pub fn new(storage: Arc<dyn EventLogStorage<R>>, run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            storage,
        }
    }

    /// Run this handler writes to.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stores one new event for the bound run.
    pub fn handle_new_event(&self, record: &R) -> Result<(), StoreError> {
        self.storage.store_event(&self.run_id, record)
    }
}
