//! In-memory storage backend.

use crate::cursor::Cursor;
use crate::error::StoreError;
use crate::lock_table::LockTable;
use crate::traits::{EventLogStorage, Record};
use parking_lot::RwLock;
use tracing::debug;

/// Process-local event log storage. Nothing survives the process.
///
/// Each run's records live inside that run's lock, so appends and reads of
/// the same run are serialized and a reader copies out a consistent prefix.
pub struct InMemoryEventLogStorage<R> {
    logs: LockTable<Vec<R>>,
    // Held shared by every call and exclusively by `wipe`
    gate: RwLock<()>,
}

impl<R: Record> InMemoryEventLogStorage<R> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            logs: LockTable::new(),
            gate: RwLock::new(()),
        }
    }
}

impl<R: Record> Default for InMemoryEventLogStorage<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> EventLogStorage<R> for InMemoryEventLogStorage<R> {
    fn get_logs_for_run(&self, run_id: &str, cursor: Cursor) -> Result<Vec<R>, StoreError> {
        let _gate = self.gate.read();
        let Some(log) = self.logs.get(run_id) else {
            return Ok(Vec::new());
        };
        let log = log.lock();
        let start = usize::try_from(cursor.consumed()).unwrap_or(usize::MAX);
        Ok(log.get(start..).map(<[R]>::to_vec).unwrap_or_default())
    }

    fn store_event(&self, run_id: &str, record: &R) -> Result<(), StoreError> {
        let _gate = self.gate.read();
        self.logs.entry(run_id).lock().push(record.clone());
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }

    fn logs_ready(&self, run_id: &str) -> bool {
        let _gate = self.gate.read();
        self.logs
            .get(run_id)
            .map(|log| !log.lock().is_empty())
            .unwrap_or(false)
    }

    fn wipe(&self) -> Result<(), StoreError> {
        let _gate = self.gate.write();
        debug!(runs = self.logs.len(), "wiping in-memory event logs");
        self.logs.clear();
        Ok(())
    }
}
