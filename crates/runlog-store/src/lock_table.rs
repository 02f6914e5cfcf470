//! Lazily created per-run locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Map from run id to that run's mutex-guarded state.
///
/// The outer lock is held only long enough to look up or insert a run's
/// entry; all work on a run happens under the per-run mutex, so runs never
/// contend with each other.
pub struct LockTable<T> {
    runs: Mutex<HashMap<String, Arc<Mutex<T>>>>,
}

impl<T: Default> LockTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the run's entry, creating it on first access.
    pub fn entry(&self, run_id: &str) -> Arc<Mutex<T>> {
        let mut runs = self.runs.lock();
        if let Some(slot) = runs.get(run_id) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(Mutex::new(T::default()));
        runs.insert(run_id.to_string(), Arc::clone(&slot));
        slot
    }

    /// Returns the run's entry if it has been created.
    pub fn get(&self, run_id: &str) -> Option<Arc<Mutex<T>>> {
        self.runs.lock().get(run_id).cloned()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.runs.lock().clear();
    }

    /// Number of runs with an entry.
    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    /// Returns `true` if no run has an entry.
    pub fn is_empty(&self) -> bool {
        self.runs.lock().is_empty()
    }
}

impl<T: Default> Default for LockTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
