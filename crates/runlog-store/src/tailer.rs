//! Live delivery of a run's new records to a callback.

use crate::cursor::Cursor;
use crate::status::RunStatus;
use crate::traits::{EventLogStorage, Record};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback receiving each new record; its return value decides whether
/// tailing continues.
pub type TailCallback<R> = Box<dyn FnMut(R) -> RunStatus + Send>;

/// Result of handling one change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailProgress {
    /// Keep routing notifications to this tailer.
    Watching,
    /// The tailer has stopped and should be unsubscribed.
    Finished,
}

/// Type-erased view of a tailer, as held by the watch service.
pub(crate) trait LogTail: Send + Sync {
    fn path(&self) -> &Path;
    fn on_change(&self) -> TailProgress;
    fn stop(&self);
    fn is_stopped(&self) -> bool;
    fn cursor(&self) -> Cursor;
}

/// Follows one run's log and hands every newly visible record to a callback.
///
/// Each change notification triggers a read from the current cursor. The
/// cursor moves past the returned records before any callback runs, so a
/// repeated or coalesced notification reads nothing it has already
/// delivered. The tailer stops for good as soon as the callback returns a
/// terminal [`RunStatus`]; records after that one are not delivered. A
/// callback that panics stops its own tailer and nothing else.
pub struct Tailer<R: Record> {
    storage: Arc<dyn EventLogStorage<R>>,
    run_id: String,
    path: PathBuf,
    // Held for a whole read-and-deliver pass
    callback: Mutex<TailCallback<R>>,
    cursor: AtomicU64,
    stopped: AtomicBool,
}

impl<R: Record> Tailer<R> {
    /// Creates a tailer for `run_id` whose log lives at `path`.
    ///
    /// `path` must match exactly the paths the watch service is notified
    /// about, so callers normally pass a canonical path.
    pub fn new<F>(
        storage: Arc<dyn EventLogStorage<R>>,
        run_id: impl Into<String>,
        path: impl Into<PathBuf>,
        start_cursor: Cursor,
        callback: F,
    ) -> Self
    where
        F: FnMut(R) -> RunStatus + Send + 'static,
    {
        Self {
            storage,
            run_id: run_id.into(),
            path: path.into(),
            callback: Mutex::new(Box::new(callback)),
            cursor: AtomicU64::new(start_cursor.consumed()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Run being followed.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Reads whatever is new and delivers it.
    ///
    /// Read failures are logged and dropped: they leave the cursor where it
    /// was, so the next notification retries from the same position.
    pub fn process(&self) -> TailProgress {
        let mut callback = self.callback.lock();
        if self.is_stopped() {
            return TailProgress::Finished;
        }

        let cursor = self.cursor();
        let records = match self.storage.get_logs_for_run(&self.run_id, cursor) {
            Ok(records) => records,
            Err(e) if e.is_not_found() => {
                debug!(run_id = %self.run_id, "log not present yet");
                return TailProgress::Watching;
            }
            Err(e) => {
                warn!(run_id = %self.run_id, %cursor, error = %e, "tail read failed");
                return TailProgress::Watching;
            }
        };

        self.cursor
            .store(cursor.advance(records.len() as u64).consumed(), Ordering::SeqCst);
        for record in records {
            if self.is_stopped() {
                return TailProgress::Finished;
            }
            let status = match panic::catch_unwind(AssertUnwindSafe(|| (*callback)(record))) {
                Ok(status) => status,
                Err(_) => {
                    self.stop();
                    warn!(run_id = %self.run_id, "tail callback panicked, tail stopped");
                    return TailProgress::Finished;
                }
            };
            if status.is_terminal() {
                self.stop();
                info!(run_id = %self.run_id, ?status, "run reached terminal status, tail finished");
                return TailProgress::Finished;
            }
        }
        TailProgress::Watching
    }

    /// Marks the tailer stopped. No callback starts after this returns.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether the tailer has stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Records consumed so far. Safe to call from inside the callback.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.cursor.load(Ordering::SeqCst))
    }
}

impl<R: Record> LogTail for Tailer<R> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn on_change(&self) -> TailProgress {
        self.process()
    }

    fn stop(&self) {
        Tailer::stop(self)
    }

    fn is_stopped(&self) -> bool {
        Tailer::is_stopped(self)
    }

    fn cursor(&self) -> Cursor {
        Tailer::cursor(self)
    }
}
