//! Filesystem-backed storage: one append-only journal file per run.

use crate::config::StoreOptions;
use crate::cursor::Cursor;
use crate::error::StoreError;
use crate::lock_table::LockTable;
use crate::status::RunStatus;
use crate::tailer::Tailer;
use crate::traits::{EventLogStorage, Record};
use crate::watch::{TailHandle, WatchService};
use parking_lot::RwLock;
use runlog_journal::{JournalError, JournalReader, JournalWriter, ReadMode, WriteOptions};
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Extension of run log files inside the base directory.
pub const LOG_EXTENSION: &str = "log";

#[derive(Debug, Clone, Copy)]
struct CachedOffset {
    cursor: Cursor,
    offset: u64,
}

#[derive(Default)]
struct RunState {
    cached: Option<CachedOffset>,
    // Whether this instance has cut any torn tail off the file
    tail_checked: bool,
}

/// Durable event log storage backed by `<base_dir>/<run_id>.log` files.
///
/// Every append opens the run's journal, writes one frame and closes it
/// again, so no descriptor outlives a call. Before its first append to a run
/// an instance cuts off any torn frame a crash left at the end of the file,
/// so a resumed run keeps every complete record.
///
/// Reads remember the byte offset they finished at; a follow-up read from
/// the cursor they returned (the pattern a tailer produces) seeks straight
/// there instead of rescanning.
///
/// # Example
///
/// ```rust
/// use runlog_store::{Cursor, EventLogStorage, FilesystemEventLogStorage};
/// use serde_json::{json, Value};
///
/// let dir = tempfile::tempdir()?;
/// let store = FilesystemEventLogStorage::<Value>::new(dir.path())?;
/// store.store_event("run-1", &json!({"event_type": "run_start"}))?;
///
/// let records = store.get_logs_for_run("run-1", Cursor::BEGINNING)?;
/// assert_eq!(records.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct FilesystemEventLogStorage<R> {
    base_dir: PathBuf,
    sync: bool,
    runs: LockTable<RunState>,
    // Held shared by every call and exclusively by `wipe`
    gate: RwLock<()>,
    watch_service: OnceLock<WatchService>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> FilesystemEventLogStorage<R> {
    /// Opens a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open(StoreOptions::new(base_dir))
    }

    /// Opens a store with explicit options.
    ///
    /// The base directory is canonicalized so that log paths compare equal to
    /// the paths reported by the filesystem monitor.
    pub fn open(options: StoreOptions) -> Result<Self, StoreError> {
        fs::create_dir_all(&options.base_dir)?;
        let base_dir = fs::canonicalize(&options.base_dir)?;
        info!(base_dir = %base_dir.display(), "opened filesystem event log storage");

        Ok(Self {
            base_dir,
            sync: options.sync,
            runs: LockTable::new(),
            gate: RwLock::new(()),
            watch_service: OnceLock::new(),
            _record: PhantomData,
        })
    }

    /// Uses `service` for [`watch`](Self::watch) instead of starting a
    /// dedicated one on first use. A later call replaces an earlier one.
    pub fn with_watch_service(mut self, service: WatchService) -> Self {
        self.watch_service = OnceLock::from(service);
        self
    }

    /// Directory holding the run logs.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the log file for `run_id`.
    pub fn filepath_for_run_id(&self, run_id: &str) -> Result<PathBuf, StoreError> {
        validate_run_id(run_id)?;
        Ok(self
            .base_dir
            .join(format!("{}.{}", run_id, LOG_EXTENSION)))
    }

    /// Last resolved `(cursor, byte offset)` pair for `run_id`, if any.
    pub fn cached_offset(&self, run_id: &str) -> Option<(Cursor, u64)> {
        let run = self.runs.get(run_id)?;
        let cached = run.lock().cached?;
        Some((cached.cursor, cached.offset))
    }

    fn watch_service(&self) -> Result<&WatchService, StoreError> {
        if let Some(service) = self.watch_service.get() {
            return Ok(service);
        }
        let started = WatchService::start()?;
        Ok(self.watch_service.get_or_init(|| started))
    }

    /// Follows `run_id`'s log, delivering each new record to `callback`.
    ///
    /// Records after `start_cursor` that already exist are delivered
    /// immediately; later ones as the file changes. The subscription ends by
    /// itself once `callback` returns a terminal status, or through the
    /// returned handle.
    pub fn watch<F>(
        self: &Arc<Self>,
        run_id: &str,
        start_cursor: Cursor,
        callback: F,
    ) -> Result<TailHandle, StoreError>
    where
        F: FnMut(R) -> RunStatus + Send + 'static,
    {
        let path = self.filepath_for_run_id(run_id)?;
        let storage: Arc<dyn EventLogStorage<R>> = Arc::clone(self) as Arc<dyn EventLogStorage<R>>;
        let tailer = Tailer::new(storage, run_id, path, start_cursor, callback);
        self.watch_service()?.subscribe(tailer)
    }

    fn open_reader(&self, run_id: &str, path: &Path) -> Result<JournalReader, StoreError> {
        match JournalReader::open(path, ReadMode::Permissive) {
            Ok(reader) => Ok(reader),
            Err(JournalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound {
                    run_id: run_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove_log_files(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(LOG_EXTENSION) && path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl<R: Record> EventLogStorage<R> for FilesystemEventLogStorage<R> {
    fn get_logs_for_run(&self, run_id: &str, cursor: Cursor) -> Result<Vec<R>, StoreError> {
        let path = self.filepath_for_run_id(run_id)?;
        let _gate = self.gate.read();
        let run = match self.runs.get(run_id) {
            Some(run) => run,
            // Unknown runs stay out of the table until they have a log
            None if !path.exists() => {
                return Err(StoreError::NotFound {
                    run_id: run_id.to_string(),
                })
            }
            None => self.runs.entry(run_id),
        };
        let mut run = run.lock();

        let mut reader = self.open_reader(run_id, &path)?;
        match run.cached {
            Some(cached) if cached.cursor == cursor => {
                debug!(run_id, %cursor, offset = cached.offset, "cursor cache hit");
                reader.seek_to(cached.offset)?;
            }
            _ => {
                debug!(run_id, %cursor, "cursor cache miss, scanning from start");
                for _ in 0..cursor.consumed() {
                    if !reader.skip_record()? {
                        // Fewer records than the cursor claims; nothing to cache
                        return Ok(Vec::new());
                    }
                }
            }
        }

        let mut records = Vec::new();
        while let Some(record) = reader.read_record::<R>()? {
            records.push(record);
        }

        run.cached = Some(CachedOffset {
            cursor: cursor.advance(records.len() as u64),
            offset: reader.position(),
        });
        Ok(records)
    }

    fn store_event(&self, run_id: &str, record: &R) -> Result<(), StoreError> {
        let path = self.filepath_for_run_id(run_id)?;
        let _gate = self.gate.read();
        let run = self.runs.entry(run_id);
        let mut run = run.lock();

        if !run.tail_checked {
            let dropped = JournalWriter::repair(&path)?;
            if dropped > 0 {
                warn!(run_id, dropped, "discarded torn tail of run log");
                run.cached = None;
            }
            run.tail_checked = true;
        }

        let appended = JournalWriter::open(&path, WriteOptions { sync: self.sync })
            .and_then(|mut writer| {
                writer.append_record(record)?;
                writer.finish()
            });
        if appended.is_err() {
            // A failed write may have left a partial frame behind
            run.tail_checked = false;
        }
        appended?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }

    fn logs_ready(&self, run_id: &str) -> bool {
        self.filepath_for_run_id(run_id)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    fn wipe(&self) -> Result<(), StoreError> {
        // Tailers go first so none of them reads a half-deleted directory
        if let Some(service) = self.watch_service.get() {
            service.unsubscribe_dir(&self.base_dir);
        }

        let _gate = self.gate.write();
        let removed = self.remove_log_files();
        // Cached offsets are stale even if only some files went away
        self.runs.clear();
        let removed = removed?;
        info!(base_dir = %self.base_dir.display(), removed, "wiped run logs");
        Ok(())
    }
}

/// Rejects run ids that would not name a single file inside the base dir.
fn validate_run_id(run_id: &str) -> Result<(), StoreError> {
    let invalid = run_id.is_empty()
        || run_id == "."
        || run_id == ".."
        || run_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidRunId(run_id.to_string()));
    }
    Ok(())
}
