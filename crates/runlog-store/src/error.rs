//! Error types for store operations.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error during read, write, or wipe.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Journal backend error (bad header, corrupt frame, undecodable record).
    #[error("journal error: {0}")]
    Journal(#[from] runlog_journal::JournalError),
    /// No log exists yet for the run.
    #[error("no event log for run {run_id}")]
    NotFound {
        /// Run whose log was requested.
        run_id: String,
    },
    /// Run id cannot name a log file inside the base directory.
    #[error("invalid run id: {0:?}")]
    InvalidRunId(String),
    /// Filesystem monitor failure.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
