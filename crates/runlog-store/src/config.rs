//! Store configuration.

use std::path::PathBuf;

/// Environment variable naming the runlog home directory.
pub const RUNLOG_HOME_ENV: &str = "RUNLOG_HOME";

/// Default directory for durable run logs.
///
/// `$RUNLOG_HOME/runs` when `RUNLOG_HOME` is set, otherwise
/// `<system temp dir>/runlog/runs`.
pub fn base_runs_directory() -> PathBuf {
    match std::env::var_os(RUNLOG_HOME_ENV) {
        Some(home) if !home.is_empty() => PathBuf::from(home).join("runs"),
        _ => std::env::temp_dir().join("runlog").join("runs"),
    }
}

/// Options for the filesystem-backed store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Directory holding one `<run_id>.log` file per run.
    pub base_dir: PathBuf,
    /// Whether to fsync after each appended record (default: false).
    pub sync: bool,
}

impl StoreOptions {
    /// Options for `base_dir` with every other setting at its default.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            sync: false,
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new(base_runs_directory())
    }
}
