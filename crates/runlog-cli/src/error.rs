//! CLI-specific errors.

use thiserror::Error;

/// Errors raised by the commands themselves rather than the store.
#[derive(Debug, Error)]
pub enum CliError {
    /// An input line is not a JSON value.
    #[error("line {line}: invalid JSON record: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// `wipe` was run without `--yes`.
    #[error("refusing to wipe {0} without --yes")]
    WipeNotConfirmed(String),

    /// The tail subscription ended before the run finished.
    #[error("tail of run {0} ended before a terminal record")]
    TailInterrupted(String),
}
