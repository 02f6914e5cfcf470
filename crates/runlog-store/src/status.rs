//! Run status values reported back by tail callbacks.

use serde::{Deserialize, Serialize};

/// Status of a run as seen by whoever consumes its events.
///
/// Only [`RunStatus::Success`] and [`RunStatus::Failure`] mean anything to
/// this crate: either one stops a tailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run has not started executing.
    NotStarted,
    /// Run is executing.
    Started,
    /// Run finished successfully.
    Success,
    /// Run finished with a failure.
    Failure,
}

impl RunStatus {
    /// Returns `true` for the two terminal outcomes.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failure)
    }
}
