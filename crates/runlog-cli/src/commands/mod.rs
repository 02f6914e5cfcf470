pub mod append;
pub mod inspect;
pub mod list;
pub mod ready;
pub mod tail;
pub mod wipe;

use runlog_store::RunStatus;
use serde_json::Value;

/// Status a record announces through its `event_type`.
pub fn record_status(record: &Value) -> RunStatus {
    match record.get("event_type").and_then(|v| v.as_str()) {
        Some("run_success") => RunStatus::Success,
        Some("run_failure") => RunStatus::Failure,
        _ => RunStatus::Started,
    }
}
