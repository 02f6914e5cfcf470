//! Inspect command implementation.

use crate::Store;
use runlog_journal::{FrameKind, JournalError, JournalReader, ReadMode};
use serde_json::json;

pub fn run(store: &Store, run_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let path = store.filepath_for_run_id(&run_id)?;
    let mut reader = JournalReader::open(&path, ReadMode::Strict)
        .map_err(|e| format!("Failed to open log for run {}: {}", run_id, e))?;

    let mut records: u64 = 0;
    let mut unknown_frames: u64 = 0;
    let mut truncated_at = None;
    loop {
        match reader.read_frame() {
            Ok(Some((FrameKind::Record, _))) => records += 1,
            Ok(Some((FrameKind::Unknown(_), _))) => unknown_frames += 1,
            Ok(None) => break,
            Err(JournalError::TruncatedFrame { offset }) => {
                truncated_at = Some(offset);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let output = json!({
        "run_id": run_id,
        "path": path.display().to_string(),
        "file_size": reader.len(),
        "records": records,
        "unknown_frames": unknown_frames,
        "truncated": truncated_at.is_some(),
        "truncated_at": truncated_at,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
