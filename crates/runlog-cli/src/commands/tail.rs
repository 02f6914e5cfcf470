//! Tail command implementation.

use super::record_status;
use crate::error::CliError;
use crate::output;
use crate::Store;
use runlog_store::{Cursor, RunStatus};
use serde_json::Value;
use std::io::Write;
use std::sync::mpsc;
use std::sync::Arc;

pub fn run(
    store: &Arc<Store>,
    run_id: String,
    cursor: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let (done_tx, done_rx) = mpsc::channel();

    let handle = store.watch(&run_id, Cursor::new(cursor), move |record: Value| {
        let status = record_status(&record);
        let mut stdout = std::io::stdout().lock();
        // A closed stdout ends the tail like a finished run
        if writeln!(stdout, "{}", output::format_json(&record))
            .and_then(|_| stdout.flush())
            .is_err()
        {
            let _ = done_tx.send(());
            return RunStatus::Failure;
        }
        if status.is_terminal() {
            let _ = done_tx.send(());
        }
        status
    })?;

    let finished = done_rx.recv().is_ok();
    handle.stop();
    if !finished {
        return Err(CliError::TailInterrupted(run_id).into());
    }

    Ok(())
}
