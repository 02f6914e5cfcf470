//! List command implementation.

use crate::output;
use crate::Store;
use runlog_store::{Cursor, EventLogStorage};

pub fn run(
    store: &Store,
    run_id: String,
    cursor: u64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = store
        .get_logs_for_run(&run_id, Cursor::new(cursor))
        .map_err(|e| format!("Failed to read run {}: {}", run_id, e))?;

    if !json {
        output::print_table_header();
    }

    for (index, record) in (cursor..).zip(records.iter()) {
        if json {
            println!("{}", output::format_json(record));
        } else {
            println!("{}", output::format_table_row(index, record));
        }
    }

    Ok(())
}
