//! Append command implementation.

use crate::error::CliError;
use crate::Store;
use runlog_store::EventLogStorage;
use serde_json::Value;
use std::io::{self, BufRead, BufReader};

pub fn run(
    store: &Store,
    run_id: String,
    input: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(std::fs::File::open(&path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    // Parse everything first so a bad line appends nothing
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line).map_err(|source| {
            CliError::InvalidRecord {
                line: idx + 1,
                source,
            }
        })?;
        records.push(record);
    }

    for record in &records {
        store.store_event(&run_id, record)?;
    }
    println!("Appended {} records to {}", records.len(), run_id);

    Ok(())
}
