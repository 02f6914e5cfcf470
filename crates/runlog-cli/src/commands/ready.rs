//! Ready command implementation.

use crate::Store;
use runlog_store::EventLogStorage;

pub fn run(store: &Store, run_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let ready = store.logs_ready(&run_id);
    println!("{}", ready);
    if !ready {
        std::process::exit(1);
    }

    Ok(())
}
