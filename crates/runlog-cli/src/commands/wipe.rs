//! Wipe command implementation.

use crate::error::CliError;
use crate::Store;
use runlog_store::EventLogStorage;

pub fn run(store: &Store, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !yes {
        return Err(CliError::WipeNotConfirmed(store.base_dir().display().to_string()).into());
    }
    store.wipe()?;
    println!("Wiped run logs in {}", store.base_dir().display());

    Ok(())
}
