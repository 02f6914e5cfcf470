//! Runlog CLI - Command-line interface for inspecting and following run event logs.

use clap::{Parser, Subcommand};
use runlog_store::{FilesystemEventLogStorage, StoreOptions};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;
mod error;
mod output;

use commands::{append, inspect, list, ready, tail, wipe};

/// Store type every command operates on.
pub type Store = FilesystemEventLogStorage<Value>;

#[derive(Parser)]
#[command(name = "runlog")]
#[command(about = "Run event log inspection and tailing CLI")]
struct Cli {
    /// Directory holding the run logs (default: $RUNLOG_HOME/runs)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of a run
    List {
        /// Run identifier
        run_id: String,
        /// Number of records to skip
        #[arg(long, default_value_t = 0)]
        cursor: u64,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Append JSON records to a run, one per line
    Append {
        /// Run identifier
        run_id: String,
        /// Input file (or stdin if not provided)
        input: Option<String>,
    },
    /// Print a run's records as they arrive until it finishes
    Tail {
        /// Run identifier
        run_id: String,
        /// Number of records to skip
        #[arg(long, default_value_t = 0)]
        cursor: u64,
    },
    /// Scan a run log strictly and report its layout
    Inspect {
        /// Run identifier
        run_id: String,
    },
    /// Report whether a run has a log
    Ready {
        /// Run identifier
        run_id: String,
    },
    /// Delete every run log in the base directory
    Wipe {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(base_dir: Option<PathBuf>) -> Result<Arc<Store>, Box<dyn std::error::Error>> {
    let options = match base_dir {
        Some(dir) => StoreOptions::new(dir),
        None => StoreOptions::default(),
    };
    Ok(Arc::new(Store::open(options)?))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = open_store(cli.base_dir).and_then(|store| match cli.command {
        Commands::List {
            run_id,
            cursor,
            json,
        } => list::run(&store, run_id, cursor, json),
        Commands::Append { run_id, input } => append::run(&store, run_id, input),
        Commands::Tail { run_id, cursor } => tail::run(&store, run_id, cursor),
        Commands::Inspect { run_id } => inspect::run(&store, run_id),
        Commands::Ready { run_id } => ready::run(&store, run_id),
        Commands::Wipe { yes } => wipe::run(&store, yes),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
