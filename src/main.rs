//! Group Ledger CLI
//!
//! Command-line interface for replaying group transactions from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- transactions.csv > balances.csv
//! cargo run -- --currency usd transactions.csv > balances.csv
//! cargo run -- --report settlements transactions.csv > settlements.csv
//! ```
//!
//! The program reads transaction records from the input CSV file, replays
//! them through a fresh group ledger on an in-memory store, and writes the
//! selected report (final member balances or the settle-up plan) to stdout.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use group_ledger::cli;
use group_ledger::replay;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so report output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Parse command-line arguments using clap
    let args = cli::parse_args();

    // Replay transactions and write the report to stdout
    let mut output = std::io::stdout();
    if let Err(e) = replay::run(&args, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
