//! `recordql` binary
//!
//! Argument parsing and every command live in `recordql::cli`. A failed
//! command has already written its JSON error response to stdout; the same
//! error goes to stderr here and the process exits with status 1.

use std::process::ExitCode;

use recordql::cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("recordql: {}", e);
            ExitCode::FAILURE
        }
    }
}
