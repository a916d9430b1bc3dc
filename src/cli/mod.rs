//! CLI module for recordql
//!
//! Provides command-line interface for:
//! - init: Create the database and check module definitions
//! - import: Write records read from stdin
//! - search: One page of records for a filter read from stdin
//! - report: Grouped aggregates for a request read from stdin

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{import, init, report, run, run_command, search, CliConfig};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_error, write_response};
