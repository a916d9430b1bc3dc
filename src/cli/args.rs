//! CLI argument definitions using clap
//!
//! Commands:
//! - recordql init --config <path>
//! - recordql import --config <path> --module <id|handle>
//! - recordql search --config <path> --module <id|handle>
//! - recordql report --config <path> --module <id|handle>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// recordql - filtered, sorted and paged queries over dynamic record modules
#[derive(Parser, Debug)]
#[command(name = "recordql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database and check module definitions
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./recordql.json")]
        config: PathBuf,
    },

    /// Create records from a JSON array read on stdin
    Import {
        /// Path to configuration file
        #[arg(long, default_value = "./recordql.json")]
        config: PathBuf,

        /// Module id or handle
        #[arg(long)]
        module: String,
    },

    /// Fetch one page of records for a filter read on stdin
    Search {
        /// Path to configuration file
        #[arg(long, default_value = "./recordql.json")]
        config: PathBuf,

        /// Module id or handle
        #[arg(long)]
        module: String,
    },

    /// Aggregate records for a report request read on stdin
    Report {
        /// Path to configuration file
        #[arg(long, default_value = "./recordql.json")]
        config: PathBuf,

        /// Module id or handle
        #[arg(long)]
        module: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
