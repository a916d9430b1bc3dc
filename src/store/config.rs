//! Store configuration
//!
//! Loaded from a JSON file; every field has a default so `{}` is a valid
//! in-memory configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};
use crate::executor::PageOptions;
use crate::paging::MAX_CURSOR_TOKEN_LEN;

/// Path that opens a private in-memory database
pub const MEMORY_PATH: &str = ":memory:";

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file, or `:memory:`
    #[serde(default = "default_path")]
    pub path: String,

    /// How long a statement waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// SQLite journal mode; ignored for in-memory databases
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,

    /// Most fetches one page may take when a record check rejects rows
    #[serde(default = "default_max_refetches")]
    pub max_refetches: usize,

    /// Smallest follow-up fetch while filling a page
    #[serde(default = "default_min_ensure_fetch_limit")]
    pub min_ensure_fetch_limit: usize,

    /// SQLite VM steps between cancellation checks
    #[serde(default = "default_progress_ops")]
    pub progress_ops: u32,

    /// Longest accepted cursor token
    #[serde(default = "default_max_cursor_token_len")]
    pub max_cursor_token_len: usize,
}

fn default_path() -> String {
    MEMORY_PATH.to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_max_refetches() -> usize {
    100
}

fn default_min_ensure_fetch_limit() -> usize {
    10
}

fn default_progress_ops() -> u32 {
    1000
}

fn default_max_cursor_token_len() -> usize {
    MAX_CURSOR_TOKEN_LEN
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
            max_refetches: default_max_refetches(),
            min_ensure_fetch_limit: default_min_ensure_fetch_limit(),
            progress_ops: default_progress_ops(),
            max_cursor_token_len: default_max_cursor_token_len(),
        }
    }
}

impl StoreConfig {
    /// In-memory configuration with defaults
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed configuration with defaults
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::Config(format!("Failed to read config: {}", e)))?;

        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| QueryError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate field ranges
    pub fn validate(&self) -> QueryResult<()> {
        if self.path.trim().is_empty() {
            return Err(QueryError::Config("path must not be empty".into()));
        }

        if !JOURNAL_MODES
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&self.journal_mode))
        {
            return Err(QueryError::Config(format!(
                "Invalid journal_mode: '{}'. Expected one of {}.",
                self.journal_mode,
                JOURNAL_MODES.join(", ")
            )));
        }

        if self.max_refetches == 0 {
            return Err(QueryError::Config("max_refetches must be > 0".into()));
        }

        if self.progress_ops == 0 || self.progress_ops > i32::MAX as u32 {
            return Err(QueryError::Config(
                "progress_ops must be between 1 and 2147483647".into(),
            ));
        }

        if self.max_cursor_token_len == 0 {
            return Err(QueryError::Config("max_cursor_token_len must be > 0".into()));
        }

        Ok(())
    }

    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Page fetch bounds derived from this configuration
    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            max_refetches: self.max_refetches,
            min_ensure_fetch_limit: self.min_ensure_fetch_limit,
        }
    }
}
