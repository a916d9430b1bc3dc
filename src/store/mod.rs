//! SQLite record store
//!
//! The store owns one connection and exposes the record operations of a
//! module: paged search, lookup, value loading, reports and writes.
//!
//! # Design Principles
//!
//! - Module metadata is passed in per call and never cached
//! - Column casting is a strategy object handed to the store
//! - Every call takes a `QueryContext`; statements are interrupted once it
//!   is cancelled or past its deadline
//!
//! # Concurrency
//!
//! `Store` is cheap to clone and shares the connection behind a mutex.
//! Calls run synchronously on the calling thread.

mod config;
mod context;
mod schema;
mod search;
mod write;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::paging::PagingCursor;
use crate::planner::{ColumnCaster, SqliteCaster};

pub use config::{StoreConfig, MEMORY_PATH};
pub use context::QueryContext;
pub use schema::create_tables;

/// Handle to a record database
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    config: Arc<StoreConfig>,
    caster: Arc<dyn ColumnCaster>,
}

impl Store {
    /// Opens (or creates) the database described by `config`
    pub fn open(config: StoreConfig) -> QueryResult<Self> {
        config.validate()?;

        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if !config.is_memory() {
            let mode: String = conn.pragma_update_and_check(
                None,
                "journal_mode",
                config.journal_mode.as_str(),
                |row| row.get(0),
            )?;
            if !mode.eq_ignore_ascii_case(&config.journal_mode) {
                Logger::warn(
                    "JOURNAL_MODE_FALLBACK",
                    &[("requested", &config.journal_mode), ("actual", &mode)],
                );
            }
        }

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            caster: Arc::new(SqliteCaster),
        };
        store.init_schema()?;

        log_event_with_fields(Event::StoreOpened, &[("path", &store.config.path)]);

        Ok(store)
    }

    /// Opens a private in-memory database with default settings
    pub fn open_in_memory() -> QueryResult<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// Replaces the column caster
    pub fn with_caster(mut self, caster: Arc<dyn ColumnCaster>) -> Self {
        self.caster = caster;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn caster(&self) -> &dyn ColumnCaster {
        self.caster.as_ref()
    }

    /// Creates the record tables if missing
    pub fn init_schema(&self) -> QueryResult<()> {
        self.with_conn(&QueryContext::background(), |conn| create_tables(conn))?;
        log_event_with_fields(Event::SchemaReady, &[]);
        Ok(())
    }

    /// Decodes a cursor token within the configured size bound
    pub fn decode_cursor(&self, token: &str) -> QueryResult<PagingCursor> {
        PagingCursor::decode_bounded(token, self.config.max_cursor_token_len)
    }

    /// Runs `f` on the connection with cancellation wired in.
    ///
    /// The progress handler is removed again before the lock is released.
    pub(crate) fn with_conn<T, F>(&self, ctx: &QueryContext, f: F) -> QueryResult<T>
    where
        F: FnOnce(&mut Connection) -> QueryResult<T>,
    {
        ctx.check()?;

        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.progress_handler(self.config.progress_ops as i32, Some(ctx.interrupt_hook()));
        let result = f(&mut conn);
        conn.progress_handler(0, None::<fn() -> bool>);

        if let Err(QueryError::Cancelled) = &result {
            log_event_with_fields(Event::QueryCancelled, &[]);
        }

        result
    }
}
