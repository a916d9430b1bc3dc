//! Observable engine events
//!
//! Events are explicit and typed. Search and CLI commands are traced with
//! `ObservationScope` instead and have no variant here.

use std::fmt;

use super::logger::Severity;

/// Lifecycle events of the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded
    ConfigLoaded,
    /// Module definitions loaded
    ModulesLoaded,

    // Store lifecycle
    /// Database opened
    StoreOpened,
    /// Record tables present
    SchemaReady,

    // Writes
    /// Records inserted
    RecordsCreated,
    /// Records updated or soft-deleted
    RecordsUpdated,
    /// Records upserted
    RecordsUpserted,
    /// Records removed
    RecordsDeleted,
    /// All records of a module removed
    ModuleTruncated,

    // Rejections
    /// Page cursor did not fit the query
    CursorRejected,
    /// Statement interrupted by cancellation or deadline
    QueryCancelled,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ModulesLoaded => "MODULES_LOADED",

            Event::StoreOpened => "STORE_OPENED",
            Event::SchemaReady => "SCHEMA_READY",

            Event::RecordsCreated => "RECORDS_CREATED",
            Event::RecordsUpdated => "RECORDS_UPDATED",
            Event::RecordsUpserted => "RECORDS_UPSERTED",
            Event::RecordsDeleted => "RECORDS_DELETED",
            Event::ModuleTruncated => "MODULE_TRUNCATED",

            Event::CursorRejected => "CURSOR_REJECTED",
            Event::QueryCancelled => "QUERY_CANCELLED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::CursorRejected | Event::QueryCancelled => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
