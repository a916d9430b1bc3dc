//! Logging for the record engine
//!
//! Everything observable leaves the process as JSON lines on stderr:
//!
//! - `Event`: typed store lifecycle events (opened, writes, rejections)
//! - `ObservationScope`: timed BEGIN/COMPLETE/FAILED brackets around
//!   searches and CLI commands
//! - `Logger`: ad-hoc lines such as `JOURNAL_MODE_FALLBACK`
//!
//! Logging never changes a result and never fails an operation.
//! Lines below the `RECORDQL_LOG` threshold (default `warn`) are dropped
//! before they are rendered.

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{render, Logger, Severity, LOG_ENV};
pub use scope::{ObservationScope, Timer};

/// Logs a lifecycle event at its own severity
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
