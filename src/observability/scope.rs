//! Timed operation scopes
//!
//! A scope brackets one operation (a search, a CLI command) with a
//! `{NAME}_BEGIN` trace line and exactly one closing line:
//!
//! | outcome   | event                | severity |
//! |-----------|----------------------|----------|
//! | complete  | `{NAME}_COMPLETE`    | INFO     |
//! | fail      | `{NAME}_FAILED`      | ERROR    |
//! | dropped   | `{NAME}_INCOMPLETE`  | WARN     |
//!
//! Closing lines repeat the opening fields and add `duration_ms`.

use std::time::{Duration, Instant};

use super::logger::{Logger, Severity};

enum Outcome<'r> {
    Complete,
    Failed(&'r str),
    Dropped,
}

/// Bracket around one logged operation
///
/// ```ignore
/// let scope = ObservationScope::with_fields("SEARCH", &[("module_id", "7")]);
/// let page = run()?;
/// scope.complete_with_fields(&[("rows", "20")]);
/// ```
pub struct ObservationScope {
    name: String,
    fields: Vec<(String, String)>,
    timer: Timer,
    closed: bool,
}

impl ObservationScope {
    pub fn new(name: &str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::trace(&format!("{}_BEGIN", name), fields);

        Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timer: Timer::new(),
            closed: false,
        }
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Closes the scope as successful, adding result fields
    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.close(Outcome::Complete, extra);
    }

    /// Closes the scope as failed
    pub fn fail(mut self, reason: &str) {
        self.close(Outcome::Failed(reason), &[]);
    }

    fn close(&mut self, outcome: Outcome<'_>, extra: &[(&str, &str)]) {
        if self.closed {
            return;
        }
        self.closed = true;

        let (suffix, severity, reason) = match outcome {
            Outcome::Complete => ("COMPLETE", Severity::Info, None),
            Outcome::Failed(reason) => ("FAILED", Severity::Error, Some(reason)),
            Outcome::Dropped => ("INCOMPLETE", Severity::Warn, None),
        };

        let elapsed = self.timer.elapsed_ms().to_string();
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        fields.push(("duration_ms", &elapsed));
        if let Some(reason) = reason {
            fields.push(("reason", reason));
        }
        fields.extend_from_slice(extra);

        Logger::log(severity, &format!("{}_{}", self.name, suffix), &fields);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        self.close(Outcome::Dropped, &[]);
    }
}

/// Wall-clock stopwatch
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed().as_millis()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
