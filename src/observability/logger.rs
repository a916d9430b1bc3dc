//! JSON line logger
//!
//! One line per event on stderr, stdout belongs to command output. A line
//! always starts with `event` and `severity`; the remaining fields follow
//! in key order, so two calls with the same fields render identically:
//!
//! ```text
//! {"event":"SEARCH_COMPLETE","severity":"INFO","duration_ms":"3","module_id":"7","rows":"20"}
//! ```
//!
//! The minimum severity comes from `RECORDQL_LOG` (`trace`, `info`, `warn`,
//! `error` or `off`) and is read once per process.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::io::{self, Write};
use std::sync::OnceLock;

use serde_json::Value;

/// Environment variable holding the minimum logged severity
pub const LOG_ENV: &str = "RECORDQL_LOG";

const RESERVED_KEYS: &[&str] = &["event", "severity"];

static THRESHOLD: OnceLock<Option<Severity>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-statement detail
    Trace,
    /// Lifecycle of stores, writes and commands
    Info,
    /// Rejected input the caller can fix
    Warn,
    /// Failed operations
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Parses a threshold setting.
    ///
    /// `Some(None)` means logging is off; `None` means the name is unknown.
    pub fn parse_threshold(name: &str) -> Option<Option<Severity>> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Some(Severity::Trace)),
            "info" => Some(Some(Severity::Info)),
            "warn" => Some(Some(Severity::Warn)),
            "error" => Some(Some(Severity::Error)),
            "off" | "none" => Some(None),
            _ => None,
        }
    }

    /// Minimum severity written; `None` when logging is off
    pub fn threshold() -> Option<Severity> {
        *THRESHOLD.get_or_init(|| {
            env::var(LOG_ENV)
                .ok()
                .and_then(|v| Severity::parse_threshold(&v))
                .unwrap_or(Some(Severity::Warn))
        })
    }

    fn enabled(self) -> bool {
        Severity::threshold().map_or(false, |min| self >= min)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide logger
pub struct Logger;

impl Logger {
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !severity.enabled() {
            return;
        }
        let line = render(severity, event, fields);
        // a failed log write never fails the operation being logged
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Renders one log line, newline included.
///
/// A repeated key keeps its last value. Keys named `event` or `severity`
/// are dropped.
pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<&str, &str> = fields
        .iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(k))
        .copied()
        .collect();

    let mut line = String::with_capacity(64 + 24 * sorted.len());
    line.push_str("{\"event\":");
    push_json_str(&mut line, event);
    line.push_str(",\"severity\":");
    push_json_str(&mut line, severity.as_str());

    for (key, value) in sorted {
        line.push(',');
        push_json_str(&mut line, key);
        line.push(':');
        push_json_str(&mut line, value);
    }

    line.push_str("}\n");
    line
}

fn push_json_str(out: &mut String, s: &str) {
    out.push_str(&Value::from(s).to_string());
}
