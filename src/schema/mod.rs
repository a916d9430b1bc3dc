//! Module (dynamic schema) definitions
//!
//! A module owns an ordered set of fields. Field names are the lookup key
//! used by filtering, sorting, cursors and value reassembly.
//!
//! # Design Principles
//!
//! - Modules are immutable for the duration of a request
//! - Field names are plain identifiers, unique per module
//! - Values are validated against their field kind before writes

mod loader;
mod types;
mod validator;

pub use loader::ModuleLoader;
pub use types::{is_identifier, Field, FieldKind, FieldOptions, Module};
pub use validator::{is_plain_decimal, validate_value, RecordValidator};
