//! Query executor for record searches
//!
//! Consumes search plans and produces pages of fully assembled records.
//!
//! # Execution Flow (strict order)
//!
//! 1. Render the plan with the current cursor and a fetch limit
//! 2. Read record rows
//! 3. Load field values for the batch in one query
//! 4. Apply the record check, refetching while the page is short
//! 5. Derive prev/next cursors from the page boundaries
//!
//! # Invariants
//!
//! - Every returned record carries all of its values
//! - Page order is always the forward sort order
//! - Cancellation discards partial results

#[allow(clippy::module_inception)]
mod executor;
mod report;
mod result;
mod rows;
mod source;
mod values;

pub use executor::{PageExecutor, PageOptions, RecordSource};
pub use report::{
    parse_dimensions, parse_metrics, plan_report, run_report, Aggregate, Metric, ReportPlan,
    ReportRequest,
};
pub use result::Page;
pub use rows::{query_records, record_from_row, value_from_row};
pub use source::SqliteSource;
pub use values::{attach_values, load_values, reassemble, MAX_IDS_PER_STATEMENT};
