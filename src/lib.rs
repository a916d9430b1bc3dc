//! recordql - query engine for records of dynamic, per-module schemas
//!
//! Records keep their system columns in one table and their field values
//! in a key/value table. The engine answers filtered, sorted, keyset-paged
//! searches over them:
//!
//! ```ignore
//! use recordql::record::RecordFilter;
//! use recordql::store::{QueryContext, Store};
//!
//! let store = Store::open_in_memory()?;
//! let filter = RecordFilter::new()
//!     .with_query("score > 15 AND status = 'open'")
//!     .sorted_by("score DESC")?
//!     .with_limit(20);
//! let (records, filter) = store.search(&QueryContext::background(), &module, filter)?;
//! // filter.next_page continues after the last record
//! ```

pub mod cli;
pub mod errors;
pub mod executor;
pub mod observability;
pub mod paging;
pub mod planner;
pub mod record;
pub mod schema;
pub mod store;
