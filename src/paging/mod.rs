//! Bidirectional keyset paging
//!
//! A cursor records the sort key values of a boundary row. The next page
//! starts strictly after the last row of the current page; the previous
//! page is fetched in reversed order from the first row and flipped back.
//!
//! # Design Principles
//!
//! - Cursors are opaque to callers and checksummed
//! - The cursor, not the request, defines the sort of a continued query
//! - NULL keys page consistently in both directions

mod collect;
mod condition;
mod cursor;

pub use collect::{cursor_from_record, sort_value};
pub use condition::cursor_condition;
pub use cursor::{PagingCursor, MAX_CURSOR_TOKEN_LEN};
