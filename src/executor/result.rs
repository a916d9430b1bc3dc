//! Result types for page execution

use crate::paging::PagingCursor;
use crate::record::Record;

/// One page of records in forward order
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records in page order
    pub records: Vec<Record>,
    /// Cursor to the page before this one
    pub prev: Option<PagingCursor>,
    /// Cursor to the page after this one
    pub next: Option<PagingCursor>,
    /// Statements issued to fill the page
    pub fetches: usize,
    /// Rows read before the record check
    pub scanned: usize,
}

impl Page {
    /// Returns true if no records matched
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns an iterator over the records
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}
