//! Record query request types
//!
//! `RecordFilter` is per-request and never persisted. Sorting is carried as
//! an ordered `SortExprSet`; order defines tiebreak priority.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{QueryError, QueryResult};
use crate::paging::PagingCursor;
use crate::schema::is_identifier;

use super::Record;

/// Inclusion policy for soft-deleted rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletedState {
    /// Only rows that are not deleted
    #[default]
    Excluded,
    /// Deleted and non-deleted rows
    Inclusive,
    /// Only deleted rows
    Exclusive,
}

impl DeletedState {
    /// SQL condition on a `deleted_at` column, if any
    pub fn condition(&self, column: &str) -> Option<String> {
        match self {
            DeletedState::Excluded => Some(format!("{} IS NULL", column)),
            DeletedState::Inclusive => None,
            DeletedState::Exclusive => Some(format!("{} IS NOT NULL", column)),
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortExpr {
    /// Column or field name as the caller spelled it
    pub column: String,
    /// Descending order
    pub descending: bool,
}

impl SortExpr {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

impl fmt::Display for SortExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{} DESC", self.column)
        } else {
            write!(f, "{}", self.column)
        }
    }
}

/// Ordered list of sort keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortExprSet(pub Vec<SortExpr>);

impl SortExprSet {
    pub fn new(exprs: Vec<SortExpr>) -> Self {
        Self(exprs)
    }

    /// Finds a key by column name (case-insensitive)
    pub fn get(&self, column: &str) -> Option<&SortExpr> {
        self.0.iter().find(|s| s.column.eq_ignore_ascii_case(column))
    }

    /// Direction of the last key; ascending when empty
    pub fn last_descending(&self) -> bool {
        self.0.last().map_or(false, |s| s.descending)
    }

    pub fn push(&mut self, expr: SortExpr) {
        self.0.push(expr);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SortExpr> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for SortExprSet {
    type Err = QueryError;

    /// Parses `"col [ASC|DESC], col [ASC|DESC], ..."`.
    fn from_str(s: &str) -> QueryResult<Self> {
        let mut set = SortExprSet::default();
        if s.trim().is_empty() {
            return Ok(set);
        }

        let mut offset = 0;
        for part in s.split(',') {
            let position = offset + (part.len() - part.trim_start().len());
            offset += part.len() + 1;

            let mut words = part.split_whitespace();
            let column = words
                .next()
                .ok_or_else(|| QueryError::syntax(position, "empty sort expression"))?;

            if !is_identifier(column) {
                return Err(QueryError::syntax(
                    position,
                    format!("invalid sort column {:?}", column),
                ));
            }

            let descending = match words.next() {
                None => false,
                Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
                Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
                Some(dir) => {
                    return Err(QueryError::syntax(
                        position + column.len(),
                        format!("invalid sort direction {:?}", dir),
                    ))
                }
            };

            if let Some(extra) = words.next() {
                return Err(QueryError::syntax(
                    position,
                    format!("unexpected {:?} in sort expression", extra),
                ));
            }

            set.push(SortExpr {
                column: column.to_string(),
                descending,
            });
        }

        Ok(set)
    }
}

impl fmt::Display for SortExprSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl Serialize for SortExprSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SortExprSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Caller-supplied per-record predicate applied after fetching
#[derive(Clone)]
pub struct RecordCheck(Arc<dyn Fn(&Record) -> QueryResult<bool> + Send + Sync>);

impl RecordCheck {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Record) -> QueryResult<bool> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn accepts(&self, record: &Record) -> QueryResult<bool> {
        (self.0)(record)
    }
}

impl fmt::Debug for RecordCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordCheck(..)")
    }
}

/// Record search request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFilter {
    /// Module id; 0 takes it from the module argument
    pub module_id: u64,

    /// Namespace id; 0 takes it from the module argument
    pub namespace_id: u64,

    /// Filter expression
    pub query: String,

    /// Sort keys
    pub sort: SortExprSet,

    /// Cursor of the page to fetch; always cleared on return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_cursor: Option<PagingCursor>,

    /// Cursor to the previous page (output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<PagingCursor>,

    /// Cursor to the next page (output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<PagingCursor>,

    /// Page size; 0 fetches everything
    pub limit: usize,

    /// Soft-deleted record policy
    pub deleted: DeletedState,

    /// Explicit id allow-list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labeled_ids: Vec<u64>,

    /// Post-fetch record predicate
    #[serde(skip)]
    pub check: Option<RecordCheck>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_sort(mut self, sort: SortExprSet) -> Self {
        self.sort = sort;
        self
    }

    /// Parses and sets the sort
    pub fn sorted_by(self, sort: &str) -> QueryResult<Self> {
        Ok(self.with_sort(sort.parse()?))
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<PagingCursor>) -> Self {
        self.page_cursor = cursor;
        self
    }

    pub fn with_deleted(mut self, deleted: DeletedState) -> Self {
        self.deleted = deleted;
        self
    }

    pub fn with_check(mut self, check: RecordCheck) -> Self {
        self.check = Some(check);
        self
    }
}

/// Value lookup request
#[derive(Debug, Clone, Default)]
pub struct RecordValueFilter {
    /// Owning record ids
    pub record_ids: Vec<u64>,
    /// Soft-deleted value policy
    pub deleted: DeletedState,
}
