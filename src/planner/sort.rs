//! Sort normalization
//!
//! The ORDER BY of every paged query is a total order: the record id is
//! appended as the final key unless the caller already sorts on it. The
//! appended key takes the direction of the last explicit key.

use crate::errors::{QueryError, QueryResult};
use crate::paging::PagingCursor;
use crate::record::{SortExpr, SortExprSet};

use super::caster::{check_sortable, ColumnCaster};
use super::resolver::{IdentResolver, ResolvedIdent};
use super::sql::RECORD_ALIAS;

/// Name of the tiebreak key added to every sort
pub const TIEBREAK_COLUMN: &str = "id";

/// One resolved sort key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub sort: SortExpr,
    pub ident: ResolvedIdent,
}

/// Sort keys resolved to expressions, tiebreak included
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedSort {
    keys: Vec<OrderKey>,
}

impl ResolvedSort {
    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    /// Sort as caller-facing names and directions
    pub fn sort_set(&self) -> SortExprSet {
        SortExprSet(self.keys.iter().map(|k| k.sort.clone()).collect())
    }

    /// Resolved identifier for a key name as written in the sort
    pub fn ident(&self, column: &str) -> Option<&ResolvedIdent> {
        self.keys
            .iter()
            .find(|k| k.sort.column == column)
            .map(|k| &k.ident)
    }

    /// ORDER BY terms; `reversed` flips every direction
    pub fn order_by(&self, caster: &dyn ColumnCaster, reversed: bool) -> Vec<String> {
        self.keys
            .iter()
            .map(|k| caster.sort_expr(&k.ident.expr, k.sort.descending != reversed))
            .collect()
    }

    fn has_tiebreak(&self) -> bool {
        let id_expr = format!("{}.id", RECORD_ALIAS);
        self.keys.iter().any(|k| k.ident.expr == id_expr)
    }

    fn same_order(&self, other: &ResolvedSort) -> bool {
        self.keys.len() == other.keys.len()
            && self
                .keys
                .iter()
                .zip(&other.keys)
                .all(|(a, b)| a.ident.expr == b.ident.expr && a.sort.descending == b.sort.descending)
    }
}

/// Resolves the requested sort and appends the id tiebreak.
pub fn normalize_sort(sort: &SortExprSet, resolver: &mut IdentResolver) -> QueryResult<ResolvedSort> {
    let mut resolved = ResolvedSort::default();

    for expr in sort.iter() {
        let ident = resolver.resolve(&expr.column)?;
        check_sortable(&expr.column, ident.kind)?;

        if resolved.keys.iter().any(|k| k.ident.expr == ident.expr) {
            return Err(QueryError::syntax(
                0,
                format!("column {:?} appears more than once in sort", expr.column),
            ));
        }

        resolved.keys.push(OrderKey {
            sort: expr.clone(),
            ident,
        });
    }

    if !resolved.has_tiebreak() {
        let sort = SortExpr {
            column: TIEBREAK_COLUMN.to_string(),
            descending: sort.last_descending(),
        };
        let ident = resolver.resolve(TIEBREAK_COLUMN)?;
        resolved.keys.push(OrderKey { sort, ident });
    }

    Ok(resolved)
}

/// Resolves the effective sort of a request.
///
/// With a cursor, the cursor's keys define the order. An explicit sort
/// given alongside a cursor must describe the same order.
pub fn effective_sort(
    requested: &SortExprSet,
    cursor: Option<&PagingCursor>,
    resolver: &mut IdentResolver,
) -> QueryResult<ResolvedSort> {
    let cursor = match cursor {
        None => return normalize_sort(requested, resolver),
        Some(c) => c,
    };

    let from_cursor = normalize_sort(&cursor.sort(), resolver).map_err(|e| {
        QueryError::InvalidCursor(format!("cursor keys do not fit the module: {}", e))
    })?;

    if from_cursor.keys.len() != cursor.len() {
        return Err(QueryError::InvalidCursor(
            "cursor does not end with a unique key".to_string(),
        ));
    }

    if !requested.is_empty() {
        let explicit = normalize_sort(requested, resolver)?;
        if !explicit.same_order(&from_cursor) {
            return Err(QueryError::InvalidCursor(format!(
                "cursor was issued for sort \"{}\", not \"{}\"",
                from_cursor.sort_set(),
                explicit.sort_set()
            )));
        }
    }

    Ok(from_cursor)
}
