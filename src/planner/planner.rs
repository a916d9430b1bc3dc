//! Record search planner
//!
//! Turns a `RecordFilter` into a base SELECT plus a resolved sort. The plan
//! is immutable; each fetch of a page (including refetches) renders its own
//! statement from it with a cursor condition and a limit.
//!
//! Planning order:
//! 1. Module and namespace scoping
//! 2. Deleted-state policy and id allow-list
//! 3. Filter expression
//! 4. Sort (from the cursor when one is given)

use crate::errors::{QueryError, QueryResult};
use crate::paging::{cursor_condition, PagingCursor};
use crate::record::{DeletedState, RecordFilter};
use crate::schema::Module;

use super::caster::ColumnCaster;
use super::parser::parse_filter;
use super::resolver::IdentResolver;
use super::sort::{effective_sort, ResolvedSort};
use super::sql::{SelectBuilder, SqlFragment, SqlValue, RECORD_ALIAS, RECORD_TABLE};

/// Record row columns in the order rows are decoded
pub const RECORD_COLUMNS: &[&str] = &[
    "id",
    "module_id",
    "namespace_id",
    "owned_by",
    "created_at",
    "created_by",
    "updated_at",
    "updated_by",
    "deleted_at",
    "deleted_by",
];

/// Immutable plan of a record search
#[derive(Debug, Clone)]
pub struct SearchPlan {
    select: SelectBuilder,
    sort: ResolvedSort,
}

impl SearchPlan {
    pub fn sort(&self) -> &ResolvedSort {
        &self.sort
    }

    /// Statement for one fetch.
    ///
    /// The cursor adds its keyset condition and, when it pages backwards,
    /// reverses the ORDER BY.
    pub fn statement(
        &self,
        caster: &dyn ColumnCaster,
        cursor: Option<&PagingCursor>,
        limit: Option<usize>,
    ) -> QueryResult<SqlFragment> {
        let mut select = self.select.clone();

        if let Some(cursor) = cursor {
            let cond = cursor_condition(cursor, |key| {
                self.sort.ident(key).cloned().ok_or_else(|| {
                    QueryError::InvalidCursor(format!("key {:?} is not part of the sort", key))
                })
            })?;
            select.and_where(cond);
        }

        let reversed = cursor.map_or(false, |c| c.r_order);
        select.order_by = self.sort.order_by(caster, reversed);
        select.limit = limit;

        Ok(select.build())
    }
}

/// Plans searches against one module
pub struct RecordQueryPlanner<'a> {
    module: &'a Module,
    caster: &'a dyn ColumnCaster,
}

impl<'a> RecordQueryPlanner<'a> {
    pub fn new(module: &'a Module, caster: &'a dyn ColumnCaster) -> Self {
        Self { module, caster }
    }

    /// Checks that ids given on the filter agree with the module
    pub fn check_scope(&self, filter: &RecordFilter) -> QueryResult<()> {
        if filter.module_id != 0 && filter.module_id != self.module.id {
            return Err(QueryError::UnknownField(format!(
                "provided module {} does not match module {} on filter",
                self.module.id, filter.module_id
            )));
        }

        if filter.namespace_id != 0 && filter.namespace_id != self.module.namespace_id {
            return Err(QueryError::UnknownField(format!(
                "provided module namespace {} does not match namespace {} on filter",
                self.module.namespace_id, filter.namespace_id
            )));
        }

        Ok(())
    }

    /// Scoped, filtered SELECT without sort or limit.
    ///
    /// Joins registered by the filter stay in `resolver`; callers move them
    /// into the builder once every identifier is resolved.
    pub fn filtered_select(
        &self,
        filter: &RecordFilter,
        columns: Vec<String>,
        resolver: &mut IdentResolver,
    ) -> QueryResult<SelectBuilder> {
        self.check_scope(filter)?;

        let mut select = SelectBuilder::new(format!("{} AS {}", RECORD_TABLE, RECORD_ALIAS), columns);

        select.and_where(SqlFragment::new(
            format!("{}.module_id = ?", RECORD_ALIAS),
            vec![id_value(self.module.id)],
        ));
        select.and_where(SqlFragment::new(
            format!("{}.namespace_id = ?", RECORD_ALIAS),
            vec![id_value(self.module.namespace_id)],
        ));

        if let Some(cond) = filter
            .deleted
            .condition(&format!("{}.deleted_at", RECORD_ALIAS))
        {
            select.and_where(SqlFragment::raw(cond));
        }

        if !filter.labeled_ids.is_empty() {
            let placeholders = vec!["?"; filter.labeled_ids.len()].join(", ");
            select.and_where(SqlFragment::new(
                format!("{}.id IN ({})", RECORD_ALIAS, placeholders),
                filter.labeled_ids.iter().map(|id| id_value(*id)).collect(),
            ));
        }

        if let Some(node) = parse_filter(&filter.query, |name| resolver.resolve(name))? {
            select.and_where(node.to_sql()?);
        }

        Ok(select)
    }

    /// Plans a paged search
    pub fn plan_search(&self, filter: &RecordFilter) -> QueryResult<SearchPlan> {
        let mut resolver = IdentResolver::new(self.module, self.caster);

        let columns = RECORD_COLUMNS
            .iter()
            .map(|c| format!("{}.{}", RECORD_ALIAS, c))
            .collect();
        let mut select = self.filtered_select(filter, columns, &mut resolver)?;

        let sort = effective_sort(&filter.sort, filter.page_cursor.as_ref(), &mut resolver)?;
        select.joins = resolver.into_joins();

        Ok(SearchPlan { select, sort })
    }

    /// Plans a count of all rows matching the filter, ignoring paging
    pub fn plan_count(&self, filter: &RecordFilter) -> QueryResult<SqlFragment> {
        let mut resolver = IdentResolver::new(self.module, self.caster);
        let mut select = self.filtered_select(filter, vec!["COUNT(*)".to_string()], &mut resolver)?;
        select.joins = resolver.into_joins();
        Ok(select.build())
    }
}

/// Binds an id; ids above `i64::MAX` wrap like they do on write
pub fn id_value(id: u64) -> SqlValue {
    SqlValue::Integer(id as i64)
}

/// Deleted-state condition on the value table, if any
pub fn value_deleted_condition(deleted: DeletedState) -> Option<String> {
    deleted.condition("deleted_at")
}
