//! Read operations
//!
//! # Execution Flow (strict order)
//!
//! 1. Check the filter against the module (before any statement runs)
//! 2. Plan: parse the filter, resolve identifiers, normalize the sort
//! 3. Fetch the page, refetching while a record check rejects rows
//! 4. Reassemble values for every fetched batch
//! 5. Hand back the page and the filter with sort and cursors filled in

use rusqlite::{params, params_from_iter};
use serde_json::{Map, Value};

use crate::errors::{QueryError, QueryResult};
use crate::executor::{
    load_values, parse_dimensions, parse_metrics, plan_report, query_records, reassemble,
    run_report, PageExecutor, SqliteSource,
};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::planner::{
    id_value, RecordQueryPlanner, SelectBuilder, SqlFragment, RECORD_COLUMNS, RECORD_TABLE,
};
use crate::record::{DeletedState, Record, RecordFilter, RecordValueFilter, RecordValueSet};
use crate::schema::Module;

use super::{QueryContext, Store};

impl Store {
    /// Fetches one page of records matching `filter`.
    ///
    /// The returned filter carries the effective sort (tiebreak included),
    /// the prev/next cursors of the page, and no page cursor.
    pub fn search(
        &self,
        ctx: &QueryContext,
        module: &Module,
        mut filter: RecordFilter,
    ) -> QueryResult<(Vec<Record>, RecordFilter)> {
        let module_id = module.id.to_string();
        let scope = ObservationScope::with_fields("SEARCH", &[("module_id", &module_id)]);

        let planner = RecordQueryPlanner::new(module, self.caster());
        let plan = match planner.plan_search(&filter) {
            Ok(plan) => plan,
            Err(e) => {
                if let QueryError::InvalidCursor(reason) = &e {
                    log_event_with_fields(
                        Event::CursorRejected,
                        &[("module_id", &module_id), ("reason", reason)],
                    );
                }
                scope.fail(&e.to_string());
                return Err(e);
            }
        };

        let options = self.config().page_options();
        let result = self.with_conn(ctx, |conn| {
            let mut source = SqliteSource::new(conn, ctx, module, &plan, self.caster(), filter.deleted);
            PageExecutor::new(&mut source, options).execute(
                filter.page_cursor.as_ref(),
                filter.limit,
                filter.check.as_ref(),
            )
        });

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };

        scope.complete_with_fields(&[
            ("rows", &page.len().to_string()),
            ("fetches", &page.fetches.to_string()),
            ("scanned", &page.scanned.to_string()),
        ]);

        filter.sort = plan.sort().sort_set();
        filter.page_cursor = None;
        filter.prev_page = page.prev;
        filter.next_page = page.next;

        Ok((page.records, filter))
    }

    /// Counts records matching `filter`, ignoring paging
    pub fn count(&self, ctx: &QueryContext, module: &Module, filter: &RecordFilter) -> QueryResult<u64> {
        let stmt = RecordQueryPlanner::new(module, self.caster()).plan_count(filter)?;
        self.with_conn(ctx, |conn| {
            let n: i64 = conn.query_row(
                &stmt.sql,
                params_from_iter(stmt.args.iter()),
                |row| row.get(0),
            )?;
            Ok(n.max(0) as u64)
        })
    }

    /// Loads one record with its values, soft-deleted or not
    pub fn lookup_by_id(&self, ctx: &QueryContext, module: &Module, id: u64) -> QueryResult<Record> {
        let mut select = SelectBuilder::new(
            RECORD_TABLE,
            RECORD_COLUMNS.iter().map(|c| c.to_string()).collect(),
        );
        select.and_where(SqlFragment::new("id = ?", vec![id_value(id)]));
        select.and_where(SqlFragment::new("module_id = ?", vec![id_value(module.id)]));
        select.and_where(SqlFragment::new(
            "namespace_id = ?",
            vec![id_value(module.namespace_id)],
        ));
        let stmt = select.build();

        self.with_conn(ctx, |conn| {
            let mut records = query_records(conn, &stmt)?;
            reassemble(conn, ctx, &mut records, DeletedState::Inclusive)?;
            records.pop().ok_or(QueryError::NotFound(id))
        })
    }

    /// Loads the values of the given records in batches
    pub fn search_values(&self, ctx: &QueryContext, filter: &RecordValueFilter) -> QueryResult<RecordValueSet> {
        if filter.record_ids.is_empty() {
            return Ok(RecordValueSet::default());
        }
        self.with_conn(ctx, |conn| load_values(conn, ctx, filter))
    }

    /// Returns true if a record with this id exists in the module
    pub fn exists(&self, ctx: &QueryContext, module: &Module, id: u64) -> QueryResult<bool> {
        self.with_conn(ctx, |conn| {
            let n: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE id = ?1 AND module_id = ?2 AND namespace_id = ?3",
                    RECORD_TABLE
                ),
                params![id as i64, module.id as i64, module.namespace_id as i64],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Groups matching records by `dimensions` and aggregates `metrics`.
    ///
    /// ```text
    /// report(ctx, module, "sum(score)", "status", &filter)
    ///   -> [{"status": "open", "count": 2, "sum_score": 30}, ...]
    /// ```
    pub fn report(
        &self,
        ctx: &QueryContext,
        module: &Module,
        metrics: &str,
        dimensions: &str,
        filter: &RecordFilter,
    ) -> QueryResult<Vec<Map<String, Value>>> {
        let metrics = parse_metrics(metrics)?;
        let dimensions = parse_dimensions(dimensions)?;
        let plan = plan_report(module, self.caster(), filter, metrics, dimensions)?;

        self.with_conn(ctx, |conn| run_report(conn, &plan))
    }
}
