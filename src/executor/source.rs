//! SQLite-backed record source

use rusqlite::Connection;

use crate::errors::QueryResult;
use crate::observability::Logger;
use crate::paging::{cursor_from_record, PagingCursor};
use crate::planner::{ColumnCaster, SearchPlan};
use crate::record::{DeletedState, Record, SortExprSet};
use crate::schema::Module;
use crate::store::QueryContext;

use super::executor::RecordSource;
use super::rows::query_records;
use super::values::reassemble;

/// Fetches planned records from a connection, values included
pub struct SqliteSource<'a> {
    conn: &'a Connection,
    ctx: &'a QueryContext,
    module: &'a Module,
    plan: &'a SearchPlan,
    caster: &'a dyn ColumnCaster,
    deleted: DeletedState,
    sort: SortExprSet,
}

impl<'a> SqliteSource<'a> {
    pub fn new(
        conn: &'a Connection,
        ctx: &'a QueryContext,
        module: &'a Module,
        plan: &'a SearchPlan,
        caster: &'a dyn ColumnCaster,
        deleted: DeletedState,
    ) -> Self {
        Self {
            conn,
            ctx,
            module,
            plan,
            caster,
            deleted,
            sort: plan.sort().sort_set(),
        }
    }
}

impl RecordSource for SqliteSource<'_> {
    fn fetch(&mut self, cursor: Option<&PagingCursor>, limit: Option<usize>) -> QueryResult<Vec<Record>> {
        self.ctx.check()?;

        let stmt = self.plan.statement(self.caster, cursor, limit)?;
        let mut records = query_records(self.conn, &stmt)?;
        reassemble(self.conn, self.ctx, &mut records, self.deleted)?;

        Logger::trace(
            "RECORD_FETCH",
            &[
                ("module_id", &self.module.id.to_string()),
                ("limit", &limit.map_or("none".to_string(), |l| l.to_string())),
                ("rows", &records.len().to_string()),
                ("sql", &stmt.sql),
            ],
        );

        Ok(records)
    }

    fn cursor_for(&self, record: &Record) -> PagingCursor {
        cursor_from_record(self.module, record, &self.sort)
    }
}
