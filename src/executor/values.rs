//! Batched value reassembly
//!
//! Field values of a fetched batch are loaded with one `IN` query per
//! batch (chunked for very large batches) and grouped back onto their
//! records. Records without values end up with an empty set.

use std::collections::HashMap;

use rusqlite::{params_from_iter, Connection};

use crate::errors::QueryResult;
use crate::planner::{id_value, value_deleted_condition, SqlValue, VALUE_TABLE};
use crate::record::{DeletedState, Record, RecordValue, RecordValueFilter, RecordValueSet};
use crate::store::QueryContext;

use super::rows::value_from_row;

/// Largest id list bound into one statement
pub const MAX_IDS_PER_STATEMENT: usize = 500;

/// Loads the values of the given records
pub fn load_values(
    conn: &Connection,
    ctx: &QueryContext,
    filter: &RecordValueFilter,
) -> QueryResult<RecordValueSet> {
    let mut out = Vec::new();

    for chunk in filter.record_ids.chunks(MAX_IDS_PER_STATEMENT) {
        ctx.check()?;

        let mut sql = format!(
            "SELECT record_id, name, value, ref, place, deleted_at FROM {} WHERE record_id IN ({})",
            VALUE_TABLE,
            vec!["?"; chunk.len()].join(", ")
        );
        if let Some(cond) = value_deleted_condition(filter.deleted) {
            sql.push_str(" AND ");
            sql.push_str(&cond);
        }
        sql.push_str(" ORDER BY record_id, name, place");

        let args: Vec<SqlValue> = chunk.iter().map(|id| id_value(*id)).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), value_from_row)?;
        for row in rows {
            out.push(row?);
        }
    }

    Ok(RecordValueSet::new(out))
}

/// Distributes values onto their records, replacing existing values
pub fn attach_values(records: &mut [Record], values: RecordValueSet) {
    let mut by_record: HashMap<u64, Vec<RecordValue>> = HashMap::new();
    for v in values.0 {
        by_record.entry(v.record_id).or_default().push(v);
    }

    for record in records.iter_mut() {
        record.values = RecordValueSet::new(by_record.remove(&record.id).unwrap_or_default());
    }
}

/// Loads and attaches values for a batch of records
pub fn reassemble(
    conn: &Connection,
    ctx: &QueryContext,
    records: &mut [Record],
    deleted: DeletedState,
) -> QueryResult<()> {
    if records.is_empty() {
        return Ok(());
    }

    let filter = RecordValueFilter {
        record_ids: records.iter().map(|r| r.id).collect(),
        deleted,
    };
    let values = load_values(conn, ctx, &filter)?;
    attach_values(records, values);
    Ok(())
}
