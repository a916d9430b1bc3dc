//! Row decoding
//!
//! Ids are stored as SQLite INTEGER (i64) and exposed as u64. Timestamps
//! are stored as fixed-width RFC 3339 text.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params_from_iter, Connection, Row};

use crate::errors::QueryResult;
use crate::planner::SqlFragment;
use crate::record::{parse_timestamp, Record, RecordValue, RecordValueSet};

fn id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0) as u64)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("invalid timestamp {:?}", raw).into(),
            )
        }),
    }
}

/// Decodes a record row selected with `RECORD_COLUMNS`
pub fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let created_at = timestamp_column(row, 4)?.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Null, "created_at is null".into())
    })?;

    Ok(Record {
        id: id_column(row, 0)?,
        module_id: id_column(row, 1)?,
        namespace_id: id_column(row, 2)?,
        values: RecordValueSet::default(),
        owned_by: id_column(row, 3)?,
        created_at,
        created_by: id_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
        updated_by: id_column(row, 7)?,
        deleted_at: timestamp_column(row, 8)?,
        deleted_by: id_column(row, 9)?,
    })
}

/// Decodes `record_id, name, value, ref, place, deleted_at`
pub fn value_from_row(row: &Row<'_>) -> rusqlite::Result<RecordValue> {
    Ok(RecordValue {
        record_id: id_column(row, 0)?,
        name: row.get(1)?,
        value: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        ref_id: id_column(row, 3)?,
        place: row.get(4)?,
        deleted_at: timestamp_column(row, 5)?,
    })
}

/// Runs a record SELECT
pub fn query_records(conn: &Connection, stmt: &SqlFragment) -> QueryResult<Vec<Record>> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    let rows = prepared.query_map(params_from_iter(stmt.args.iter()), record_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
