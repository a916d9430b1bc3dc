//! Table layout
//!
//! Records live in `compose_record`, one row per record with the system
//! columns. Field values live in `compose_record_value`, one row per
//! (record, field, place). Both statements are idempotent.

use rusqlite::Connection;

use crate::errors::QueryResult;
use crate::planner::{RECORD_TABLE, VALUE_TABLE};

fn record_table_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY,
            module_id INTEGER NOT NULL,
            namespace_id INTEGER NOT NULL,
            owned_by INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            created_by INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            updated_by INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT,
            deleted_by INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS {table}_module ON {table} (module_id, namespace_id);",
        table = RECORD_TABLE
    )
}

fn value_table_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            record_id INTEGER NOT NULL REFERENCES {records}(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            value TEXT,
            ref INTEGER NOT NULL DEFAULT 0,
            place INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT,
            PRIMARY KEY (record_id, name, place)
        );",
        table = VALUE_TABLE,
        records = RECORD_TABLE
    )
}

/// Creates both tables if missing
pub fn create_tables(conn: &Connection) -> QueryResult<()> {
    conn.execute_batch(&record_table_ddl())?;
    conn.execute_batch(&value_table_ddl())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2)",
                [RECORD_TABLE, VALUE_TABLE],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
