//! Write operations
//!
//! Records of a batch are written one after another in caller order. Each
//! record (its row plus its values) is written in its own transaction, so
//! a failure on one record leaves the records before it applied and the
//! failing record untouched.
//!
//! Every batch is validated against the module before the first write.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::planner::{RECORD_TABLE, VALUE_TABLE};
use crate::record::{format_timestamp, Record};
use crate::schema::{Module, RecordValidator};

use super::{QueryContext, Store};

impl Store {
    /// Inserts records; an id of 0 is assigned by the store and written back
    pub fn create(&self, ctx: &QueryContext, module: &Module, records: &mut [Record]) -> QueryResult<()> {
        RecordValidator::new(module).validate(records)?;

        self.with_conn(ctx, |conn| {
            for record in records.iter_mut() {
                let tx = conn.transaction()?;
                insert_record(&tx, record)?;
                insert_values(&tx, record)?;
                tx.commit()?;
            }
            Ok(())
        })?;

        log_batch(Event::RecordsCreated, module, records.len());
        Ok(())
    }

    /// Updates records and replaces their values.
    ///
    /// A record carrying `deleted_at` is soft-deleted instead: its values
    /// are stamped with the same time and kept.
    pub fn update(&self, ctx: &QueryContext, module: &Module, records: &mut [Record]) -> QueryResult<()> {
        RecordValidator::new(module).validate(records)?;

        self.with_conn(ctx, |conn| {
            for record in records.iter_mut() {
                let tx = conn.transaction()?;
                if update_record(&tx, record)? == 0 {
                    return Err(QueryError::NotFound(record.id));
                }
                write_values(&tx, record)?;
                tx.commit()?;
            }
            Ok(())
        })?;

        log_batch(Event::RecordsUpdated, module, records.len());
        Ok(())
    }

    /// Column-scoped update; always `NotSupported` for valid input
    pub fn partial_update(
        &self,
        _ctx: &QueryContext,
        module: &Module,
        columns: &[&str],
        records: &[Record],
    ) -> QueryResult<()> {
        RecordValidator::new(module).validate_ownership(records)?;

        Err(QueryError::NotSupported(format!(
            "partial record update of {:?}",
            columns
        )))
    }

    /// Creates new records and updates existing ones
    pub fn upsert(&self, ctx: &QueryContext, module: &Module, records: &mut [Record]) -> QueryResult<()> {
        RecordValidator::new(module).validate(records)?;

        self.with_conn(ctx, |conn| {
            for record in records.iter_mut() {
                let tx = conn.transaction()?;
                if record.id != 0 && record_module(&tx, record.id)?.is_some() {
                    if update_record(&tx, record)? == 0 {
                        return Err(QueryError::NotUnique(format!(
                            "record {} belongs to another module",
                            record.id
                        )));
                    }
                    write_values(&tx, record)?;
                } else {
                    insert_record(&tx, record)?;
                    insert_values(&tx, record)?;
                }
                tx.commit()?;
            }
            Ok(())
        })?;

        log_batch(Event::RecordsUpserted, module, records.len());
        Ok(())
    }

    /// Removes records; their values go with them
    pub fn delete(&self, ctx: &QueryContext, module: &Module, records: &[Record]) -> QueryResult<()> {
        RecordValidator::new(module).validate_ownership(records)?;

        let removed = self.with_conn(ctx, |conn| {
            let mut removed = 0;
            for record in records {
                removed += delete_scoped(conn, module, record.id)?;
            }
            Ok(removed)
        })?;

        log_batch(Event::RecordsDeleted, module, removed);
        Ok(())
    }

    /// Removes one record by id; a missing id is not an error
    pub fn delete_by_id(&self, ctx: &QueryContext, module: &Module, id: u64) -> QueryResult<()> {
        let removed = self.with_conn(ctx, |conn| delete_scoped(conn, module, id))?;
        log_batch(Event::RecordsDeleted, module, removed);
        Ok(())
    }

    /// Removes every record of the module; returns how many were removed
    pub fn truncate(&self, ctx: &QueryContext, module: &Module) -> QueryResult<usize> {
        let removed = self.with_conn(ctx, |conn| {
            Ok(conn.execute(
                &format!(
                    "DELETE FROM {} WHERE module_id = ?1 AND namespace_id = ?2",
                    RECORD_TABLE
                ),
                params![module.id as i64, module.namespace_id as i64],
            )?)
        })?;

        log_event_with_fields(
            Event::ModuleTruncated,
            &[
                ("module_id", &module.id.to_string()),
                ("count", &removed.to_string()),
            ],
        );
        Ok(removed)
    }
}

fn log_batch(event: Event, module: &Module, count: usize) {
    log_event_with_fields(
        event,
        &[
            ("module_id", &module.id.to_string()),
            ("count", &count.to_string()),
        ],
    );
}

fn insert_record(tx: &Transaction<'_>, record: &mut Record) -> QueryResult<()> {
    let id = (record.id != 0).then_some(record.id as i64);

    tx.execute(
        &format!(
            "INSERT INTO {} (id, module_id, namespace_id, owned_by, created_at, created_by,
                updated_at, updated_by, deleted_at, deleted_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            RECORD_TABLE
        ),
        params![
            id,
            record.module_id as i64,
            record.namespace_id as i64,
            record.owned_by as i64,
            format_timestamp(&record.created_at),
            record.created_by as i64,
            record.updated_at.as_ref().map(format_timestamp),
            record.updated_by as i64,
            record.deleted_at.as_ref().map(format_timestamp),
            record.deleted_by as i64,
        ],
    )?;

    if record.id == 0 {
        record.id = tx.last_insert_rowid() as u64;
    }
    record.values.set_record_id(record.id);

    Ok(())
}

/// Returns the number of rows changed (0 or 1)
fn update_record(tx: &Transaction<'_>, record: &mut Record) -> QueryResult<usize> {
    let changed = tx.execute(
        &format!(
            "UPDATE {} SET owned_by = ?1, updated_at = ?2, updated_by = ?3,
                deleted_at = ?4, deleted_by = ?5
             WHERE id = ?6 AND module_id = ?7 AND namespace_id = ?8",
            RECORD_TABLE
        ),
        params![
            record.owned_by as i64,
            record.updated_at.as_ref().map(format_timestamp),
            record.updated_by as i64,
            record.deleted_at.as_ref().map(format_timestamp),
            record.deleted_by as i64,
            record.id as i64,
            record.module_id as i64,
            record.namespace_id as i64,
        ],
    )?;

    record.values.set_record_id(record.id);
    Ok(changed)
}

/// Values of an updated record: soft-delete cascade or full replacement
fn write_values(tx: &Transaction<'_>, record: &Record) -> QueryResult<()> {
    if let Some(deleted_at) = &record.deleted_at {
        tx.execute(
            &format!(
                "UPDATE {} SET deleted_at = ?1 WHERE record_id = ?2 AND deleted_at IS NULL",
                VALUE_TABLE
            ),
            params![format_timestamp(deleted_at), record.id as i64],
        )?;
        return Ok(());
    }

    tx.execute(
        &format!("DELETE FROM {} WHERE record_id = ?1", VALUE_TABLE),
        params![record.id as i64],
    )?;
    insert_values(tx, record)
}

fn insert_values(tx: &Transaction<'_>, record: &Record) -> QueryResult<()> {
    let mut stmt = tx.prepare_cached(&format!(
        "INSERT INTO {} (record_id, name, value, ref, place, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        VALUE_TABLE
    ))?;

    for rv in record.values.iter() {
        stmt.execute(params![
            record.id as i64,
            rv.name,
            rv.value,
            rv.ref_id as i64,
            rv.place,
            rv.deleted_at.as_ref().map(format_timestamp),
        ])?;
    }

    Ok(())
}

/// Module id of an existing record
fn record_module(tx: &Transaction<'_>, id: u64) -> QueryResult<Option<i64>> {
    Ok(tx
        .query_row(
            &format!("SELECT module_id FROM {} WHERE id = ?1", RECORD_TABLE),
            params![id as i64],
            |row| row.get(0),
        )
        .optional()?)
}

fn delete_scoped(conn: &Connection, module: &Module, id: u64) -> QueryResult<usize> {
    Ok(conn.execute(
        &format!(
            "DELETE FROM {} WHERE id = ?1 AND module_id = ?2 AND namespace_id = ?3",
            RECORD_TABLE
        ),
        params![id as i64, module.id as i64, module.namespace_id as i64],
    )?)
}
