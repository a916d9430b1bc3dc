//! Cursor values read back from a fetched record
//!
//! Values are taken in the exact representation the query compares them
//! in: stored text for fields, the `ref` column for references, and the
//! stored timestamp text for system time columns.

use serde_json::{json, Value};

use crate::planner::system_column;
use crate::record::{format_timestamp, Record, SortExprSet};
use crate::schema::Module;

use super::PagingCursor;

/// Builds a cursor pointing at `record` under `sort`.
///
/// Keys the record has no value for are stored as null.
pub fn cursor_from_record(module: &Module, record: &Record, sort: &SortExprSet) -> PagingCursor {
    let mut cursor = PagingCursor::new();
    for expr in sort.iter() {
        cursor.set(
            expr.column.clone(),
            sort_value(module, record, &expr.column),
            expr.descending,
        );
    }
    cursor
}

/// Value of a sort key on a record
pub fn sort_value(module: &Module, record: &Record, column: &str) -> Value {
    if let Some((name, _)) = system_column(column) {
        return match name {
            "id" => json!(record.id),
            "module_id" => json!(record.module_id),
            "namespace_id" => json!(record.namespace_id),
            "owned_by" => json!(record.owned_by),
            "created_by" => json!(record.created_by),
            "updated_by" => json!(record.updated_by),
            "deleted_by" => json!(record.deleted_by),
            "created_at" => json!(format_timestamp(&record.created_at)),
            "updated_at" => record
                .updated_at
                .as_ref()
                .map_or(Value::Null, |t| json!(format_timestamp(t))),
            "deleted_at" => record
                .deleted_at
                .as_ref()
                .map_or(Value::Null, |t| json!(format_timestamp(t))),
            _ => Value::Null,
        };
    }

    let reference = module.field(column).map_or(false, |f| f.kind.is_reference());
    match record.values.get(column, 0) {
        None => Value::Null,
        Some(rv) if reference => json!(rv.ref_id),
        Some(rv) => json!(rv.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordValue;
    use crate::schema::Field;
    use chrono::{TimeZone, Utc};

    fn module() -> Module {
        Module::new(
            1,
            1,
            vec![Field::number("score", 0), Field::record("parent")],
        )
    }

    #[test]
    fn test_collects_in_sort_order() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = Record::new(1, 1)
            .with_id(5)
            .created(at)
            .with_value(RecordValue::new("score", "20"))
            .with_value(RecordValue::reference("parent", 9));

        let sort: SortExprSet = "score DESC, parent, createdAt, id DESC".parse().unwrap();
        let c = cursor_from_record(&module(), &record, &sort);

        assert_eq!(c.keys(), &["score", "parent", "createdAt", "id"]);
        assert_eq!(
            c.values(),
            &[
                json!("20"),
                json!(9),
                json!("2024-03-01T12:00:00.000000Z"),
                json!(5)
            ]
        );
        assert_eq!(c.sort(), sort);
    }

    #[test]
    fn test_missing_value_is_null() {
        let record = Record::new(1, 1).with_id(5);
        assert_eq!(sort_value(&module(), &record, "score"), Value::Null);
        assert_eq!(sort_value(&module(), &record, "updatedAt"), Value::Null);
    }
}
