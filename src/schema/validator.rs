//! Record value validation against a module
//!
//! Validation semantics:
//! - Records must belong to the module (module and namespace ids match)
//! - Every value names a field of the module
//! - Single-valued fields only use place 0
//! - Values parse for the field kind; no coercion is applied
//!
//! The validator does not mutate records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::{QueryError, QueryResult};
use crate::record::{Record, RecordValue};

use super::types::{Field, FieldKind, Module};

/// Validates records before they are written.
pub struct RecordValidator<'a> {
    module: &'a Module,
}

impl<'a> RecordValidator<'a> {
    /// Creates a validator for the module.
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }

    /// Verifies that module and namespace ids on records match the module.
    pub fn validate_ownership(&self, records: &[Record]) -> QueryResult<()> {
        for r in records {
            if r.module_id != self.module.id {
                return Err(QueryError::UnknownField(format!(
                    "provided module {} does not match module {} on record",
                    self.module.id, r.module_id
                )));
            }

            if r.namespace_id != self.module.namespace_id {
                return Err(QueryError::UnknownField(format!(
                    "provided module namespace {} does not match namespace {} on record",
                    self.module.namespace_id, r.namespace_id
                )));
            }
        }

        Ok(())
    }

    /// Full validation: ownership plus every value.
    pub fn validate(&self, records: &[Record]) -> QueryResult<()> {
        self.validate_ownership(records)?;

        for r in records {
            for (i, rv) in r.values.iter().enumerate() {
                let field = self.module.field(&rv.name).ok_or_else(|| {
                    QueryError::UnknownField(format!("unknown field {:?}", rv.name))
                })?;

                if !field.multi && rv.place != 0 {
                    return Err(QueryError::TypeMismatch(format!(
                        "field {:?} is single-valued, got place {}",
                        rv.name, rv.place
                    )));
                }

                if r.values.0[..i]
                    .iter()
                    .any(|o| o.name == rv.name && o.place == rv.place)
                {
                    return Err(QueryError::NotUnique(format!(
                        "duplicate value for field {:?} at place {}",
                        rv.name, rv.place
                    )));
                }

                validate_value(field, rv)?;
            }
        }

        Ok(())
    }
}

/// Checks a single value against its field.
pub fn validate_value(field: &Field, rv: &RecordValue) -> QueryResult<()> {
    let ok = match field.kind {
        FieldKind::String | FieldKind::Email | FieldKind::Url | FieldKind::Select => true,
        FieldKind::Number => is_plain_decimal(rv.value.trim()),
        FieldKind::Bool => rv.value == "1" || rv.value == "0",
        FieldKind::DateTime => {
            if field.options.only_date {
                NaiveDate::parse_from_str(&rv.value, "%Y-%m-%d").is_ok()
            } else if field.options.only_time {
                NaiveTime::parse_from_str(&rv.value, "%H:%M:%S").is_ok()
                    || NaiveTime::parse_from_str(&rv.value, "%H:%M").is_ok()
            } else {
                is_sql_datetime(&rv.value)
            }
        }
        FieldKind::Record | FieldKind::User | FieldKind::File => {
            rv.value.parse::<u64>().map_or(false, |id| id == rv.ref_id)
        }
    };

    if ok {
        Ok(())
    } else {
        Err(QueryError::TypeMismatch(format!(
            "value {:?} is not a valid {} for field {:?}",
            rv.value,
            field.kind.type_name(),
            field.name
        )))
    }
}

/// Decimal text as SQL casts read it: optional sign, digits, optional
/// fraction. Exponents and `inf`/`NaN` spellings are rejected.
pub fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix(|c| c == '+' || c == '-').unwrap_or(text);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    !(int.is_empty() && frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

/// RFC 3339 with uppercase `T`/`Z`, or `YYYY-MM-DD HH:MM:SS`.
///
/// SQLite's date functions return NULL for the lowercase separators chrono
/// also accepts.
pub fn is_sql_datetime(text: &str) -> bool {
    if text.bytes().any(|b| b.is_ascii_lowercase()) {
        return false;
    }
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> Module {
        Module::new(
            1,
            9,
            vec![
                Field::string("status"),
                Field::number("score", 0),
                Field::bool("done"),
                Field::datetime("due").only_date(),
                Field::datetime("remind_at"),
                Field::record("parent"),
                Field::string("tags").multi(),
            ],
        )
    }

    fn record() -> Record {
        Record::new(1, 9)
    }

    #[test]
    fn test_valid_record() {
        let m = module();
        let r = record()
            .with_value(RecordValue::new("status", "open"))
            .with_value(RecordValue::new("score", "12.5"))
            .with_value(RecordValue::new("done", "0"))
            .with_value(RecordValue::new("due", "2024-05-01"))
            .with_value(RecordValue::reference("parent", 77))
            .with_value(RecordValue::new("tags", "a"))
            .with_value(RecordValue::new("tags", "b").at(1));

        RecordValidator::new(&m).validate(&[r]).unwrap();
    }

    #[test]
    fn test_module_mismatch() {
        let m = module();
        let err = RecordValidator::new(&m)
            .validate(&[Record::new(2, 9)])
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(_)));

        let err = RecordValidator::new(&m)
            .validate(&[Record::new(1, 8)])
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(_)));
    }

    #[test]
    fn test_unknown_field() {
        let m = module();
        let r = record().with_value(RecordValue::new("nope", "x"));
        let err = RecordValidator::new(&m).validate(&[r]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(_)));
    }

    #[test]
    fn test_type_mismatch() {
        let m = module();
        for rv in [
            RecordValue::new("score", "abc"),
            RecordValue::new("done", "true"),
            RecordValue::new("due", "May 1st"),
            RecordValue::new("parent", "77"),
            RecordValue::new("status", "x").at(1),
        ] {
            let r = record().with_value(rv);
            let err = RecordValidator::new(&m).validate(&[r]).unwrap_err();
            assert!(matches!(err, QueryError::TypeMismatch(_)), "{err}");
        }
    }

    #[test]
    fn test_numbers_are_plain_decimals() {
        let m = module();
        for ok in ["50", "-3", "+7", "2.5", " 12 ", ".5", "1."] {
            let r = record().with_value(RecordValue::new("score", ok));
            assert!(RecordValidator::new(&m).validate(&[r]).is_ok(), "{ok:?}");
        }
        for bad in ["1e3", "2E-1", "inf", "-infinity", "NaN", "", ".", "-", "1.2.3", "0x10"] {
            let r = record().with_value(RecordValue::new("score", bad));
            let err = RecordValidator::new(&m).validate(&[r]).unwrap_err();
            assert!(matches!(err, QueryError::TypeMismatch(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_datetimes_use_uppercase_separators() {
        let m = module();
        for ok in [
            "2024-03-01T12:00:00Z",
            "2024-03-01T12:00:00.250+02:00",
            "2024-03-01 12:00:00",
        ] {
            let r = record().with_value(RecordValue::new("remind_at", ok));
            assert!(RecordValidator::new(&m).validate(&[r]).is_ok(), "{ok:?}");
        }
        for bad in ["2024-03-01t12:00:00z", "2024-03-01T12:00:00z", "2024-03-01t12:00:00Z"] {
            let r = record().with_value(RecordValue::new("remind_at", bad));
            let err = RecordValidator::new(&m).validate(&[r]).unwrap_err();
            assert!(matches!(err, QueryError::TypeMismatch(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_duplicate_place() {
        let m = module();
        let r = record()
            .with_value(RecordValue::new("tags", "a"))
            .with_value(RecordValue::new("tags", "b"));
        let err = RecordValidator::new(&m).validate(&[r]).unwrap_err();
        assert!(matches!(err, QueryError::NotUnique(_)));
    }
}
