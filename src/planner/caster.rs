//! Field type to SQL expression casting
//!
//! Values are stored as text. Comparing or sorting them by their logical
//! type needs the column wrapped in a cast. The same cast is applied to the
//! literal side so both operands go through an identical conversion.
//!
//! Casting is dialect specific and sits behind `ColumnCaster`. Operator and
//! literal rules are dialect independent and live in free functions.

use crate::errors::{QueryError, QueryResult};
use crate::schema::{is_plain_decimal, Field, FieldKind};

use super::ast::{CompareOp, Literal};
use super::sql::SqlValue;

/// Comparison class of a resolved column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Text comparison
    Text,
    /// Numeric comparison
    Number,
    /// 0/1 integer
    Bool,
    /// Date and time
    DateTime,
    /// Date only
    Date,
    /// Time only
    Time,
    /// System timestamp stored as fixed-width text
    Timestamp,
    /// System id or record/user reference
    Id,
    /// Attachment reference; not comparable
    File,
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Number => "number",
            ColumnKind::Bool => "bool",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Id => "id",
            ColumnKind::File => "file",
        }
    }

    /// Kinds that order the same way can be compared with each other
    pub fn comparable_with(&self, other: ColumnKind) -> bool {
        use ColumnKind::*;
        match (self, other) {
            (File, _) | (_, File) => false,
            (DateTime | Date | Time | Timestamp, DateTime | Date | Time | Timestamp) => true,
            (Number | Id | Bool, Number | Id | Bool) => true,
            (a, b) => *a == b,
        }
    }
}

/// Column expression and literal template for a dynamic field
#[derive(Debug, Clone, PartialEq)]
pub struct CastExpr {
    /// Expression reading the field through its join alias
    pub expr: String,
    /// Template for the literal side; contains exactly one `?`
    pub literal: String,
    pub kind: ColumnKind,
}

/// Dialect-specific casting of dynamic fields
pub trait ColumnCaster: Send + Sync {
    /// Cast expression for a field joined under `alias`
    fn cast_field(&self, field: &Field, alias: &str) -> QueryResult<CastExpr>;

    /// ORDER BY term for an expression
    fn sort_expr(&self, expr: &str, descending: bool) -> String {
        if descending {
            format!("{} DESC", expr)
        } else {
            format!("{} ASC", expr)
        }
    }
}

/// SQLite casting rules
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCaster;

impl ColumnCaster for SqliteCaster {
    fn cast_field(&self, field: &Field, alias: &str) -> QueryResult<CastExpr> {
        let value = format!("{}.value", alias);
        let (expr, literal, kind) = match field.kind {
            FieldKind::String | FieldKind::Email | FieldKind::Url | FieldKind::Select => {
                (value, "?".to_string(), ColumnKind::Text)
            }
            FieldKind::Number => match field.options.precision {
                Some(0) => (
                    format!("CAST({} AS INTEGER)", value),
                    "CAST(? AS INTEGER)".to_string(),
                    ColumnKind::Number,
                ),
                Some(p) => (
                    format!("ROUND(CAST({} AS REAL), {})", value, p),
                    format!("ROUND(CAST(? AS REAL), {})", p),
                    ColumnKind::Number,
                ),
                None => (
                    format!("CAST({} AS REAL)", value),
                    "CAST(? AS REAL)".to_string(),
                    ColumnKind::Number,
                ),
            },
            FieldKind::Bool => (
                format!("CAST({} AS INTEGER)", value),
                "CAST(? AS INTEGER)".to_string(),
                ColumnKind::Bool,
            ),
            FieldKind::DateTime if field.options.only_date => (
                format!("DATE({})", value),
                "DATE(?)".to_string(),
                ColumnKind::Date,
            ),
            FieldKind::DateTime if field.options.only_time => (
                format!("TIME({})", value),
                "TIME(?)".to_string(),
                ColumnKind::Time,
            ),
            FieldKind::DateTime => (
                format!("DATETIME({})", value),
                "DATETIME(?)".to_string(),
                ColumnKind::DateTime,
            ),
            FieldKind::Record | FieldKind::User => (
                format!("{}.ref", alias),
                "CAST(? AS INTEGER)".to_string(),
                ColumnKind::Id,
            ),
            FieldKind::File => (format!("{}.ref", alias), "?".to_string(), ColumnKind::File),
        };

        Ok(CastExpr {
            expr,
            literal,
            kind,
        })
    }
}

/// Rejects operators the column kind does not support
pub fn check_operator(name: &str, kind: ColumnKind, op: CompareOp) -> QueryResult<()> {
    let ok = match kind {
        ColumnKind::Text => true,
        ColumnKind::File => false,
        ColumnKind::Bool => matches!(op, CompareOp::Eq | CompareOp::Ne),
        _ => !op.is_pattern(),
    };

    if ok {
        Ok(())
    } else {
        Err(QueryError::TypeMismatch(format!(
            "operator {} is not supported for {} field {:?}",
            op.sql(),
            kind.name(),
            name
        )))
    }
}

/// Rejects columns that cannot be ordered
pub fn check_sortable(name: &str, kind: ColumnKind) -> QueryResult<()> {
    if kind == ColumnKind::File {
        return Err(QueryError::TypeMismatch(format!(
            "file field {:?} cannot be sorted",
            name
        )));
    }
    Ok(())
}

/// Converts a literal into the bound value for a column kind.
///
/// Null is never bound; callers render it as `IS NULL`.
pub fn bind_literal(name: &str, kind: ColumnKind, lit: &Literal) -> QueryResult<SqlValue> {
    let mismatch = || {
        QueryError::TypeMismatch(format!(
            "literal {} does not fit {} field {:?}",
            lit,
            kind.name(),
            name
        ))
    };

    let value = match (kind, lit) {
        (_, Literal::Null) | (ColumnKind::File, _) => return Err(mismatch()),

        (ColumnKind::Text, Literal::String(s)) => SqlValue::Text(s.clone()),
        (ColumnKind::Text, Literal::Integer(i)) => SqlValue::Text(i.to_string()),
        (ColumnKind::Text, Literal::Float(f)) => SqlValue::Text(f.to_string()),

        (ColumnKind::Number, Literal::Integer(i)) => SqlValue::Integer(*i),
        (ColumnKind::Number, Literal::Float(f)) => SqlValue::Real(*f),
        (ColumnKind::Number, Literal::String(s)) if is_plain_decimal(s.trim()) => {
            SqlValue::Text(s.trim().to_string())
        }

        (ColumnKind::Bool, Literal::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (ColumnKind::Bool, Literal::Integer(i @ (0 | 1))) => SqlValue::Integer(*i),
        (ColumnKind::Bool, Literal::String(s)) if s == "1" || s == "0" => {
            SqlValue::Text(s.clone())
        }

        (
            ColumnKind::DateTime | ColumnKind::Date | ColumnKind::Time | ColumnKind::Timestamp,
            Literal::String(s),
        ) => SqlValue::Text(s.clone()),

        (ColumnKind::Id, Literal::Integer(i)) => SqlValue::Integer(*i),
        (ColumnKind::Id, Literal::String(s)) => match s.parse::<u64>() {
            Ok(id) => SqlValue::Integer(id as i64),
            Err(_) => return Err(mismatch()),
        },

        _ => return Err(mismatch()),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cast(field: Field) -> CastExpr {
        let alias = format!("rv_{}", field.name);
        SqliteCaster.cast_field(&field, &alias).unwrap()
    }

    #[test]
    fn test_text_fields_compare_raw() {
        let c = cast(Field::string("status"));
        assert_eq!(c.expr, "rv_status.value");
        assert_eq!(c.literal, "?");
        assert_eq!(c.kind, ColumnKind::Text);
    }

    #[test]
    fn test_number_precision() {
        assert_eq!(cast(Field::number("n", 0)).expr, "CAST(rv_n.value AS INTEGER)");
        assert_eq!(
            cast(Field::number("n", 2)).expr,
            "ROUND(CAST(rv_n.value AS REAL), 2)"
        );
        assert_eq!(
            cast(Field::new("n", FieldKind::Number)).literal,
            "CAST(? AS REAL)"
        );
    }

    #[test]
    fn test_datetime_variants() {
        assert_eq!(cast(Field::datetime("d")).expr, "DATETIME(rv_d.value)");
        assert_eq!(cast(Field::datetime("d").only_date()).literal, "DATE(?)");

        let mut t = Field::datetime("t");
        t.options.only_time = true;
        assert_eq!(cast(t).kind, ColumnKind::Time);
    }

    #[test]
    fn test_references_use_ref_column() {
        let c = cast(Field::record("parent"));
        assert_eq!(c.expr, "rv_parent.ref");
        assert_eq!(c.kind, ColumnKind::Id);
        assert_eq!(cast(Field::new("doc", FieldKind::File)).kind, ColumnKind::File);
    }

    #[test]
    fn test_operator_rules() {
        assert!(check_operator("s", ColumnKind::Text, CompareOp::Like).is_ok());
        assert!(check_operator("n", ColumnKind::Number, CompareOp::Gt).is_ok());

        for (kind, op) in [
            (ColumnKind::Number, CompareOp::Like),
            (ColumnKind::Bool, CompareOp::Gt),
            (ColumnKind::File, CompareOp::Eq),
            (ColumnKind::Timestamp, CompareOp::NotLike),
        ] {
            let err = check_operator("f", kind, op).unwrap_err();
            assert!(matches!(err, QueryError::TypeMismatch(_)));
        }
    }

    #[test]
    fn test_bind_literals() {
        assert_eq!(
            bind_literal("n", ColumnKind::Number, &Literal::Integer(15)).unwrap(),
            SqlValue::Integer(15)
        );
        assert_eq!(
            bind_literal("n", ColumnKind::Number, &Literal::String("20".into())).unwrap(),
            SqlValue::Text("20".into())
        );
        assert_eq!(
            bind_literal("b", ColumnKind::Bool, &Literal::Bool(true)).unwrap(),
            SqlValue::Integer(1)
        );
        assert_eq!(
            bind_literal("id", ColumnKind::Id, &Literal::String("42".into())).unwrap(),
            SqlValue::Integer(42)
        );

        for (kind, lit) in [
            (ColumnKind::Number, Literal::String("abc".into())),
            (ColumnKind::Number, Literal::String("1e3".into())),
            (ColumnKind::Number, Literal::String("inf".into())),
            (ColumnKind::Number, Literal::String("NaN".into())),
            (ColumnKind::Bool, Literal::Integer(2)),
            (ColumnKind::DateTime, Literal::Integer(2024)),
            (ColumnKind::Id, Literal::Float(1.5)),
            (ColumnKind::Text, Literal::Bool(false)),
        ] {
            assert!(matches!(
                bind_literal("f", kind, &lit),
                Err(QueryError::TypeMismatch(_))
            ));
        }
    }

    #[test]
    fn test_comparable_kinds() {
        assert!(ColumnKind::Date.comparable_with(ColumnKind::Timestamp));
        assert!(ColumnKind::Number.comparable_with(ColumnKind::Id));
        assert!(!ColumnKind::Text.comparable_with(ColumnKind::Number));
        assert!(!ColumnKind::File.comparable_with(ColumnKind::File));
    }
}
