//! Keyset condition for a cursor
//!
//! For keys k1..kn with cursor values v1..vn, rows strictly after the
//! cursor satisfy
//!
//! ```text
//! (after1) OR (eq1 AND after2) OR ... OR (eq1 AND .. AND eq(n-1) AND after_n)
//! ```
//!
//! Direction per key is the sort direction flipped when the cursor pages
//! backwards. NULL sorts first in ascending order and last in descending
//! order, matching the engine's default ordering, so:
//!
//! | order | v is NULL       | v not NULL               |
//! |-------|-----------------|--------------------------|
//! | ASC   | `k IS NOT NULL` | `k > v`                  |
//! | DESC  | never           | `(k < v OR k IS NULL)`   |
//!
//! With `l_then` the boundary row itself is included.

use crate::errors::{QueryError, QueryResult};
use crate::planner::{bind_literal, Literal, ResolvedIdent, SqlFragment};

use super::PagingCursor;

/// Builds the WHERE fragment selecting rows past the cursor.
///
/// `resolve` maps a cursor key to its column; a key it cannot resolve makes
/// the cursor invalid.
pub fn cursor_condition<F>(cursor: &PagingCursor, mut resolve: F) -> QueryResult<SqlFragment>
where
    F: FnMut(&str) -> QueryResult<ResolvedIdent>,
{
    let mut keys = Vec::with_capacity(cursor.len());
    for (key, value, desc) in cursor.walk() {
        let ident = resolve(key).map_err(|e| QueryError::InvalidCursor(e.to_string()))?;
        let literal = Literal::from_json(value)
            .ok_or_else(|| QueryError::InvalidCursor(format!("value of {:?} is not a scalar", key)))?;
        let bound = match literal {
            Literal::Null => None,
            ref lit => Some(
                bind_literal(&ident.name, ident.kind, lit)
                    .map_err(|e| QueryError::InvalidCursor(e.to_string()))?,
            ),
        };
        keys.push(KeyBound {
            ident,
            value: bound,
            descending: desc != cursor.r_order,
        });
    }

    let mut clauses = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let last = i + 1 == keys.len();
        let after = if last && cursor.l_then {
            match key.after() {
                Some(after) => Some(SqlFragment::join(vec![after, key.equal()], " OR ").wrapped()),
                None => Some(key.equal()),
            }
        } else {
            key.after()
        };

        // nothing sorts after NULL in descending order
        let after = match after {
            Some(a) => a,
            None => continue,
        };

        let mut parts: Vec<SqlFragment> = keys[..i].iter().map(KeyBound::equal).collect();
        parts.push(after);
        clauses.push(SqlFragment::join(parts, " AND ").wrapped());
    }

    if clauses.is_empty() {
        return Ok(SqlFragment::raw("0"));
    }

    Ok(SqlFragment::join(clauses, " OR ").wrapped())
}

struct KeyBound {
    ident: ResolvedIdent,
    value: Option<crate::planner::SqlValue>,
    descending: bool,
}

impl KeyBound {
    fn equal(&self) -> SqlFragment {
        match &self.value {
            None => SqlFragment::raw(format!("{} IS NULL", self.ident.expr)),
            Some(v) => SqlFragment::new(
                format!("{} = {}", self.ident.expr, self.ident.literal),
                vec![v.clone()],
            ),
        }
    }

    fn after(&self) -> Option<SqlFragment> {
        match (&self.value, self.descending) {
            (None, false) => Some(SqlFragment::raw(format!("{} IS NOT NULL", self.ident.expr))),
            (None, true) => None,
            (Some(v), false) => Some(SqlFragment::new(
                format!("{} > {}", self.ident.expr, self.ident.literal),
                vec![v.clone()],
            )),
            (Some(v), true) => Some(SqlFragment::new(
                format!(
                    "({e} < {l} OR {e} IS NULL)",
                    e = self.ident.expr,
                    l = self.ident.literal
                ),
                vec![v.clone()],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ColumnKind, SqlValue};
    use serde_json::json;

    fn resolve(key: &str) -> QueryResult<ResolvedIdent> {
        match key {
            "score" => Ok(ResolvedIdent {
                name: "score".into(),
                expr: "S".into(),
                literal: "CAST(? AS INTEGER)".into(),
                kind: ColumnKind::Number,
            }),
            "id" => Ok(ResolvedIdent {
                name: "id".into(),
                expr: "crd.id".into(),
                literal: "?".into(),
                kind: ColumnKind::Id,
            }),
            other => Err(QueryError::UnknownField(other.into())),
        }
    }

    fn cursor(score: serde_json::Value, desc: bool) -> PagingCursor {
        let mut c = PagingCursor::new();
        c.set("score", score, desc);
        c.set("id", json!(2), desc);
        c
    }

    #[test]
    fn test_ascending() {
        let f = cursor_condition(&cursor(json!("20"), false), resolve).unwrap();
        assert_eq!(
            f.sql,
            "((S > CAST(? AS INTEGER)) OR (S = CAST(? AS INTEGER) AND crd.id > ?))"
        );
        assert_eq!(
            f.args,
            vec![
                SqlValue::Text("20".into()),
                SqlValue::Text("20".into()),
                SqlValue::Integer(2),
            ]
        );
    }

    #[test]
    fn test_descending_includes_nulls() {
        let f = cursor_condition(&cursor(json!("20"), true), resolve).unwrap();
        assert_eq!(
            f.sql,
            "(((S < CAST(? AS INTEGER) OR S IS NULL)) OR (S = CAST(? AS INTEGER) AND crd.id < ?))"
        );
    }

    #[test]
    fn test_reverse_flips_direction() {
        let mut c = cursor(json!("20"), false);
        c.r_order = true;
        let f = cursor_condition(&c, resolve).unwrap();
        assert!(f.sql.contains("S < CAST(? AS INTEGER) OR S IS NULL"));
        assert!(f.sql.contains("crd.id < ?"));
    }

    #[test]
    fn test_null_values() {
        let f = cursor_condition(&cursor(json!(null), false), resolve).unwrap();
        assert_eq!(f.sql, "((S IS NOT NULL) OR (S IS NULL AND crd.id > ?))");

        let f = cursor_condition(&cursor(json!(null), true), resolve).unwrap();
        assert_eq!(f.sql, "((S IS NULL AND crd.id < ?))");
    }

    #[test]
    fn test_inclusive_last_key() {
        let mut c = cursor(json!("20"), false);
        c.l_then = true;
        let f = cursor_condition(&c, resolve).unwrap();
        assert!(f.sql.ends_with("(S = CAST(? AS INTEGER) AND (crd.id > ? OR crd.id = ?)))"));
        assert_eq!(f.placeholder_count(), f.args.len());
    }

    #[test]
    fn test_unresolvable_key() {
        let mut c = PagingCursor::new();
        c.set("gone", json!(1), false);
        assert!(matches!(
            cursor_condition(&c, resolve),
            Err(QueryError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_value_of_wrong_type() {
        let mut c = PagingCursor::new();
        c.set("id", json!("abc"), false);
        assert!(matches!(
            cursor_condition(&c, resolve),
            Err(QueryError::InvalidCursor(_))
        ));
    }
}
