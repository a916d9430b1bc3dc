//! Typed SQL building blocks
//!
//! Fragments carry their positional arguments with them so that text and
//! arguments can never drift apart. Joins are descriptors rendered by the
//! select builder, never string templates.

pub use rusqlite::types::Value as SqlValue;

/// Alias of the record table in every generated query
pub const RECORD_ALIAS: &str = "crd";

/// Record table
pub const RECORD_TABLE: &str = "compose_record";

/// Key/value table holding field values
pub const VALUE_TABLE: &str = "compose_record_value";

/// Piece of SQL text plus its positional (`?`) arguments in order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Fragment without arguments
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    /// Joins fragments with a separator, concatenating arguments in order
    pub fn join(parts: Vec<SqlFragment>, sep: &str) -> Self {
        let mut sql = Vec::with_capacity(parts.len());
        let mut args = Vec::new();
        for p in parts {
            sql.push(p.sql);
            args.extend(p.args);
        }
        Self {
            sql: sql.join(sep),
            args,
        }
    }

    /// Wraps the text in parentheses
    pub fn wrapped(self) -> Self {
        Self {
            sql: format!("({})", self.sql),
            args: self.args,
        }
    }

    /// Number of `?` placeholders in the text
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// One term of a join's ON clause
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOn {
    /// `left = right` between two columns
    Columns { left: String, right: String },
    /// `column = ?` with a bound value
    Bind { column: String, value: SqlValue },
    /// `column IS NULL`
    IsNull(String),
}

impl JoinOn {
    fn render(&self) -> SqlFragment {
        match self {
            JoinOn::Columns { left, right } => SqlFragment::raw(format!("{} = {}", left, right)),
            JoinOn::Bind { column, value } => {
                SqlFragment::new(format!("{} = ?", column), vec![value.clone()])
            }
            JoinOn::IsNull(column) => SqlFragment::raw(format!("{} IS NULL", column)),
        }
    }
}

/// LEFT JOIN descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: &'static str,
    pub alias: String,
    pub on: Vec<JoinOn>,
}

impl Join {
    /// Join of the first active value of a field onto the record row
    pub fn field_value(field_name: &str) -> Self {
        let alias = format!("rv_{}", field_name);
        Self {
            table: VALUE_TABLE,
            on: vec![
                JoinOn::Columns {
                    left: format!("{}.record_id", alias),
                    right: format!("{}.id", RECORD_ALIAS),
                },
                JoinOn::Bind {
                    column: format!("{}.name", alias),
                    value: SqlValue::Text(field_name.to_string()),
                },
                JoinOn::Bind {
                    column: format!("{}.place", alias),
                    value: SqlValue::Integer(0),
                },
                JoinOn::IsNull(format!("{}.deleted_at", alias)),
            ],
            alias,
        }
    }

    pub fn render(&self) -> SqlFragment {
        let on = SqlFragment::join(self.on.iter().map(JoinOn::render).collect(), " AND ");
        SqlFragment::new(
            format!("LEFT JOIN {} AS {} ON ({})", self.table, self.alias, on.sql),
            on.args,
        )
    }
}

/// SELECT assembled from typed parts
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    pub columns: Vec<String>,
    pub from: String,
    pub joins: Vec<Join>,
    pub wheres: Vec<SqlFragment>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<usize>,
}

impl SelectBuilder {
    pub fn new(from: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            columns,
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn and_where(&mut self, cond: SqlFragment) {
        self.wheres.push(cond);
    }

    /// Renders the statement; argument order follows placeholder order
    /// (joins, then WHERE, then LIMIT).
    pub fn build(&self) -> SqlFragment {
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.from);
        let mut args = Vec::new();

        for join in &self.joins {
            let j = join.render();
            sql.push(' ');
            sql.push_str(&j.sql);
            args.extend(j.args);
        }

        if !self.wheres.is_empty() {
            let cond = SqlFragment::join(
                self.wheres.iter().cloned().map(SqlFragment::wrapped).collect(),
                " AND ",
            );
            sql.push_str(" WHERE ");
            sql.push_str(&cond.sql);
            args.extend(cond.args);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            args.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        SqlFragment { sql, args }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_join_binds_name() {
        let j = Join::field_value("score").render();
        assert_eq!(
            j.sql,
            "LEFT JOIN compose_record_value AS rv_score ON (rv_score.record_id = crd.id \
             AND rv_score.name = ? AND rv_score.place = ? AND rv_score.deleted_at IS NULL)"
        );
        assert_eq!(
            j.args,
            vec![SqlValue::Text("score".into()), SqlValue::Integer(0)]
        );
    }

    #[test]
    fn test_build_orders_arguments() {
        let mut q = SelectBuilder::new("compose_record AS crd", vec!["crd.id".into()]);
        q.joins.push(Join::field_value("score"));
        q.and_where(SqlFragment::new("crd.module_id = ?", vec![SqlValue::Integer(7)]));
        q.and_where(SqlFragment::raw("crd.deleted_at IS NULL"));
        q.order_by.push("crd.id ASC".into());
        q.limit = Some(3);

        let built = q.build();
        assert!(built.sql.starts_with("SELECT crd.id FROM compose_record AS crd LEFT JOIN"));
        assert!(built
            .sql
            .ends_with("WHERE (crd.module_id = ?) AND (crd.deleted_at IS NULL) ORDER BY crd.id ASC LIMIT ?"));
        assert_eq!(built.placeholder_count(), built.args.len());
        assert_eq!(
            built.args,
            vec![
                SqlValue::Text("score".into()),
                SqlValue::Integer(0),
                SqlValue::Integer(7),
                SqlValue::Integer(3),
            ]
        );
    }

    #[test]
    fn test_fragment_join() {
        let f = SqlFragment::join(
            vec![
                SqlFragment::new("a = ?", vec![SqlValue::Integer(1)]),
                SqlFragment::new("b = ?", vec![SqlValue::Integer(2)]),
            ],
            " OR ",
        )
        .wrapped();
        assert_eq!(f.sql, "(a = ? OR b = ?)");
        assert_eq!(f.args.len(), 2);
    }
}
