//! Filter expression AST
//!
//! Identifiers are resolved while parsing, so every `Operand::Column` here
//! already carries its SQL expression and kind. Compiling a tree never
//! touches the module again.

use std::fmt;

use crate::errors::{QueryError, QueryResult};

use super::caster::{bind_literal, check_operator};
use super::resolver::ResolvedIdent;
use super::sql::{SqlFragment, SqlValue};

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    NotLike,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        }
    }

    /// Returns true for LIKE / NOT LIKE
    pub fn is_pattern(&self) -> bool {
        matches!(self, CompareOp::Like | CompareOp::NotLike)
    }

    /// Operator with its operands swapped, if one exists
    pub fn flipped(&self) -> Option<CompareOp> {
        match self {
            CompareOp::Eq => Some(CompareOp::Eq),
            CompareOp::Ne => Some(CompareOp::Ne),
            CompareOp::Gt => Some(CompareOp::Lt),
            CompareOp::Ge => Some(CompareOp::Le),
            CompareOp::Lt => Some(CompareOp::Gt),
            CompareOp::Le => Some(CompareOp::Ge),
            CompareOp::Like | CompareOp::NotLike => None,
        }
    }
}

/// Literal value in a filter
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Literal {
    /// Converts a JSON scalar; arrays and objects have no literal form
    pub fn from_json(value: &serde_json::Value) -> Option<Literal> {
        match value {
            serde_json::Value::Null => Some(Literal::Null),
            serde_json::Value::Bool(b) => Some(Literal::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Literal::Integer)
                .or_else(|| n.as_f64().map(Literal::Float)),
            serde_json::Value::String(s) => Some(Literal::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Value bound when no column gives the literal a type
    fn untyped(&self) -> SqlValue {
        match self {
            Literal::String(s) => SqlValue::Text(s.clone()),
            Literal::Integer(i) => SqlValue::Integer(*i),
            Literal::Float(f) => SqlValue::Real(*f),
            Literal::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Literal::Null => SqlValue::Null,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// Comparison operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ResolvedIdent),
    Literal(Literal),
}

/// Filter expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    In {
        column: ResolvedIdent,
        values: Vec<Literal>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
}

impl Node {
    /// Compiles the tree into a WHERE fragment.
    ///
    /// Fails with `TypeMismatch` when an operator or literal does not fit
    /// the column it is applied to.
    pub fn to_sql(&self) -> QueryResult<SqlFragment> {
        match self {
            Node::And(l, r) => Ok(SqlFragment::join(vec![l.to_sql()?, r.to_sql()?], " AND ").wrapped()),
            Node::Or(l, r) => Ok(SqlFragment::join(vec![l.to_sql()?, r.to_sql()?], " OR ").wrapped()),
            Node::Not(inner) => {
                let f = inner.to_sql()?;
                Ok(SqlFragment::new(format!("NOT ({})", f.sql), f.args))
            }
            Node::Compare { left, op, right } => compile_compare(left, *op, right),
            Node::In {
                column,
                values,
                negated,
            } => {
                check_operator(&column.name, column.kind, CompareOp::Eq)?;
                let mut args = Vec::with_capacity(values.len());
                for v in values {
                    args.push(bind_literal(&column.name, column.kind, v)?);
                }
                let placeholders = vec![column.literal.as_str(); values.len()].join(", ");
                let not = if *negated { "NOT " } else { "" };
                Ok(SqlFragment::new(
                    format!("{} {}IN ({})", column.expr, not, placeholders),
                    args,
                ))
            }
            Node::IsNull { operand, negated } => {
                let is = if *negated { "IS NOT NULL" } else { "IS NULL" };
                match operand {
                    Operand::Column(c) => Ok(SqlFragment::raw(format!("{} {}", c.expr, is))),
                    Operand::Literal(l) => Ok(SqlFragment::new(format!("? {}", is), vec![l.untyped()])),
                }
            }
        }
    }
}

fn compile_compare(left: &Operand, op: CompareOp, right: &Operand) -> QueryResult<SqlFragment> {
    match (left, right) {
        (Operand::Column(c), Operand::Literal(l)) => column_vs_literal(c, op, l),
        (Operand::Literal(l), Operand::Column(c)) => match op.flipped() {
            Some(flipped) => column_vs_literal(c, flipped, l),
            None => Err(QueryError::TypeMismatch(format!(
                "{} needs the field on the left side",
                op.sql()
            ))),
        },
        (Operand::Column(a), Operand::Column(b)) => {
            check_operator(&a.name, a.kind, op)?;
            check_operator(&b.name, b.kind, op)?;
            if !a.kind.comparable_with(b.kind) {
                return Err(QueryError::TypeMismatch(format!(
                    "cannot compare {} field {:?} with {} field {:?}",
                    a.kind.name(),
                    a.name,
                    b.kind.name(),
                    b.name
                )));
            }
            Ok(SqlFragment::raw(format!("{} {} {}", a.expr, op.sql(), b.expr)))
        }
        (Operand::Literal(a), Operand::Literal(b)) => {
            if *a == Literal::Null || *b == Literal::Null {
                return Err(QueryError::TypeMismatch(format!(
                    "null cannot be used with {}",
                    op.sql()
                )));
            }
            Ok(SqlFragment::new(
                format!("? {} ?", op.sql()),
                vec![a.untyped(), b.untyped()],
            ))
        }
    }
}

fn column_vs_literal(c: &ResolvedIdent, op: CompareOp, lit: &Literal) -> QueryResult<SqlFragment> {
    check_operator(&c.name, c.kind, op)?;
    if *lit == Literal::Null {
        return Err(QueryError::TypeMismatch(format!(
            "null cannot be used with {} on field {:?}",
            op.sql(),
            c.name
        )));
    }

    // pattern text is matched verbatim, never cast
    let template = if op.is_pattern() { "?" } else { c.literal.as_str() };
    let value = bind_literal(&c.name, c.kind, lit)?;
    Ok(SqlFragment::new(
        format!("{} {} {}", c.expr, op.sql(), template),
        vec![value],
    ))
}
