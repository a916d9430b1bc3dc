//! Query planner for record searches
//!
//! Translates filter text and sort keys into SQL over the record table and
//! its key/value table.
//!
//! # Design Principles
//!
//! - Deterministic: same filter and module produce the same statement
//! - Fail fast: the first unknown identifier aborts planning
//! - One join per field, however often the field is referenced
//! - Total order: every sort ends with a unique key
//!
//! # Pipeline
//!
//! 1. Tokenize and parse the filter, resolving identifiers as they appear
//! 2. Compile the tree to a WHERE fragment with bound arguments
//! 3. Normalize the sort (or take it from the cursor)
//! 4. Assemble joins, conditions, order and limit

mod ast;
mod caster;
mod lexer;
mod parser;
#[allow(clippy::module_inception)]
mod planner;
mod resolver;
mod sort;
mod sql;

pub use ast::{CompareOp, Literal, Node, Operand};
pub use caster::{
    bind_literal, check_operator, check_sortable, CastExpr, ColumnCaster, ColumnKind, SqliteCaster,
};
pub use parser::{parse_filter, MAX_FILTER_LENGTH, MAX_NESTING_DEPTH};
pub use planner::{id_value, value_deleted_condition, RecordQueryPlanner, SearchPlan, RECORD_COLUMNS};
pub use resolver::{system_column, IdentResolver, ResolvedIdent};
pub use sort::{effective_sort, normalize_sort, OrderKey, ResolvedSort, TIEBREAK_COLUMN};
pub use sql::{
    Join, JoinOn, SelectBuilder, SqlFragment, SqlValue, RECORD_ALIAS, RECORD_TABLE, VALUE_TABLE,
};
