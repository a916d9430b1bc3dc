//! Identifier resolution
//!
//! Maps names used in filters and sorts to SQL expressions. System columns
//! are read from the record row. Module fields are read through a LEFT JOIN
//! on the value table, registered at most once per field no matter how many
//! times the field is referenced.

use crate::errors::{QueryError, QueryResult};
use crate::schema::Module;

use super::caster::{ColumnCaster, ColumnKind};
use super::sql::{Join, RECORD_ALIAS};

/// Identifier resolved to an expression
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdent {
    /// Name as written by the caller
    pub name: String,
    /// SQL expression yielding the comparable value
    pub expr: String,
    /// Template for literals compared against `expr`
    pub literal: String,
    pub kind: ColumnKind,
}

/// System columns of the record row: accepted spellings, column, kind
const SYSTEM_COLUMNS: &[(&[&str], &str, ColumnKind)] = &[
    (&["id", "recordID", "record_id"], "id", ColumnKind::Id),
    (&["moduleID", "module_id"], "module_id", ColumnKind::Id),
    (&["namespaceID", "namespace_id"], "namespace_id", ColumnKind::Id),
    (&["ownedBy", "owned_by"], "owned_by", ColumnKind::Id),
    (&["createdBy", "created_by"], "created_by", ColumnKind::Id),
    (&["createdAt", "created_at"], "created_at", ColumnKind::Timestamp),
    (&["updatedBy", "updated_by"], "updated_by", ColumnKind::Id),
    (&["updatedAt", "updated_at"], "updated_at", ColumnKind::Timestamp),
    (&["deletedBy", "deleted_by"], "deleted_by", ColumnKind::Id),
    (&["deletedAt", "deleted_at"], "deleted_at", ColumnKind::Timestamp),
];

/// Looks up a system column by any accepted spelling (case-insensitive).
///
/// Returns the canonical column name and its kind.
pub fn system_column(name: &str) -> Option<(&'static str, ColumnKind)> {
    SYSTEM_COLUMNS
        .iter()
        .find(|(names, _, _)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
        .map(|(_, column, kind)| (*column, *kind))
}

/// Resolves identifiers for one query against one module
pub struct IdentResolver<'a> {
    module: &'a Module,
    caster: &'a dyn ColumnCaster,
    joins: Vec<Join>,
}

impl<'a> IdentResolver<'a> {
    pub fn new(module: &'a Module, caster: &'a dyn ColumnCaster) -> Self {
        Self {
            module,
            caster,
            joins: Vec::new(),
        }
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    /// Resolves a name; fails with `UnknownField` if it is neither a
    /// system column nor a field of the module.
    pub fn resolve(&mut self, name: &str) -> QueryResult<ResolvedIdent> {
        if let Some((column, kind)) = system_column(name) {
            return Ok(ResolvedIdent {
                name: name.to_string(),
                expr: format!("{}.{}", RECORD_ALIAS, column),
                literal: "?".to_string(),
                kind,
            });
        }

        let field = self.module.field(name).ok_or_else(|| {
            QueryError::UnknownField(format!(
                "{:?} is not a field of module {}",
                name, self.module.id
            ))
        })?;

        let join = Join::field_value(&field.name);
        let cast = self.caster.cast_field(field, &join.alias)?;
        if !self.joins.iter().any(|j| j.alias == join.alias) {
            self.joins.push(join);
        }

        Ok(ResolvedIdent {
            name: name.to_string(),
            expr: cast.expr,
            literal: cast.literal,
            kind: cast.kind,
        })
    }

    /// Joins registered so far, in first-reference order
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn into_joins(self) -> Vec<Join> {
        self.joins
    }
}
