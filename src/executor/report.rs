//! Grouped aggregate reports over a module's records
//!
//! A report counts the records matching a filter and optionally aggregates
//! numeric fields, grouped by zero or more dimension fields:
//!
//! ```text
//! metrics:    "sum(score), max(score)"
//! dimensions: "status"
//! ```
//!
//! Every report row carries `count`. Rows are ordered by dimensions.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{QueryError, QueryResult};
use crate::planner::{
    check_sortable, ColumnCaster, ColumnKind, IdentResolver, RecordQueryPlanner, SqlFragment, SqlValue,
};
use crate::record::RecordFilter;
use crate::schema::{is_identifier, Module};

/// Aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(Aggregate::Count),
            "sum" => Some(Aggregate::Sum),
            "avg" => Some(Aggregate::Avg),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// One aggregated column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub aggregate: Aggregate,
    pub field: Option<String>,
}

impl Metric {
    /// Key of the metric in report rows, e.g. `sum_score`
    pub fn alias(&self) -> String {
        match &self.field {
            None => "count".to_string(),
            Some(f) => format!("{}_{}", self.aggregate.sql().to_ascii_lowercase(), f),
        }
    }
}

/// Report request as accepted on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportRequest {
    pub metrics: String,
    pub dimensions: String,
    pub filter: RecordFilter,
}

/// Parses `"count, sum(score), max(score)"`.
///
/// `count` is always part of the result; listing it is optional.
pub fn parse_metrics(input: &str) -> QueryResult<Vec<Metric>> {
    let mut metrics = vec![Metric {
        aggregate: Aggregate::Count,
        field: None,
    }];

    let mut offset = 0;
    for part in input.split(',') {
        let position = offset + (part.len() - part.trim_start().len());
        offset += part.len() + 1;

        let text = part.trim();
        if text.is_empty() {
            if input.trim().is_empty() {
                break;
            }
            return Err(QueryError::syntax(position, "empty metric"));
        }

        let (name, field) = match text.find('(') {
            None => (text, None),
            Some(open) => {
                let inner = text[open + 1..].strip_suffix(')').ok_or_else(|| {
                    QueryError::syntax(position + text.len(), "expected ')' after metric field")
                })?;
                let inner = inner.trim();
                (text[..open].trim(), (!inner.is_empty()).then(|| inner.to_string()))
            }
        };

        let aggregate = Aggregate::parse(name)
            .ok_or_else(|| QueryError::syntax(position, format!("unknown aggregate {:?}", name)))?;

        match (aggregate, &field) {
            (Aggregate::Count, None) => continue,
            (Aggregate::Count, Some(_)) => {
                return Err(QueryError::syntax(position, "count takes no field"));
            }
            (_, None) => {
                return Err(QueryError::syntax(
                    position,
                    format!("{} needs a field", aggregate.sql().to_ascii_lowercase()),
                ));
            }
            (_, Some(f)) if !is_identifier(f) => {
                return Err(QueryError::syntax(position, format!("invalid field {:?}", f)));
            }
            _ => {}
        }

        let metric = Metric { aggregate, field };
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }

    Ok(metrics)
}

/// Parses a comma separated list of dimension names
pub fn parse_dimensions(input: &str) -> QueryResult<Vec<String>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let mut offset = 0;
    for part in input.split(',') {
        let position = offset + (part.len() - part.trim_start().len());
        offset += part.len() + 1;

        let name = part.trim();
        if !is_identifier(name) {
            return Err(QueryError::syntax(position, format!("invalid dimension {:?}", name)));
        }
        if !out.iter().any(|d| d == name) {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

/// Planned report statement
#[derive(Debug, Clone)]
pub struct ReportPlan {
    pub stmt: SqlFragment,
    pub dimensions: Vec<String>,
    pub metrics: Vec<Metric>,
}

/// Plans a report over the records matching `filter`
pub fn plan_report(
    module: &Module,
    caster: &dyn ColumnCaster,
    filter: &RecordFilter,
    metrics: Vec<Metric>,
    dimensions: Vec<String>,
) -> QueryResult<ReportPlan> {
    let planner = RecordQueryPlanner::new(module, caster);
    let mut resolver = IdentResolver::new(module, caster);
    let mut select = planner.filtered_select(filter, Vec::new(), &mut resolver)?;

    let mut columns = Vec::new();
    let mut group_by = Vec::new();
    for (i, dim) in dimensions.iter().enumerate() {
        let ident = resolver.resolve(dim)?;
        check_sortable(dim, ident.kind)?;
        columns.push(format!("{} AS d{}", ident.expr, i));
        group_by.push(format!("d{}", i));
    }

    for (i, metric) in metrics.iter().enumerate() {
        let expr = match &metric.field {
            None => "COUNT(*)".to_string(),
            Some(field) => {
                let ident = resolver.resolve(field)?;
                let numeric_only = matches!(metric.aggregate, Aggregate::Sum | Aggregate::Avg);
                if (numeric_only && ident.kind != ColumnKind::Number) || ident.kind == ColumnKind::File {
                    return Err(QueryError::TypeMismatch(format!(
                        "{} is not supported for {} field {:?}",
                        metric.aggregate.sql().to_ascii_lowercase(),
                        ident.kind.name(),
                        field
                    )));
                }
                format!("{}({})", metric.aggregate.sql(), ident.expr)
            }
        };
        columns.push(format!("{} AS m{}", expr, i));
    }

    select.columns = columns;
    select.order_by = group_by.clone();
    select.group_by = group_by;
    select.joins = resolver.into_joins();

    Ok(ReportPlan {
        stmt: select.build(),
        dimensions,
        metrics,
    })
}

/// Runs a planned report
pub fn run_report(conn: &Connection, plan: &ReportPlan) -> QueryResult<Vec<Map<String, Value>>> {
    let mut prepared = conn.prepare(&plan.stmt.sql)?;
    let width = plan.dimensions.len() + plan.metrics.len();
    let mut rows = prepared.query(params_from_iter(plan.stmt.args.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Map::new();
        for i in 0..width {
            let key = if i < plan.dimensions.len() {
                plan.dimensions[i].clone()
            } else {
                plan.metrics[i - plan.dimensions.len()].alias()
            };
            map.insert(key, json_value(row.get::<_, SqlValue>(i)?));
        }
        out.push(map);
    }

    Ok(out)
}

fn json_value(v: SqlValue) -> Value {
    match v {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(STANDARD.encode(b)),
    }
}
