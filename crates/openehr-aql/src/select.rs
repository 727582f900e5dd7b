//! SELECT clause compilation.
//!
//! Path aggregates are computed in two steps. A lateral helper relation
//! reduces the values found in one dataset row to a single partial result,
//! and the select list combines the partial results of all rows. Helpers
//! always yield exactly one row, so several aggregates in one query do not
//! multiply each other's rows.

use crate::ast::{
    AggregateFunctionCall, ColumnExpr, CountArgument, IdentifiedPath, SelectClause, Selection,
};
use crate::context::CompileContext;
use crate::error::{AqlError, Result};
use crate::functions::FunctionCompiler;
use crate::path::{PathResolver, ResolvedPath};
use crate::sql_builder::FromItem;
use crate::value::{Extraction, ValueExtractor, ValueMode, primitive_sql};

/// How the final projection reads a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Direct,
    /// The column holds per-row arrays of distinct values; count their union.
    DistinctCount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub name: String,
    pub expression: String,
    pub projection: Projection,
}

impl SelectColumn {
    fn new(name: String, expression: String) -> Self {
        Self {
            name,
            expression,
            projection: Projection::Direct,
        }
    }

    /// The expression reading this column from the `result` relation.
    pub fn projection_sql(&self, column: &str) -> String {
        match self.projection {
            Projection::Direct => format!("result.{column}"),
            Projection::DistinctCount => format!(
                "(SELECT count(DISTINCT distinct_value) FROM jsonb_path_query(result.{column}, '$[*][*]') AS distinct_value)"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOutput {
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    /// Aggregate helper relations, joined after all sources.
    pub helpers: Vec<FromItem>,
    /// Every column yields at most one row.
    pub single_row: bool,
}

impl SelectOutput {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

pub struct SelectClauseCompiler;

impl SelectClauseCompiler {
    pub fn compile(select: &SelectClause, ctx: &mut CompileContext<'_>) -> Result<SelectOutput> {
        let mut output = SelectOutput {
            distinct: select.distinct,
            columns: Vec::new(),
            helpers: Vec::new(),
            single_row: true,
        };

        match &select.columns {
            Selection::All => {
                for (i, source) in ctx.sources().iter().enumerate() {
                    let name = source.alias.clone().unwrap_or_else(|| format!("f{i}"));
                    output.columns.push(SelectColumn::new(name, source.data()));
                }
                output.single_row = false;
            }
            Selection::Columns(columns) if columns.is_empty() => {
                return Err(AqlError::UnsupportedSelectExpression(
                    "empty select list".into(),
                ));
            }
            Selection::Columns(columns) => {
                for (i, column) in columns.iter().enumerate() {
                    let name = column.alias.clone().unwrap_or_else(|| format!("f{i}"));
                    let (compiled, single_row) =
                        compile_column(&column.column, name, &mut output, ctx)?;
                    output.columns.push(compiled);
                    output.single_row &= single_row;
                }
            }
        }

        Ok(output)
    }
}

fn compile_column(
    column: &ColumnExpr,
    name: String,
    output: &mut SelectOutput,
    ctx: &mut CompileContext<'_>,
) -> Result<(SelectColumn, bool)> {
    match column {
        ColumnExpr::Primitive(primitive) => Ok((
            SelectColumn::new(name, primitive_sql(primitive, ValueMode::Native)),
            true,
        )),
        ColumnExpr::Path(path) => {
            let resolved = PathResolver::resolve(path, ctx)?;
            let expression = match ValueExtractor::strategy(&resolved) {
                Extraction::WholeDocument => resolved.source.data(),
                Extraction::Fast { cast } => ValueExtractor::fast_expression(&resolved, cast),
                Extraction::Slow => resolved.query(),
            };
            Ok((SelectColumn::new(name, expression), false))
        }
        ColumnExpr::Function(call) => Ok((
            SelectColumn::new(name, FunctionCompiler::compile(call, ctx)?),
            false,
        )),
        ColumnExpr::Aggregate(aggregate) => {
            let (kind, path) = match aggregate {
                AggregateFunctionCall::Count(CountArgument::Star) => {
                    return Ok((SelectColumn::new(name, "count(*)".to_string()), true));
                }
                AggregateFunctionCall::Count(CountArgument::Path(path)) => {
                    (AggregateKind::Count, path)
                }
                AggregateFunctionCall::Count(CountArgument::Distinct(path)) => {
                    (AggregateKind::CountDistinct, path)
                }
                AggregateFunctionCall::Min(path) => (AggregateKind::Min, path),
                AggregateFunctionCall::Max(path) => (AggregateKind::Max, path),
                AggregateFunctionCall::Sum(path) => (AggregateKind::Sum, path),
                AggregateFunctionCall::Avg(path) => (AggregateKind::Avg, path),
            };
            let (expression, projection) = compile_aggregate(kind, path, output, ctx)?;
            Ok((
                SelectColumn {
                    name,
                    expression,
                    projection,
                },
                true,
            ))
        }
    }
}

/// Fast-path casts with native `sum` and `avg`.
const SUMMABLE_CASTS: &[&str] = &["numeric", "bigint", "integer", "interval"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggregateKind {
    Count,
    CountDistinct,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateKind {
    fn name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::CountDistinct => "COUNT(DISTINCT)",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
        }
    }
}

fn compile_aggregate(
    kind: AggregateKind,
    path: &IdentifiedPath,
    output: &mut SelectOutput,
    ctx: &mut CompileContext<'_>,
) -> Result<(String, Projection)> {
    let resolved = PathResolver::resolve(path, ctx)?;
    let (rows, value, typed) = match ValueExtractor::strategy(&resolved) {
        Extraction::WholeDocument => return whole_document_aggregate(kind, &resolved),
        Extraction::Fast { cast }
            if matches!(kind, AggregateKind::Sum | AggregateKind::Avg)
                && !SUMMABLE_CASTS.contains(&cast) =>
        {
            return Err(AqlError::UnsupportedSelectExpression(format!(
                "{} over {} values of {}",
                kind.name(),
                cast,
                resolved.attribute_path()
            )));
        }
        Extraction::Fast { cast } => (
            format!("{} AS agg_value", resolved.query()),
            format!("CAST(agg_value #>> '{{}}' AS {cast})"),
            true,
        ),
        Extraction::Slow => (
            ValueExtractor::slow_rows(&resolved),
            ValueExtractor::slow_value(&resolved),
            false,
        ),
    };

    let helper = ctx.next_helper_alias();
    let v = "agg.value";
    let h = format!("{helper}.value");
    let numeric = if typed {
        v.to_string()
    } else {
        format!("CASE WHEN jsonb_typeof({v}) = 'number' THEN ({v} #>> '{{}}')::numeric END")
    };

    let (per_row, combined, projection) = match kind {
        AggregateKind::Count => (
            format!("count({v}) AS value"),
            format!("COALESCE(sum({h}), 0)"),
            Projection::Direct,
        ),
        AggregateKind::CountDistinct => (
            format!("jsonb_agg(DISTINCT to_jsonb({v})) FILTER (WHERE {v} IS NOT NULL) AS value"),
            format!("jsonb_agg({h}) FILTER (WHERE {h} IS NOT NULL)"),
            Projection::DistinctCount,
        ),
        AggregateKind::Min if typed => (
            format!("min({v}) AS value"),
            format!("min({h})"),
            Projection::Direct,
        ),
        AggregateKind::Max if typed => (
            format!("max({v}) AS value"),
            format!("max({h})"),
            Projection::Direct,
        ),
        AggregateKind::Min => (
            format!("{} AS value", ordered_first(v, "ASC")),
            ordered_first(&h, "ASC"),
            Projection::Direct,
        ),
        AggregateKind::Max => (
            format!("{} AS value", ordered_first(v, "DESC")),
            ordered_first(&h, "DESC"),
            Projection::Direct,
        ),
        AggregateKind::Sum => (
            format!("sum({numeric}) AS value"),
            format!("sum({h})"),
            Projection::Direct,
        ),
        AggregateKind::Avg => (
            format!("sum({numeric}) AS total, count({numeric}) AS n"),
            format!("sum({helper}.total) / NULLIF(sum({helper}.n), 0)"),
            Projection::Direct,
        ),
    };

    output.helpers.push(FromItem::Lateral {
        subquery: format!("SELECT {per_row} FROM (SELECT {value} AS value FROM {rows}) agg"),
        alias: helper,
    });
    Ok((combined, projection))
}

/// Smallest (ASC) or largest (DESC) non-null value, for types without
/// native `min`/`max`.
fn ordered_first(value: &str, direction: &str) -> String {
    format!(
        "(array_agg({value} ORDER BY {value} {direction}) FILTER (WHERE {value} IS NOT NULL))[1]"
    )
}

fn whole_document_aggregate(
    kind: AggregateKind,
    resolved: &ResolvedPath,
) -> Result<(String, Projection)> {
    let data = resolved.source.data();
    let expression = match kind {
        AggregateKind::Count => format!("count({data})"),
        AggregateKind::CountDistinct => format!("count(DISTINCT {data})"),
        AggregateKind::Min => ordered_first(&data, "ASC"),
        AggregateKind::Max => ordered_first(&data, "DESC"),
        AggregateKind::Sum | AggregateKind::Avg => {
            return Err(AqlError::UnsupportedSelectExpression(format!(
                "{} over a whole document",
                kind.name()
            )));
        }
    };
    Ok((expression, Projection::Direct))
}
