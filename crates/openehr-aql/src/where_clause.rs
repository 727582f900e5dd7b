//! WHERE clause compilation.

use crate::ast::{
    ComparisonLeft, ComparisonOperator, IdentifiedPath, LikeOperand, MatchesOperand, MatchesValue,
    Primitive, Terminal, WhereExpr,
};
use crate::context::CompileContext;
use crate::error::{AqlError, Result};
use crate::functions::FunctionCompiler;
use crate::params::ParamValue;
use crate::path::PathResolver;
use crate::sql_builder::{SqlCondition, quote_literal};
use crate::value::{Extraction, ValueExtractor, ValueMode, terminal_sql};

pub struct WhereClauseCompiler;

impl WhereClauseCompiler {
    /// Compile the WHERE expression and conjoin the FROM clause predicate.
    pub fn compile(
        expr: Option<&WhereExpr>,
        from_predicate: SqlCondition,
        ctx: &CompileContext<'_>,
    ) -> Result<SqlCondition> {
        match expr {
            Some(expr) => Ok(SqlCondition::and(compile_expr(expr, ctx)?, from_predicate)),
            None => Ok(from_predicate),
        }
    }
}

fn compile_expr(expr: &WhereExpr, ctx: &CompileContext<'_>) -> Result<SqlCondition> {
    match expr {
        WhereExpr::And(left, right) => Ok(SqlCondition::and(
            compile_expr(left, ctx)?,
            compile_expr(right, ctx)?,
        )),
        WhereExpr::Or(left, right) => Ok(SqlCondition::or(
            compile_expr(left, ctx)?,
            compile_expr(right, ctx)?,
        )),
        WhereExpr::Not(inner) => Ok(SqlCondition::negate(compile_expr(inner, ctx)?)),
        WhereExpr::Parenthesized(inner) => compile_expr(inner, ctx),
        WhereExpr::Exists(path) => {
            Ok(SqlCondition::raw(PathResolver::resolve(path, ctx)?.exists()))
        }
        WhereExpr::Comparison { left, op, right } => compile_comparison(left, *op, right, ctx),
        WhereExpr::Like { path, pattern } => compile_like(path, pattern, ctx),
        WhereExpr::Matches { path, operand } => compile_matches(path, operand, ctx),
    }
}

fn compile_comparison(
    left: &ComparisonLeft,
    op: ComparisonOperator,
    right: &Terminal,
    ctx: &CompileContext<'_>,
) -> Result<SqlCondition> {
    let op_sql = op.as_sql();
    let path = match left {
        ComparisonLeft::Function(call) => {
            let function = FunctionCompiler::compile(call, ctx)?;
            let mode =
                FunctionCompiler::result_type(call).map_or(ValueMode::Native, ValueMode::Cast);
            let value = terminal_sql(right, mode, ctx)?;
            return Ok(SqlCondition::raw(format!("{function} {op_sql} {value}")));
        }
        ComparisonLeft::Path(path) => path,
    };

    let resolved = PathResolver::resolve(path, ctx)?;
    let sql = match ValueExtractor::strategy(&resolved) {
        Extraction::WholeDocument => format!(
            "{} {op_sql} {}",
            resolved.source.data(),
            terminal_sql(right, ValueMode::Jsonb, ctx)?
        ),
        Extraction::Fast { cast } => format!(
            "{} {op_sql} {}",
            ValueExtractor::fast_expression(&resolved, cast),
            terminal_sql(right, ValueMode::Cast(cast), ctx)?
        ),
        Extraction::Slow => format!(
            "EXISTS (SELECT 1 FROM {} WHERE ({}) {op_sql} {})",
            ValueExtractor::slow_rows(&resolved),
            ValueExtractor::slow_value(&resolved),
            terminal_sql(right, ValueMode::Jsonb, ctx)?
        ),
    };
    Ok(SqlCondition::raw(sql))
}

fn compile_like(
    path: &IdentifiedPath,
    pattern: &LikeOperand,
    ctx: &CompileContext<'_>,
) -> Result<SqlCondition> {
    let pattern = match pattern {
        LikeOperand::String(s) => s.as_str(),
        LikeOperand::Parameter(name) => ctx.params.get_string(name)?,
    };
    let pattern = quote_literal(&translate_like_pattern(pattern));

    let resolved = PathResolver::resolve(path, ctx)?;
    let sql = if resolved.is_whole_document() {
        format!("{} #>> '{{}}' LIKE {pattern}", resolved.source.data())
    } else {
        format!(
            "EXISTS (SELECT 1 FROM {} AS like_value WHERE like_value #>> '{{}}' LIKE {pattern})",
            resolved.query()
        )
    };
    Ok(SqlCondition::raw(sql))
}

/// Translate AQL wildcards (`?`, `*`) to SQL LIKE wildcards (`_`, `%`).
///
/// Literal `%` and `_` are escaped; `\?`, `\*` and `\\` stand for the
/// literal characters.
pub fn translate_like_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') | None => out.push_str("\\\\"),
                Some(escaped) => push_literal(&mut out, escaped),
            },
            '?' => out.push('_'),
            '*' => out.push('%'),
            other => push_literal(&mut out, other),
        }
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if matches!(c, '%' | '_' | '\\') {
        out.push('\\');
    }
    out.push(c);
}

fn compile_matches(
    path: &IdentifiedPath,
    operand: &MatchesOperand,
    ctx: &CompileContext<'_>,
) -> Result<SqlCondition> {
    let values = match operand {
        MatchesOperand::ValueList(values) => values,
        MatchesOperand::Terminology(_) => {
            return Err(AqlError::unsupported_feature("MATCHES with TERMINOLOGY()"));
        }
        MatchesOperand::Uri(_) => return Err(AqlError::unsupported_feature("MATCHES with URI")),
    };
    if values.is_empty() {
        return Err(AqlError::UnsupportedWhereExpression(
            "MATCHES with an empty value list".into(),
        ));
    }

    let list = values
        .iter()
        .map(|value| match value {
            MatchesValue::Primitive(primitive) => Ok(primitive_json(primitive)),
            MatchesValue::Parameter(name) => Ok(param_json(ctx.params.get(name)?)),
        })
        .collect::<Result<Vec<_>>>()?;
    let list = quote_literal(&serde_json::Value::Array(list).to_string());

    let resolved = PathResolver::resolve(path, ctx)?;
    let sql = if resolved.is_whole_document() {
        format!(
            "{list}::jsonb @> jsonb_build_array({})",
            resolved.source.data()
        )
    } else {
        format!(
            "EXISTS (SELECT 1 FROM {} AS match_value WHERE {list}::jsonb @> jsonb_build_array(match_value))",
            resolved.query()
        )
    };
    Ok(SqlCondition::raw(sql))
}

fn primitive_json(primitive: &Primitive) -> serde_json::Value {
    match primitive {
        Primitive::String(s)
        | Primitive::Date(s)
        | Primitive::Time(s)
        | Primitive::DateTime(s) => serde_json::Value::from(s.as_str()),
        Primitive::Integer(i) => serde_json::Value::from(*i),
        Primitive::Real(r) => serde_json::Number::from_f64(*r)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Primitive::Boolean(b) => serde_json::Value::Bool(*b),
        Primitive::Null => serde_json::Value::Null,
    }
}

fn param_json(value: &ParamValue) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
