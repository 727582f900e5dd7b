//! Query compiler façade.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::ast::Query;
use crate::config::AqlSettings;
use crate::context::CompileContext;
use crate::error::{AqlError, Result};
use crate::from_clause::FromClauseCompiler;
use crate::limit::LimitOffsetCompiler;
use crate::params::Parameters;
use crate::select::SelectClauseCompiler;
use crate::sql_builder::{SqlCondition, render_from};
use crate::where_clause::WhereClauseCompiler;

/// A compiled query.
///
/// Executing `sql` yields one `jsonb` array per row; element `i` belongs to
/// `column_names[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub column_names: Vec<String>,
}

impl CompiledQuery {
    /// Re-attach column names to one positional result row.
    ///
    /// Anything other than an array yields an empty map.
    pub fn zip_row(&self, row: &Value) -> Map<String, Value> {
        let mut map = Map::new();
        if let Value::Array(values) = row {
            for (name, value) in self.column_names.iter().zip(values) {
                map.insert(name.clone(), value.clone());
            }
        }
        map
    }
}

/// Compiles AQL syntax trees to PostgreSQL.
///
/// The compiler holds only its settings; every call works on its own
/// [`CompileContext`], so one instance can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    settings: AqlSettings,
}

impl QueryCompiler {
    pub fn new(settings: AqlSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &AqlSettings {
        &self.settings
    }

    /// Compile a query: FROM, then WHERE, then SELECT, then LIMIT/OFFSET.
    ///
    /// The first error aborts compilation and is returned unchanged.
    #[instrument(skip_all, fields(sources = tracing::field::Empty))]
    pub fn compile(&self, query: &Query, params: &Parameters) -> Result<CompiledQuery> {
        let mut ctx = CompileContext::new(&self.settings, params);

        let from = FromClauseCompiler::compile(&query.from, &mut ctx)?;
        let condition =
            WhereClauseCompiler::compile(query.where_clause.as_ref(), from.predicate, &ctx)?;
        let select = SelectClauseCompiler::compile(&query.select, &mut ctx)?;
        if !query.order_by.is_empty() {
            return Err(AqlError::unsupported_feature("ORDER BY"));
        }
        let limit = LimitOffsetCompiler::compile(query.limit.as_ref(), select.single_row, params)?;

        tracing::Span::current().record("sources", ctx.sources().len());

        let columns = select
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} AS c{i}", column.expression))
            .collect::<Vec<_>>()
            .join(", ");
        let projections = select
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| column.projection_sql(&format!("c{i}")))
            .collect::<Vec<_>>()
            .join(", ");

        let mut items = from.items;
        items.extend(select.helpers.iter().cloned());

        let mut inner = String::from("SELECT ");
        if select.distinct {
            inner.push_str("DISTINCT ");
        }
        inner.push_str(&columns);
        inner.push(' ');
        inner.push_str(&render_from(&items));
        if condition != SqlCondition::True {
            inner.push_str(" WHERE ");
            inner.push_str(&condition.to_sql());
        }

        let sql = format!(
            "SELECT jsonb_build_array({projections}) FROM (SELECT * FROM ({inner}) dataset{limit}) AS result"
        );

        if self.settings.log_sql {
            debug!(sql = %sql, "compiled AQL query");
        } else {
            debug!(
                columns = select.columns.len(),
                single_row = select.single_row,
                "compiled AQL query"
            );
        }

        Ok(CompiledQuery {
            sql,
            column_names: select.column_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassExpression, ContainsExpr, IdentifiedPath, OrderByExpr, SelectClause};
    use serde_json::json;

    fn ehr_query() -> Query {
        Query::new(
            SelectClause::all(),
            ContainsExpr::class(ClassExpression::new("EHR").alias("e")),
        )
    }

    #[test]
    fn test_final_assembly() {
        let compiled = QueryCompiler::default()
            .compile(&ehr_query(), &Parameters::new())
            .unwrap();
        assert!(compiled.sql.starts_with(
            "SELECT jsonb_build_array(result.c0) FROM (SELECT * FROM (SELECT source_0.data AS c0 FROM (SELECT"
        ));
        assert!(compiled.sql.ends_with(
            ") source_0 WHERE source_0.data IS NOT NULL) dataset) AS result"
        ));
        assert_eq!(compiled.column_names, vec!["e"]);
    }

    #[test]
    fn test_distinct() {
        let mut query = ehr_query();
        query.select = SelectClause::all().distinct();
        let compiled = QueryCompiler::default()
            .compile(&query, &Parameters::new())
            .unwrap();
        assert!(compiled.sql.contains("(SELECT DISTINCT source_0.data AS c0 "));
    }

    #[test]
    fn test_order_by_is_unsupported() {
        let query = ehr_query().with_order_by(OrderByExpr {
            path: IdentifiedPath::with_path("e", "time_created/value"),
            descending: true,
        });
        assert_eq!(
            QueryCompiler::default()
                .compile(&query, &Parameters::new())
                .unwrap_err(),
            AqlError::UnsupportedFeature("ORDER BY".into())
        );
    }

    #[test]
    fn test_invalid_settings() {
        assert!(QueryCompiler::new(AqlSettings::default().with_schema("x;y")).is_err());
    }

    #[test]
    fn test_custom_schema() {
        let compiler = QueryCompiler::new(AqlSettings::default().with_schema("ehrbase")).unwrap();
        let compiled = compiler.compile(&ehr_query(), &Parameters::new()).unwrap();
        assert!(compiled.sql.contains("FROM \"ehrbase\".ehr e"));
    }

    #[test]
    fn test_zip_row() {
        let compiled = CompiledQuery {
            sql: String::new(),
            column_names: vec!["id".into(), "name".into()],
        };
        let row = compiled.zip_row(&json!(["abc", {"value": "x"}]));
        assert_eq!(row.get("id"), Some(&json!("abc")));
        assert_eq!(row.get("name"), Some(&json!({"value": "x"})));
        assert!(compiled.zip_row(&json!({"not": "an array"})).is_empty());
    }
}
