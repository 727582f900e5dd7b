//! FROM clause compilation.
//!
//! The CONTAINS tree is walked depth-first. Each class operand becomes one
//! [`Source`]; the first one is the base relation and every other one is a
//! lateral subquery that joins itself to its parent. Classes without
//! dedicated storage are found by searching the parent document with
//! `JSON_TABLE`, and everything below such a class is searched the same way.

use tracing::{debug, trace};

use crate::ast::{ClassExpression, ClassPredicate, Containment, ContainsExpr};
use crate::context::{CompileContext, Source};
use crate::error::{AqlError, Result};
use crate::model::ModelTypeResolver;
use crate::predicate::NodePredicateCompiler;
use crate::sql_builder::{FromItem, JsonPath, SqlCondition, escape_identifier, json_path_string};
use crate::tables::{self, TableOptions};

/// Compiled FROM clause: relations plus the predicate that ties them together.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub items: Vec<FromItem>,
    /// `source_<n>.data IS NOT NULL` per source, combined along the tree.
    pub predicate: SqlCondition,
}

impl FromClause {
    fn merge(
        mut self,
        other: FromClause,
        combine: fn(SqlCondition, SqlCondition) -> SqlCondition,
    ) -> Self {
        self.items.extend(other.items);
        self.predicate = combine(self.predicate, other.predicate);
        self
    }
}

pub struct FromClauseCompiler;

impl FromClauseCompiler {
    /// Compile a CONTAINS tree, registering its sources in `ctx`.
    pub fn compile(expr: &ContainsExpr, ctx: &mut CompileContext<'_>) -> Result<FromClause> {
        compile_expr(expr, None, false, ctx)
    }
}

fn compile_expr(
    expr: &ContainsExpr,
    parent: Option<&Source>,
    search_in_model: bool,
    ctx: &mut CompileContext<'_>,
) -> Result<FromClause> {
    match expr {
        ContainsExpr::Class { class, contains } => {
            compile_class(class, contains.as_deref(), parent, search_in_model, ctx)
        }
        ContainsExpr::And(left, right) => {
            let left = compile_expr(left, parent, search_in_model, ctx)?;
            let right = compile_expr(right, parent, search_in_model, ctx)?;
            Ok(left.merge(right, SqlCondition::and))
        }
        ContainsExpr::Or(left, right) => {
            let left = compile_expr(left, parent, search_in_model, ctx)?;
            let right = compile_expr(right, parent, search_in_model, ctx)?;
            Ok(left.merge(right, SqlCondition::or))
        }
        ContainsExpr::Parenthesized(inner) => compile_expr(inner, parent, search_in_model, ctx),
    }
}

fn compile_class(
    class: &ClassExpression,
    containment: Option<&Containment>,
    parent: Option<&Source>,
    search_in_model: bool,
    ctx: &mut CompileContext<'_>,
) -> Result<FromClause> {
    let source = ctx.add_source(&class.model, class.alias.as_deref())?;

    let (filter, all_versions) = match &class.predicate {
        Some(ClassPredicate::Node(predicate)) => {
            (Some(NodePredicateCompiler::compile(predicate, ctx.params)?), false)
        }
        Some(ClassPredicate::AllVersions) => (None, true),
        Some(ClassPredicate::LatestVersion) | None => (None, false),
    };

    let dedicated = if search_in_model {
        None
    } else {
        dedicated_expression(&class.model, parent, filter.as_deref(), all_versions, ctx)?
    };

    let (subquery, search_children) = match (dedicated, parent) {
        (Some(subquery), _) => {
            trace!(model = %class.model, table = %source.table, "dedicated source");
            (subquery, false)
        }
        (None, Some(parent)) => {
            debug!(
                model = %class.model,
                parent = %parent.model,
                table = %source.table,
                "no dedicated join, searching parent document"
            );
            (model_search(&class.model, parent, filter.as_deref()), true)
        }
        (None, None) => return Err(AqlError::UnsupportedFromOperand(class.model.clone())),
    };

    let item = match parent {
        Some(_) => FromItem::Lateral {
            subquery,
            alias: source.table.clone(),
        },
        None => FromItem::Base {
            subquery,
            alias: source.table.clone(),
        },
    };
    let clause = FromClause {
        items: vec![item],
        predicate: SqlCondition::raw(format!("{} IS NOT NULL", source.data())),
    };

    match containment {
        Some(containment) => {
            if containment.negated {
                debug!(model = %class.model, "NOT CONTAINS compiled as CONTAINS");
            }
            let children = compile_expr(&containment.expr, Some(&source), search_children, ctx)?;
            Ok(clause.merge(children, SqlCondition::and))
        }
        None => Ok(clause),
    }
}

/// Dedicated table expression, or `None` when the class has no dedicated
/// storage or cannot be joined under `parent`.
fn dedicated_expression(
    model: &str,
    parent: Option<&Source>,
    filter: Option<&str>,
    all_versions: bool,
    ctx: &CompileContext<'_>,
) -> Result<Option<String>> {
    let Some(strategy) = tables::dedicated(model) else {
        return Ok(None);
    };
    let parent = match parent {
        Some(parent) => match strategy.join_key(&parent.model) {
            Some(key) => Some((key, parent)),
            None => return Ok(None),
        },
        None => None,
    };
    let schema = escape_identifier(&ctx.settings.schema)?;
    Ok(Some(strategy.table_expression(
        &schema,
        &TableOptions {
            parent,
            filter,
            all_versions,
        },
    )))
}

/// Every node of `model` (or a subtype) nested in the parent document.
fn model_search(model: &str, parent: &Source, filter: Option<&str>) -> String {
    let types = ModelTypeResolver::closure(model)
        .iter()
        .map(|t| format!("@._type == {}", json_path_string(t)))
        .collect::<Vec<_>>()
        .join(" || ");
    let condition = match filter {
        Some(filter) => format!("({types}) && ({filter})"),
        None => types,
    };
    let rows = JsonPath::root().descendants().filter(&condition);
    format!(
        "SELECT jt.data FROM JSON_TABLE({}, {} COLUMNS (data jsonb PATH '$')) jt",
        parent.data(),
        rows.to_strict_sql()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodePredicate;
    use crate::config::AqlSettings;
    use crate::params::Parameters;
    use crate::sql_builder::render_from;

    fn class(model: &str, alias: &str) -> ContainsExpr {
        ContainsExpr::class(ClassExpression::new(model).alias(alias))
    }

    fn compile(expr: &ContainsExpr) -> Result<(FromClause, Vec<Source>)> {
        let settings = AqlSettings::default();
        let params = Parameters::new();
        let mut ctx = CompileContext::new(&settings, &params);
        let clause = FromClauseCompiler::compile(expr, &mut ctx)?;
        Ok((clause, ctx.sources().to_vec()))
    }

    #[test]
    fn test_single_source() {
        let (clause, sources) = compile(&class("EHR", "e")).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(clause.items.len(), 1);
        let sql = render_from(&clause.items);
        assert!(sql.starts_with("FROM (SELECT e.id::text AS id"));
        assert!(sql.ends_with("FROM \"openehr\".ehr e) source_0"));
        assert_eq!(clause.predicate.to_sql(), "source_0.data IS NOT NULL");
    }

    #[test]
    fn test_nested_dedicated_sources() {
        let expr = class("EHR", "e").contains(class("COMPOSITION", "c"));
        let (clause, sources) = compile(&expr).unwrap();
        assert_eq!(sources[1].table, "source_1");
        assert_eq!(sources[1].alias.as_deref(), Some("c"));
        let sql = render_from(&clause.items);
        assert!(sql.contains("LEFT JOIN LATERAL (SELECT DISTINCT ON (ov.versioned_object_id)"));
        assert!(sql.contains("ov.ehr_id = source_0.ehr_id"));
        assert!(sql.ends_with(") source_1 ON true"));
        assert_eq!(
            clause.predicate.to_sql(),
            "(source_0.data IS NOT NULL) AND (source_1.data IS NOT NULL)"
        );
    }

    #[test]
    fn test_generic_search_under_composition() {
        let expr = class("COMPOSITION", "c").contains(
            ContainsExpr::class(ClassExpression::new("ENTRY").alias("en"))
                .contains(class("ELEMENT", "el")),
        );
        let (clause, _) = compile(&expr).unwrap();
        let sql = render_from(&clause.items);
        assert!(sql.contains("JSON_TABLE(source_0.data, 'strict $.**{1 to last} ? (@._type == \"ENTRY\" || @._type == \"ADMIN_ENTRY\""));
        assert!(sql.contains("@._type == \"OBSERVATION\""));
        assert!(sql.contains("JSON_TABLE(source_1.data, 'strict $.**{1 to last} ? (@._type == \"ELEMENT\")'"));
    }

    #[test]
    fn test_dedicated_class_below_generic_is_searched() {
        let expr = class("EHR", "e").contains(
            class("CLUSTER", "cl").contains(class("COMPOSITION", "c")),
        );
        let (clause, _) = compile(&expr).unwrap();
        match &clause.items[2] {
            FromItem::Lateral { subquery, .. } => {
                assert!(subquery.contains("JSON_TABLE(source_1.data"));
                assert!(subquery.contains("@._type == \"COMPOSITION\""));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_class_predicate_on_generic_source() {
        let expr = class("COMPOSITION", "c").contains(ContainsExpr::class(
            ClassExpression::new("OBSERVATION")
                .alias("o")
                .predicate(ClassPredicate::Node(NodePredicate::archetype(
                    "openEHR-EHR-OBSERVATION.bp.v1",
                ))),
        ));
        let (clause, _) = compile(&expr).unwrap();
        let sql = render_from(&clause.items);
        assert!(sql.contains(
            "? ((@._type == \"OBSERVATION\") && (@.archetype_node_id == \"openEHR-EHR-OBSERVATION.bp.v1\"))"
        ));
    }

    #[test]
    fn test_all_versions() {
        let expr = ContainsExpr::class(
            ClassExpression::new("COMPOSITION")
                .alias("c")
                .predicate(ClassPredicate::AllVersions),
        );
        let (clause, _) = compile(&expr).unwrap();
        assert!(!render_from(&clause.items).contains("DISTINCT ON"));
    }

    #[test]
    fn test_or_combines_predicates() {
        let expr = class("EHR", "e").contains(ContainsExpr::or(
            class("COMPOSITION", "c1"),
            class("EHR_STATUS", "s"),
        ));
        let (clause, sources) = compile(&expr).unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(
            clause.predicate.to_sql(),
            "(source_0.data IS NOT NULL) AND ((source_1.data IS NOT NULL) OR (source_2.data IS NOT NULL))"
        );
    }

    #[test]
    fn test_duplicate_alias() {
        let expr = class("EHR", "e").contains(ContainsExpr::and(
            class("COMPOSITION", "c"),
            class("EHR_STATUS", "c"),
        ));
        assert_eq!(
            compile(&expr).unwrap_err(),
            AqlError::DuplicateAlias("c".into())
        );
    }

    #[test]
    fn test_unsupported_root() {
        assert_eq!(
            compile(&class("OBSERVATION", "o")).unwrap_err(),
            AqlError::UnsupportedFromOperand("OBSERVATION".into())
        );
    }

    #[test]
    fn test_not_contains_compiles_like_contains() {
        let plain = class("EHR", "e").contains(class("COMPOSITION", "c"));
        let negated = class("EHR", "e").not_contains(class("COMPOSITION", "c"));
        assert_eq!(compile(&plain).unwrap().0, compile(&negated).unwrap().0);
    }
}
