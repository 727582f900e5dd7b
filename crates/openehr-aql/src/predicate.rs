//! Node predicates (`[openEHR-EHR-OBSERVATION.bp.v1, 'Blood pressure']`)
//! compiled to SQL/JSON path filter conditions over the current item `@`.

use crate::ast::{NameOperand, NodePredicate, ObjectPath, PathPredicateOperand, Primitive};
use crate::error::{AqlError, Result};
use crate::params::{ParamValue, Parameters};
use crate::sql_builder::{JsonPath, json_path_string, numeric_literal};

pub struct NodePredicateCompiler;

impl NodePredicateCompiler {
    /// Compile a node predicate to a JSON path filter condition.
    ///
    /// Boolean combinations are parenthesized explicitly, so the result can be
    /// embedded in `? (...)` or combined with `&&` without precedence issues.
    pub fn compile(predicate: &NodePredicate, params: &Parameters) -> Result<String> {
        match predicate {
            NodePredicate::Archetype { archetype_id, name } => {
                node_id_filter(archetype_id, name.as_ref(), params)
            }
            NodePredicate::IdCode { code, name } | NodePredicate::AtCode { code, name } => {
                node_id_filter(code, name.as_ref(), params)
            }
            NodePredicate::Parameter { parameter, name } => {
                let node_id = params.get_string(parameter)?;
                node_id_filter(node_id, name.as_ref(), params)
            }
            NodePredicate::Comparison { path, op, operand } => Ok(format!(
                "{} {} {}",
                relative_path(path, params)?,
                op.as_json_path(),
                compile_operand(operand, params)?
            )),
            NodePredicate::Matches { .. } => Err(AqlError::unsupported_feature(
                "MATCHES inside node predicates",
            )),
            NodePredicate::And(left, right) => Ok(format!(
                "({}) && ({})",
                Self::compile(left, params)?,
                Self::compile(right, params)?
            )),
            NodePredicate::Or(left, right) => Ok(format!(
                "({}) || ({})",
                Self::compile(left, params)?,
                Self::compile(right, params)?
            )),
        }
    }
}

fn node_id_filter(
    node_id: &str,
    name: Option<&NameOperand>,
    params: &Parameters,
) -> Result<String> {
    let mut filter = format!("@.archetype_node_id == {}", json_path_string(node_id));
    if let Some(name) = name {
        filter.push_str(" && ");
        filter.push_str(&name_filter(name, params)?);
    }
    Ok(filter)
}

fn name_filter(name: &NameOperand, params: &Parameters) -> Result<String> {
    match name {
        NameOperand::String(value) => Ok(format!("@.name.value == {}", json_path_string(value))),
        NameOperand::Parameter(parameter) => Ok(format!(
            "@.name.value == {}",
            json_path_string(params.get_string(parameter)?)
        )),
        NameOperand::AtCode(code) | NameOperand::IdCode(code) => Ok(format!(
            "@.name.defining_code.code_string == {}",
            json_path_string(code)
        )),
        NameOperand::TermCode(term) => {
            let (terminology, code) = term
                .split_once("::")
                .filter(|(t, c)| !t.is_empty() && !c.is_empty())
                .ok_or_else(|| AqlError::InvalidTermCodeFormat(term.clone()))?;
            Ok(format!(
                "@.name.defining_code.terminology_id.value == {} && @.name.defining_code.code_string == {}",
                json_path_string(terminology),
                json_path_string(code)
            ))
        }
    }
}

/// An object path relative to the filtered item, e.g. `@.name.value`.
///
/// Nested predicates become nested filters.
fn relative_path(path: &ObjectPath, params: &Parameters) -> Result<String> {
    if path.is_empty() {
        return Err(AqlError::UnsupportedNodePredicate(
            "comparison without an object path".into(),
        ));
    }
    let mut json_path = JsonPath::root();
    for segment in path {
        json_path = json_path.member(&segment.identifier);
        if let Some(predicate) = &segment.predicate {
            json_path = json_path.filter(&NodePredicateCompiler::compile(predicate, params)?);
        }
    }
    Ok(json_path.to_relative_string())
}

fn compile_operand(operand: &PathPredicateOperand, params: &Parameters) -> Result<String> {
    match operand {
        PathPredicateOperand::Primitive(primitive) => Ok(primitive_json_path(primitive)),
        PathPredicateOperand::Path(path) => relative_path(path, params),
        PathPredicateOperand::Parameter(name) => Ok(param_json_path(params.get(name)?)),
        PathPredicateOperand::IdCode(code) | PathPredicateOperand::AtCode(code) => {
            Ok(json_path_string(code))
        }
    }
}

/// A primitive as a SQL/JSON path literal.
pub(crate) fn primitive_json_path(primitive: &Primitive) -> String {
    match primitive {
        Primitive::String(s)
        | Primitive::Date(s)
        | Primitive::Time(s)
        | Primitive::DateTime(s) => json_path_string(s),
        Primitive::Integer(i) => i.to_string(),
        Primitive::Real(r) if r.is_finite() => numeric_literal(*r),
        Primitive::Real(_) | Primitive::Null => "null".to_string(),
        Primitive::Boolean(b) => b.to_string(),
    }
}

fn param_json_path(value: &ParamValue) -> String {
    match value {
        ParamValue::String(s) => json_path_string(s),
        ParamValue::Integer(i) => i.to_string(),
        ParamValue::Number(n) if n.is_finite() => numeric_literal(*n),
        ParamValue::Number(_) => "null".to_string(),
        ParamValue::Boolean(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ComparisonOperator, PathSegment};

    fn compile(predicate: &NodePredicate) -> Result<String> {
        NodePredicateCompiler::compile(predicate, &Parameters::new())
    }

    #[test]
    fn test_archetype_predicate() {
        let predicate = NodePredicate::archetype("openEHR-EHR-OBSERVATION.bp.v1");
        assert_eq!(
            compile(&predicate).unwrap(),
            "@.archetype_node_id == \"openEHR-EHR-OBSERVATION.bp.v1\""
        );
    }

    #[test]
    fn test_archetype_with_name() {
        let predicate = NodePredicate::archetype_named(
            "archetype_id_1",
            NameOperand::String("name-value".into()),
        );
        assert_eq!(
            compile(&predicate).unwrap(),
            "@.archetype_node_id == \"archetype_id_1\" && @.name.value == \"name-value\""
        );
    }

    #[test]
    fn test_at_code_with_coded_name() {
        let predicate = NodePredicate::AtCode {
            code: "at0001".into(),
            name: Some(NameOperand::AtCode("at0002".into())),
        };
        assert_eq!(
            compile(&predicate).unwrap(),
            "@.archetype_node_id == \"at0001\" && @.name.defining_code.code_string == \"at0002\""
        );
    }

    #[test]
    fn test_term_code_name() {
        let predicate = NodePredicate::AtCode {
            code: "at0001".into(),
            name: Some(NameOperand::TermCode("SNOMED-CT::12345".into())),
        };
        let filter = compile(&predicate).unwrap();
        assert!(filter.contains("@.name.defining_code.terminology_id.value == \"SNOMED-CT\""));
        assert!(filter.contains("@.name.defining_code.code_string == \"12345\""));
    }

    #[test]
    fn test_invalid_term_code() {
        let predicate = NodePredicate::AtCode {
            code: "at0001".into(),
            name: Some(NameOperand::TermCode("SNOMED-CT:12345".into())),
        };
        assert_eq!(
            compile(&predicate).unwrap_err(),
            AqlError::InvalidTermCodeFormat("SNOMED-CT:12345".into())
        );
    }

    #[test]
    fn test_parameter_node_id() {
        let params = Parameters::new().with("archetype", "openEHR-EHR-COMPOSITION.report.v1");
        let predicate = NodePredicate::Parameter {
            parameter: "archetype".into(),
            name: Some(NameOperand::Parameter("$name".into())),
        };
        assert_eq!(
            NodePredicateCompiler::compile(&predicate, &params).unwrap_err(),
            AqlError::MissingParameter("name".into())
        );

        let params = params.with("name", "Report");
        assert_eq!(
            NodePredicateCompiler::compile(&predicate, &params).unwrap(),
            "@.archetype_node_id == \"openEHR-EHR-COMPOSITION.report.v1\" && @.name.value == \"Report\""
        );
    }

    #[test]
    fn test_comparison_and_boolean_combination() {
        let predicate = NodePredicate::or(
            NodePredicate::Comparison {
                path: vec![PathSegment::new("name"), PathSegment::new("value")],
                op: ComparisonOperator::Eq,
                operand: PathPredicateOperand::Primitive(Primitive::String("a".into())),
            },
            NodePredicate::and(
                NodePredicate::at_code("at0001"),
                NodePredicate::Comparison {
                    path: vec![PathSegment::new("value"), PathSegment::new("magnitude")],
                    op: ComparisonOperator::Gt,
                    operand: PathPredicateOperand::Primitive(Primitive::Integer(5)),
                },
            ),
        );
        assert_eq!(
            compile(&predicate).unwrap(),
            "(@.name.value == \"a\") || ((@.archetype_node_id == \"at0001\") && (@.value.magnitude > 5))"
        );
    }

    #[test]
    fn test_matches_predicate_is_unsupported() {
        let predicate = NodePredicate::Matches {
            path: vec![PathSegment::new("name")],
            pattern: "{/a.*/}".into(),
        };
        assert!(matches!(
            compile(&predicate),
            Err(AqlError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_comparison_requires_path() {
        let predicate = NodePredicate::Comparison {
            path: vec![],
            op: ComparisonOperator::Eq,
            operand: PathPredicateOperand::AtCode("at0001".into()),
        };
        assert!(matches!(
            compile(&predicate),
            Err(AqlError::UnsupportedNodePredicate(_))
        ));
    }
}
