//! Extraction of comparable values from JSON documents.
//!
//! A path over a data value class with a known static layout (for example
//! `magnitude` of a `DV_QUANTITY` source) is read with a typed cast, which
//! lets PostgreSQL compare and aggregate natively. Every other path goes
//! through the slow path: the node is unnested with `jsonb_path_query` and a
//! `CASE` over its `_type` picks the comparable member as `jsonb`.

use crate::ast::{Primitive, Terminal};
use crate::context::CompileContext;
use crate::error::Result;
use crate::functions::FunctionCompiler;
use crate::model::ModelTypeResolver;
use crate::params::ParamValue;
use crate::path::{PathResolver, ResolvedPath};
use crate::sql_builder::{numeric_literal, quote_literal};

/// Attribute paths readable with a typed cast, per data value class.
const FAST_PATHS: &[(&str, &[(&str, &str)])] = &[
    ("DV_DATE_TIME", &[("value", "timestamptz")]),
    ("DV_DATE", &[("value", "date")]),
    ("DV_TIME", &[("value", "time")]),
    ("DV_DURATION", &[("value", "interval")]),
    ("DV_ORDINAL", &[("value", "integer")]),
    ("DV_COUNT", &[("magnitude", "bigint")]),
    ("DV_QUANTITY", &[("magnitude", "numeric"), ("units", "text")]),
    (
        "DV_PROPORTION",
        &[("numerator", "numeric"), ("denominator", "numeric")],
    ),
    ("DV_SCALE", &[("value", "numeric")]),
];

/// Classes whose comparable member is `value`.
const VALUE_MEMBER: &[&str] = &[
    "DV_DATE_TIME",
    "DV_DATE",
    "DV_TIME",
    "DV_DURATION",
    "DV_ORDINAL",
    "DV_SCALE",
    "DV_TEXT",
    "DV_CODED_TEXT",
    "DV_BOOLEAN",
];

/// Classes whose comparable member is `magnitude`.
const MAGNITUDE_MEMBER: &[&str] = &["DV_QUANTITY", "DV_COUNT"];

const TEMPORAL: &[&str] = &["DV_DATE_TIME", "DV_DATE", "DV_TIME", "DV_DURATION"];

/// How a resolved path is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// No segments: the source document itself.
    WholeDocument,
    /// A typed cast of the first value at the path.
    Fast { cast: &'static str },
    /// Unnest and dispatch on `_type`, yielding `jsonb`.
    Slow,
}

/// How a terminal operand is rendered next to an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Cast to the given SQL type.
    Cast(&'static str),
    /// As a `jsonb` value.
    Jsonb,
    /// As a plain SQL literal; paths are read as text.
    Native,
}

pub struct ValueExtractor;

impl ValueExtractor {
    pub fn strategy(resolved: &ResolvedPath) -> Extraction {
        if resolved.is_whole_document() {
            return Extraction::WholeDocument;
        }
        if resolved.plain
            && let Some(cast) = fast_cast(&resolved.source.model, &resolved.attribute_path())
        {
            return Extraction::Fast { cast };
        }
        Extraction::Slow
    }

    /// `CAST(<first value> #>> '{}' AS <type>)`
    pub fn fast_expression(resolved: &ResolvedPath, cast: &str) -> String {
        format!("CAST({} #>> '{{}}' AS {cast})", resolved.query_first())
    }

    /// FROM items unnesting the path; the value node is bound to `slow_value`.
    pub fn slow_rows(resolved: &ResolvedPath) -> String {
        match &resolved.terminal {
            Some(terminal) => format!(
                "jsonb_path_query({}, {}) AS slow_parent CROSS JOIN LATERAL jsonb_path_query(slow_parent, {}) AS slow_value",
                resolved.source.data(),
                resolved.parent.to_sql(),
                terminal.path.to_sql()
            ),
            None => format!("{} AS slow_value", resolved.query()),
        }
    }

    /// The comparable `jsonb` value of `slow_value`.
    ///
    /// A terminal `value` segment directly under a temporal class holds the
    /// bare ISO string, which is returned as is.
    pub fn slow_value(resolved: &ResolvedPath) -> String {
        let mut branches = Vec::new();
        if resolved
            .terminal
            .as_ref()
            .is_some_and(|t| t.identifier == "value")
        {
            branches.push(format!(
                "WHEN jsonb_typeof(slow_value) <> 'object' AND slow_parent ->> '_type' IN ({}) THEN slow_value",
                sql_list(TEMPORAL)
            ));
        }
        branches.extend(family_branches("slow_value"));
        branches.push(format!(
            "WHEN slow_value ->> '_type' = 'ELEMENT' THEN CASE {} ELSE slow_value -> 'value' END",
            family_branches("(slow_value -> 'value')").join(" ")
        ));
        format!("CASE {} ELSE slow_value END", branches.join(" "))
    }
}

fn fast_cast(model: &str, attribute_path: &str) -> Option<&'static str> {
    let supertypes = ModelTypeResolver::reverse_closure(model);
    let (_, entries) = supertypes.iter().find_map(|class| {
        FAST_PATHS
            .iter()
            .find(|(family, _)| *family == class.as_str())
    })?;
    entries
        .iter()
        .find(|(path, _)| *path == attribute_path)
        .map(|(_, cast)| *cast)
}

fn family_branches(node: &str) -> Vec<String> {
    vec![
        format!(
            "WHEN {node} ->> '_type' IN ({}) THEN {node} -> 'value'",
            sql_list(VALUE_MEMBER)
        ),
        format!(
            "WHEN {node} ->> '_type' IN ({}) THEN {node} -> 'magnitude'",
            sql_list(MAGNITUDE_MEMBER)
        ),
        format!(
            "WHEN {node} ->> '_type' = 'DV_PROPORTION' THEN to_jsonb(({node} ->> 'numerator')::numeric / NULLIF(({node} ->> 'denominator')::numeric, 0))"
        ),
    ]
}

fn sql_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| quote_literal(v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a right-hand operand of a comparison or a function argument.
pub fn terminal_sql(
    terminal: &Terminal,
    mode: ValueMode,
    ctx: &CompileContext<'_>,
) -> Result<String> {
    match terminal {
        Terminal::Primitive(primitive) => Ok(primitive_sql(primitive, mode)),
        Terminal::Parameter(name) => Ok(param_sql(ctx.params.get(name)?, mode)),
        Terminal::Path(path) => {
            let resolved = PathResolver::resolve(path, ctx)?;
            let first = resolved.query_first();
            Ok(match mode {
                ValueMode::Cast(cast) => format!("CAST({first} #>> '{{}}' AS {cast})"),
                ValueMode::Jsonb => first,
                ValueMode::Native => format!("({first} #>> '{{}}')"),
            })
        }
        Terminal::Function(call) => {
            let sql = FunctionCompiler::compile(call, ctx)?;
            Ok(match mode {
                ValueMode::Jsonb => format!("to_jsonb({sql})"),
                ValueMode::Cast(_) | ValueMode::Native => sql,
            })
        }
    }
}

pub(crate) fn primitive_sql(primitive: &Primitive, mode: ValueMode) -> String {
    let (literal, is_text) = match primitive {
        Primitive::Null => {
            return match mode {
                ValueMode::Jsonb => "'null'::jsonb".to_string(),
                ValueMode::Cast(_) | ValueMode::Native => "NULL".to_string(),
            };
        }
        Primitive::String(s)
        | Primitive::Date(s)
        | Primitive::Time(s)
        | Primitive::DateTime(s) => (quote_literal(s), true),
        Primitive::Integer(i) => (i.to_string(), false),
        Primitive::Real(r) => (numeric_literal(*r), false),
        Primitive::Boolean(b) => (b.to_string().to_uppercase(), false),
    };
    render_literal(literal, is_text, mode)
}

fn param_sql(value: &ParamValue, mode: ValueMode) -> String {
    let (literal, is_text) = match value {
        ParamValue::String(s) => (quote_literal(s), true),
        ParamValue::Integer(i) => (i.to_string(), false),
        ParamValue::Number(n) => (numeric_literal(*n), false),
        ParamValue::Boolean(b) => (b.to_string().to_uppercase(), false),
    };
    render_literal(literal, is_text, mode)
}

fn render_literal(literal: String, is_text: bool, mode: ValueMode) -> String {
    match mode {
        // non-finite reals
        ValueMode::Jsonb if literal == "NULL" => "'null'::jsonb".to_string(),
        ValueMode::Cast(_) if literal == "NULL" => literal,
        ValueMode::Cast(cast) => format!("CAST({literal} AS {cast})"),
        ValueMode::Jsonb if is_text => format!("to_jsonb({literal}::text)"),
        ValueMode::Jsonb => format!("to_jsonb({literal})"),
        ValueMode::Native => literal,
    }
}
