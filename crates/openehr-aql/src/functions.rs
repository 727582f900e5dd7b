//! Built-in AQL functions mapped to PostgreSQL functions.

use crate::ast::{FunctionCall, FunctionName, Terminal};
use crate::context::CompileContext;
use crate::error::{AqlError, Result};
use crate::value::{ValueMode, terminal_sql};

const TEXT: ValueMode = ValueMode::Cast("text");
const NUMERIC: ValueMode = ValueMode::Cast("numeric");
const INTEGER: ValueMode = ValueMode::Cast("integer");

pub struct FunctionCompiler;

impl FunctionCompiler {
    pub fn compile(call: &FunctionCall, ctx: &CompileContext<'_>) -> Result<String> {
        match call {
            FunctionCall::Builtin { name, args } => compile_builtin(*name, args, ctx),
            FunctionCall::Terminology(terminology) => Err(AqlError::UnsupportedFunctionCall(
                format!("TERMINOLOGY('{}', ...)", terminology.operation),
            )),
        }
    }

    /// SQL type of a function's result, used to type the other side of a
    /// comparison. `None` for calls that never compile.
    pub fn result_type(call: &FunctionCall) -> Option<&'static str> {
        let FunctionCall::Builtin { name, .. } = call else {
            return None;
        };
        Some(match name {
            FunctionName::Length | FunctionName::Position => "integer",
            FunctionName::Contains => "boolean",
            FunctionName::Substring
            | FunctionName::Concat
            | FunctionName::ConcatWs
            | FunctionName::CurrentTimezone => "text",
            FunctionName::Abs
            | FunctionName::Mod
            | FunctionName::Ceil
            | FunctionName::Floor
            | FunctionName::Round => "numeric",
            FunctionName::CurrentDate => "date",
            FunctionName::CurrentTime => "time",
            FunctionName::CurrentDateTime | FunctionName::Now => "timestamptz",
        })
    }
}

/// Allowed argument counts; `None` means unbounded.
fn arity(name: FunctionName) -> (usize, Option<usize>) {
    match name {
        FunctionName::Length
        | FunctionName::Abs
        | FunctionName::Ceil
        | FunctionName::Floor => (1, Some(1)),
        FunctionName::Contains | FunctionName::Position | FunctionName::Mod => (2, Some(2)),
        FunctionName::Substring => (2, Some(3)),
        FunctionName::Round => (1, Some(2)),
        FunctionName::Concat => (1, None),
        FunctionName::ConcatWs => (2, None),
        FunctionName::CurrentDate
        | FunctionName::CurrentTime
        | FunctionName::CurrentDateTime
        | FunctionName::Now
        | FunctionName::CurrentTimezone => (0, Some(0)),
    }
}

fn check_arity(name: FunctionName, args: &[Terminal]) -> Result<()> {
    let (min, max) = arity(name);
    let count = args.len();
    if count < min || max.is_some_and(|max| count > max) {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        return Err(AqlError::invalid_arguments(
            name.as_str(),
            format!("expected {expected} arguments, got {count}"),
        ));
    }
    Ok(())
}

fn compile_builtin(
    name: FunctionName,
    args: &[Terminal],
    ctx: &CompileContext<'_>,
) -> Result<String> {
    check_arity(name, args)?;

    let arg = |i: usize, mode: ValueMode| terminal_sql(&args[i], mode, ctx);
    let all = |mode: ValueMode| -> Result<String> {
        let rendered = args
            .iter()
            .map(|a| terminal_sql(a, mode, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join(", "))
    };

    let sql = match name {
        FunctionName::Length => format!("length({})", arg(0, TEXT)?),
        FunctionName::Contains => {
            format!("(strpos({}, {}) > 0)", arg(0, TEXT)?, arg(1, TEXT)?)
        }
        // POSITION(substring, string)
        FunctionName::Position => format!("strpos({}, {})", arg(1, TEXT)?, arg(0, TEXT)?),
        FunctionName::Substring if args.len() == 3 => format!(
            "substr({}, {}, {})",
            arg(0, TEXT)?,
            arg(1, INTEGER)?,
            arg(2, INTEGER)?
        ),
        FunctionName::Substring => format!("substr({}, {})", arg(0, TEXT)?, arg(1, INTEGER)?),
        FunctionName::Concat => format!("concat({})", all(TEXT)?),
        FunctionName::ConcatWs => format!("concat_ws({})", all(TEXT)?),
        FunctionName::Abs => format!("abs({})", arg(0, NUMERIC)?),
        FunctionName::Mod => format!("mod({}, {})", arg(0, NUMERIC)?, arg(1, NUMERIC)?),
        FunctionName::Ceil => format!("ceil({})", arg(0, NUMERIC)?),
        FunctionName::Floor => format!("floor({})", arg(0, NUMERIC)?),
        FunctionName::Round if args.len() == 2 => {
            format!("round({}, {})", arg(0, NUMERIC)?, arg(1, INTEGER)?)
        }
        FunctionName::Round => format!("round({})", arg(0, NUMERIC)?),
        FunctionName::CurrentDate => "CURRENT_DATE".to_string(),
        FunctionName::CurrentTime => "CURRENT_TIME".to_string(),
        FunctionName::CurrentDateTime => "CURRENT_TIMESTAMP".to_string(),
        FunctionName::Now => "now()".to_string(),
        FunctionName::CurrentTimezone => "current_setting('TimeZone')".to_string(),
    };
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{IdentifiedPath, Primitive, TerminologyCall};
    use crate::config::AqlSettings;
    use crate::params::Parameters;

    fn compile(name: FunctionName, args: Vec<Terminal>) -> Result<String> {
        let settings = AqlSettings::default();
        let params = Parameters::new();
        let mut ctx = CompileContext::new(&settings, &params);
        ctx.add_source("COMPOSITION", Some("c")).unwrap();
        FunctionCompiler::compile(&FunctionCall::builtin(name, args), &ctx)
    }

    fn text(s: &str) -> Terminal {
        Terminal::Primitive(Primitive::String(s.into()))
    }

    #[test]
    fn test_length_of_path() {
        let sql = compile(
            FunctionName::Length,
            vec![Terminal::Path(IdentifiedPath::with_path("c", "name/value"))],
        )
        .unwrap();
        assert_eq!(
            sql,
            "length(CAST(jsonb_path_query_first(source_0.data, '$.name.value') #>> '{}' AS text))"
        );
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(
            compile(FunctionName::Contains, vec![text("abc"), text("b")]).unwrap(),
            "(strpos(CAST('abc' AS text), CAST('b' AS text)) > 0)"
        );
        assert_eq!(
            compile(FunctionName::Position, vec![text("b"), text("abc")]).unwrap(),
            "strpos(CAST('abc' AS text), CAST('b' AS text))"
        );
        assert_eq!(
            compile(
                FunctionName::Substring,
                vec![text("abc"), Terminal::Primitive(Primitive::Integer(2))]
            )
            .unwrap(),
            "substr(CAST('abc' AS text), CAST(2 AS integer))"
        );
        assert!(compile(FunctionName::ConcatWs, vec![text("-"), text("a"), text("b")])
            .unwrap()
            .starts_with("concat_ws("));
    }

    #[test]
    fn test_numeric_and_date_functions() {
        assert_eq!(
            compile(
                FunctionName::Round,
                vec![
                    Terminal::Primitive(Primitive::Real(1.25)),
                    Terminal::Primitive(Primitive::Integer(1)),
                ]
            )
            .unwrap(),
            "round(CAST(1.25 AS numeric), CAST(1 AS integer))"
        );
        assert_eq!(compile(FunctionName::Now, vec![]).unwrap(), "now()");
        assert_eq!(
            compile(FunctionName::CurrentDateTime, vec![]).unwrap(),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_result_types() {
        let call = |name| FunctionCall::builtin(name, vec![]);
        assert_eq!(
            FunctionCompiler::result_type(&call(FunctionName::CurrentDateTime)),
            Some("timestamptz")
        );
        assert_eq!(FunctionCompiler::result_type(&call(FunctionName::Length)), Some("integer"));
        assert_eq!(FunctionCompiler::result_type(&call(FunctionName::Contains)), Some("boolean"));
        assert_eq!(FunctionCompiler::result_type(&call(FunctionName::Round)), Some("numeric"));
        let terminology = FunctionCall::Terminology(TerminologyCall {
            operation: "expand".into(),
            service_api: "hl7.org/fhir/4.0".into(),
            params: "url=x".into(),
        });
        assert_eq!(FunctionCompiler::result_type(&terminology), None);
    }

    #[test]
    fn test_arity_is_checked() {
        let err = compile(FunctionName::Length, vec![]).unwrap_err();
        assert_eq!(
            err,
            AqlError::invalid_arguments("LENGTH", "expected 1 arguments, got 0")
        );
        assert!(matches!(
            compile(FunctionName::Now, vec![text("x")]),
            Err(AqlError::InvalidFunctionArguments { .. })
        ));
        assert!(compile(FunctionName::ConcatWs, vec![text("-")]).is_err());
    }

    #[test]
    fn test_terminology_is_unsupported() {
        let settings = AqlSettings::default();
        let params = Parameters::new();
        let ctx = CompileContext::new(&settings, &params);
        let call = FunctionCall::Terminology(TerminologyCall {
            operation: "expand".into(),
            service_api: "hl7.org/fhir/4.0".into(),
            params: "url=http://snomed.info/sct".into(),
        });
        assert!(matches!(
            FunctionCompiler::compile(&call, &ctx),
            Err(AqlError::UnsupportedFunctionCall(_))
        ));
    }
}
