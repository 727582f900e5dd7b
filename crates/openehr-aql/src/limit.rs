//! LIMIT / OFFSET compilation.

use crate::ast::{LimitClause, LimitOperand};
use crate::error::{AqlError, Result};
use crate::params::Parameters;

pub struct LimitOffsetCompiler;

impl LimitOffsetCompiler {
    /// Render ` LIMIT n [OFFSET m]`, or an empty string.
    ///
    /// A query whose columns all yield a single row is capped at `LIMIT 1`.
    pub fn compile(
        limit: Option<&LimitClause>,
        single_row: bool,
        params: &Parameters,
    ) -> Result<String> {
        let Some(clause) = limit else {
            return Ok(if single_row {
                " LIMIT 1".to_string()
            } else {
                String::new()
            });
        };

        let mut count = resolve(&clause.limit, params)?;
        if single_row && count > 1 {
            count = 1;
        }
        let mut sql = format!(" LIMIT {count}");
        if let Some(offset) = &clause.offset {
            sql.push_str(&format!(" OFFSET {}", resolve(offset, params)?));
        }
        Ok(sql)
    }
}

fn resolve(operand: &LimitOperand, params: &Parameters) -> Result<u64> {
    match operand {
        LimitOperand::Integer(n) if *n > i64::MAX as u64 => Err(AqlError::unsupported_feature(
            format!("LIMIT/OFFSET {n} is outside the bigint range"),
        )),
        LimitOperand::Integer(n) => Ok(*n),
        LimitOperand::Parameter(name) => params.get_count(name),
    }
}
