//! Bound query parameters (`$name` references).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AqlError, Result};

/// A dynamically typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) | Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Parameter map supplied alongside a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: HashMap<String, ParamValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a parameter. A leading `$` in `name` is ignored.
    pub fn get(&self, name: &str) -> Result<&ParamValue> {
        let key = name.strip_prefix('$').unwrap_or(name);
        self.values
            .get(key)
            .ok_or_else(|| AqlError::missing_parameter(key))
    }

    pub fn get_string(&self, name: &str) -> Result<&str> {
        match self.get(name)? {
            ParamValue::String(s) => Ok(s),
            other => Err(mismatch(name, "string", other)),
        }
    }

    /// Look up a parameter usable as LIMIT/OFFSET.
    pub fn get_count(&self, name: &str) -> Result<u64> {
        match self.get(name)? {
            ParamValue::Integer(i) if *i >= 0 => Ok(*i as u64),
            ParamValue::Number(n) if *n >= 0.0 && *n < i64::MAX as f64 && n.fract() == 0.0 => {
                Ok(*n as u64)
            }
            other => Err(mismatch(name, "non-negative integer", other)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn mismatch(name: &str, expected: &'static str, actual: &ParamValue) -> AqlError {
    AqlError::ParameterTypeMismatch {
        name: name.strip_prefix('$').unwrap_or(name).to_string(),
        expected,
        actual: actual.type_name(),
    }
}
