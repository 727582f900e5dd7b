//! SQL fragment building blocks for PostgreSQL JSONB queries.
//!
//! Dynamic text never reaches the generated SQL through plain `format!`:
//! string values go through [`quote_literal`], schema names through
//! [`escape_identifier`], and JSON paths are assembled by [`JsonPath`],
//! which quotes member names and JSON string literals itself.

use std::fmt;

use crate::error::{AqlError, Result};

// ============================================================================
// Identifiers and literals
// ============================================================================

/// Validate an identifier (schema or table name).
///
/// Only allows ASCII alphanumeric characters and underscores, not starting
/// with a digit.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AqlError::configuration("Empty identifier"));
    }

    if !is_plain_identifier(name) {
        return Err(AqlError::configuration(format!(
            "Invalid identifier: {name}"
        )));
    }

    Ok(())
}

/// Escape a PostgreSQL identifier (schema name, table name).
pub fn escape_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote a string as a PostgreSQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote a string as a SQL/JSON path string literal (JSON string syntax).
pub fn json_path_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format a float so that PostgreSQL and SQL/JSON path both accept it.
pub fn numeric_literal(value: f64) -> String {
    if value.is_finite() {
        let text = value.to_string();
        if text.contains('.') || text.contains('e') {
            text
        } else {
            format!("{text}.0")
        }
    } else {
        "NULL".to_string()
    }
}

// ============================================================================
// SQL/JSON path abstraction
// ============================================================================

/// A SQL/JSON path expression rooted at `$`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonPath {
    steps: Vec<String>,
}

impl JsonPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Append a member accessor, quoting names that are not plain identifiers.
    pub fn member(mut self, name: &str) -> Self {
        if is_plain_identifier(name) {
            self.steps.push(format!(".{name}"));
        } else {
            self.steps.push(format!(".{}", json_path_string(name)));
        }
        self
    }

    /// Append a `? (...)` filter over the current item.
    pub fn filter(mut self, condition: &str) -> Self {
        self.steps.push(format!(" ? ({condition})"));
        self
    }

    /// Append a recursive wildcard accessor over every nested item, excluding
    /// the current one (`.**{1 to last}`).
    pub fn descendants(mut self) -> Self {
        self.steps.push(".**{1 to last}".to_string());
        self
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// The path relative to the current filter item (`@...`).
    pub fn to_relative_string(&self) -> String {
        let mut out = String::from("@");
        for step in &self.steps {
            out.push_str(step);
        }
        out
    }

    /// The path as a quoted SQL literal, ready to pass to `jsonb_path_*`.
    pub fn to_sql(&self) -> String {
        quote_literal(&self.to_string())
    }

    /// The path in strict mode as a quoted SQL literal.
    pub fn to_strict_sql(&self) -> String {
        quote_literal(&format!("strict {self}"))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Boolean conditions
// ============================================================================

/// A SQL boolean expression tree, rendered with explicit parentheses.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlCondition {
    Raw(String),
    And(Vec<SqlCondition>),
    Or(Vec<SqlCondition>),
    Not(Box<SqlCondition>),
    True,
}

impl SqlCondition {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    pub fn and(left: SqlCondition, right: SqlCondition) -> Self {
        match (left, right) {
            (Self::True, other) | (other, Self::True) => other,
            (Self::And(mut parts), Self::And(more)) => {
                parts.extend(more);
                Self::And(parts)
            }
            (Self::And(mut parts), other) => {
                parts.push(other);
                Self::And(parts)
            }
            (other, Self::And(mut parts)) => {
                parts.insert(0, other);
                Self::And(parts)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    pub fn or(left: SqlCondition, right: SqlCondition) -> Self {
        match (left, right) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::Or(mut parts), other) => {
                parts.push(other);
                Self::Or(parts)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    pub fn negate(inner: SqlCondition) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn to_sql(&self) -> String {
        match self {
            Self::Raw(sql) => sql.clone(),
            Self::And(parts) => join_parts(parts, " AND "),
            Self::Or(parts) => join_parts(parts, " OR "),
            Self::Not(inner) => format!("NOT ({})", inner.to_sql()),
            Self::True => "TRUE".to_string(),
        }
    }
}

fn join_parts(parts: &[SqlCondition], separator: &str) -> String {
    let rendered: Vec<String> = parts.iter().map(|p| format!("({})", p.to_sql())).collect();
    rendered.join(separator)
}

// ============================================================================
// FROM items
// ============================================================================

/// One relation in the FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    /// A source without a parent: `FROM (<subquery>) alias`.
    Base { subquery: String, alias: String },
    /// A source evaluated per row of the preceding relations.
    Lateral { subquery: String, alias: String },
}

impl FromItem {
    pub fn alias(&self) -> &str {
        match self {
            Self::Base { alias, .. } | Self::Lateral { alias, .. } => alias,
        }
    }
}

/// Render FROM items. The first item must be a base item; further base
/// items are cross joined and lateral items left joined.
pub fn render_from(items: &[FromItem]) -> String {
    let mut sql = String::new();
    for item in items {
        let fragment = match item {
            FromItem::Base { subquery, alias } if sql.is_empty() => {
                format!("FROM ({subquery}) {alias}")
            }
            FromItem::Base { subquery, alias } => format!(" CROSS JOIN ({subquery}) {alias}"),
            FromItem::Lateral { subquery, alias } => {
                format!(" LEFT JOIN LATERAL ({subquery}) {alias} ON true")
            }
        };
        sql.push_str(&fragment);
    }
    sql
}
