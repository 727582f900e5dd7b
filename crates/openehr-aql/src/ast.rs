//! Typed AQL syntax tree.
//!
//! The tree is produced by an external parser. Every grammar rule is an
//! exhaustive enum, so the compiler stages match on all variants and a new
//! construct cannot be silently ignored. The serde representation is
//! externally tagged with snake_case variant names, which lets a parser
//! written in any language hand the tree over as JSON.

use serde::{Deserialize, Serialize};

/// A complete AQL query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub select: SelectClause,
    pub from: ContainsExpr,
    #[serde(default, rename = "where")]
    pub where_clause: Option<WhereExpr>,
    #[serde(default)]
    pub order_by: Vec<OrderByExpr>,
    #[serde(default)]
    pub limit: Option<LimitClause>,
}

impl Query {
    pub fn new(select: SelectClause, from: ContainsExpr) -> Self {
        Self {
            select,
            from,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn with_where(mut self, expr: WhereExpr) -> Self {
        self.where_clause = Some(expr);
        self
    }

    pub fn with_limit(mut self, limit: LimitClause) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order_by(mut self, order: OrderByExpr) -> Self {
        self.order_by.push(order);
        self
    }
}

// ============================================================================
// SELECT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectClause {
    #[serde(default)]
    pub distinct: bool,
    pub columns: Selection,
}

impl SelectClause {
    /// `SELECT *`
    pub fn all() -> Self {
        Self {
            distinct: false,
            columns: Selection::All,
        }
    }

    pub fn columns(columns: Vec<SelectExpr>) -> Self {
        Self {
            distinct: false,
            columns: Selection::Columns(columns),
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    All,
    Columns(Vec<SelectExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectExpr {
    pub column: ColumnExpr,
    #[serde(default)]
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(column: ColumnExpr) -> Self {
        Self {
            column,
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnExpr {
    Primitive(Primitive),
    Path(IdentifiedPath),
    Function(FunctionCall),
    Aggregate(AggregateFunctionCall),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunctionCall {
    Count(CountArgument),
    Min(IdentifiedPath),
    Max(IdentifiedPath),
    Sum(IdentifiedPath),
    Avg(IdentifiedPath),
}

impl AggregateFunctionCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Count(_) => "COUNT",
            Self::Min(_) => "MIN",
            Self::Max(_) => "MAX",
            Self::Sum(_) => "SUM",
            Self::Avg(_) => "AVG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountArgument {
    Star,
    Distinct(IdentifiedPath),
    Path(IdentifiedPath),
}

// ============================================================================
// FROM / CONTAINS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainsExpr {
    Class {
        class: ClassExpression,
        #[serde(default)]
        contains: Option<Box<Containment>>,
    },
    And(Box<ContainsExpr>, Box<ContainsExpr>),
    Or(Box<ContainsExpr>, Box<ContainsExpr>),
    Parenthesized(Box<ContainsExpr>),
}

impl ContainsExpr {
    pub fn class(class: ClassExpression) -> Self {
        Self::Class {
            class,
            contains: None,
        }
    }

    /// `<self> CONTAINS <child>`; `self` must be a class operand.
    pub fn contains(self, child: ContainsExpr) -> Self {
        self.with_containment(false, child)
    }

    /// `<self> NOT CONTAINS <child>`; `self` must be a class operand.
    pub fn not_contains(self, child: ContainsExpr) -> Self {
        self.with_containment(true, child)
    }

    fn with_containment(self, negated: bool, child: ContainsExpr) -> Self {
        match self {
            Self::Class { class, .. } => Self::Class {
                class,
                contains: Some(Box::new(Containment {
                    negated,
                    expr: child,
                })),
            },
            other => other,
        }
    }

    pub fn and(left: ContainsExpr, right: ContainsExpr) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: ContainsExpr, right: ContainsExpr) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn parenthesized(inner: ContainsExpr) -> Self {
        Self::Parenthesized(Box::new(inner))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Containment {
    #[serde(default)]
    pub negated: bool,
    pub expr: ContainsExpr,
}

/// A class operand such as `COMPOSITION c[openEHR-EHR-COMPOSITION.encounter.v1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassExpression {
    pub model: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub predicate: Option<ClassPredicate>,
}

impl ClassExpression {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            alias: None,
            predicate: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn predicate(mut self, predicate: ClassPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassPredicate {
    Node(NodePredicate),
    AllVersions,
    LatestVersion,
}

// ============================================================================
// Paths and node predicates
// ============================================================================

/// `alias[predicate]/segment[predicate]/...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedPath {
    pub alias: String,
    #[serde(default)]
    pub predicate: Option<NodePredicate>,
    #[serde(default)]
    pub segments: Vec<PathSegment>,
}

impl IdentifiedPath {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            predicate: None,
            segments: Vec::new(),
        }
    }

    /// Parse a plain slash-separated attribute path, e.g. `ehr_id/value`.
    pub fn with_path(alias: impl Into<String>, path: &str) -> Self {
        let mut result = Self::new(alias);
        for identifier in path.split('/').filter(|s| !s.is_empty()) {
            result = result.segment(identifier);
        }
        result
    }

    pub fn predicate(mut self, predicate: NodePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn segment(mut self, identifier: impl Into<String>) -> Self {
        self.segments.push(PathSegment::new(identifier));
        self
    }

    pub fn segment_with(mut self, identifier: impl Into<String>, predicate: NodePredicate) -> Self {
        self.segments
            .push(PathSegment::new(identifier).predicate(predicate));
        self
    }

    pub fn terminal(&self) -> Option<&PathSegment> {
        self.segments.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub identifier: String,
    #[serde(default)]
    pub predicate: Option<NodePredicate>,
}

impl PathSegment {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            predicate: None,
        }
    }

    pub fn predicate(mut self, predicate: NodePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

/// An object path used inside node predicates, e.g. `name/value`.
pub type ObjectPath = Vec<PathSegment>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePredicate {
    Archetype {
        archetype_id: String,
        #[serde(default)]
        name: Option<NameOperand>,
    },
    IdCode {
        code: String,
        #[serde(default)]
        name: Option<NameOperand>,
    },
    AtCode {
        code: String,
        #[serde(default)]
        name: Option<NameOperand>,
    },
    Parameter {
        parameter: String,
        #[serde(default)]
        name: Option<NameOperand>,
    },
    Comparison {
        path: ObjectPath,
        op: ComparisonOperator,
        operand: PathPredicateOperand,
    },
    Matches {
        path: ObjectPath,
        pattern: String,
    },
    And(Box<NodePredicate>, Box<NodePredicate>),
    Or(Box<NodePredicate>, Box<NodePredicate>),
}

impl NodePredicate {
    pub fn archetype(archetype_id: impl Into<String>) -> Self {
        Self::Archetype {
            archetype_id: archetype_id.into(),
            name: None,
        }
    }

    pub fn archetype_named(archetype_id: impl Into<String>, name: NameOperand) -> Self {
        Self::Archetype {
            archetype_id: archetype_id.into(),
            name: Some(name),
        }
    }

    pub fn at_code(code: impl Into<String>) -> Self {
        Self::AtCode {
            code: code.into(),
            name: None,
        }
    }

    pub fn id_code(code: impl Into<String>) -> Self {
        Self::IdCode {
            code: code.into(),
            name: None,
        }
    }

    pub fn and(left: NodePredicate, right: NodePredicate) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: NodePredicate, right: NodePredicate) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }
}

/// Second operand of a node predicate, matched against the node's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameOperand {
    String(String),
    TermCode(String),
    AtCode(String),
    IdCode(String),
    Parameter(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPredicateOperand {
    Primitive(Primitive),
    Path(ObjectPath),
    Parameter(String),
    IdCode(String),
    AtCode(String),
}

// ============================================================================
// WHERE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhereExpr {
    And(Box<WhereExpr>, Box<WhereExpr>),
    Or(Box<WhereExpr>, Box<WhereExpr>),
    Not(Box<WhereExpr>),
    Parenthesized(Box<WhereExpr>),
    Exists(IdentifiedPath),
    Comparison {
        left: ComparisonLeft,
        op: ComparisonOperator,
        right: Terminal,
    },
    Like {
        path: IdentifiedPath,
        pattern: LikeOperand,
    },
    Matches {
        path: IdentifiedPath,
        operand: MatchesOperand,
    },
}

impl WhereExpr {
    pub fn and(left: WhereExpr, right: WhereExpr) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: WhereExpr, right: WhereExpr) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn negate(inner: WhereExpr) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn compare(path: IdentifiedPath, op: ComparisonOperator, right: Terminal) -> Self {
        Self::Comparison {
            left: ComparisonLeft::Path(path),
            op,
            right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonLeft {
    Path(IdentifiedPath),
    Function(FunctionCall),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Primitive(Primitive),
    Parameter(String),
    Path(IdentifiedPath),
    Function(FunctionCall),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeOperand {
    String(String),
    Parameter(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchesOperand {
    ValueList(Vec<MatchesValue>),
    Terminology(TerminologyCall),
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchesValue {
    Primitive(Primitive),
    Parameter(String),
}

/// `TERMINOLOGY('operation', 'service_api', 'params')`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminologyCall {
    pub operation: String,
    pub service_api: String,
    pub params: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOperator {
    /// Get the SQL operator string.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// Get the SQL/JSON path operator string.
    pub fn as_json_path(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

// ============================================================================
// Functions and primitives
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCall {
    Builtin {
        name: FunctionName,
        #[serde(default)]
        args: Vec<Terminal>,
    },
    Terminology(TerminologyCall),
}

impl FunctionCall {
    pub fn builtin(name: FunctionName, args: Vec<Terminal>) -> Self {
        Self::Builtin { name, args }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionName {
    Length,
    Contains,
    Position,
    Substring,
    Concat,
    ConcatWs,
    Abs,
    Mod,
    Ceil,
    Floor,
    Round,
    CurrentDate,
    CurrentTime,
    CurrentDateTime,
    Now,
    CurrentTimezone,
}

impl FunctionName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Length => "LENGTH",
            Self::Contains => "CONTAINS",
            Self::Position => "POSITION",
            Self::Substring => "SUBSTRING",
            Self::Concat => "CONCAT",
            Self::ConcatWs => "CONCAT_WS",
            Self::Abs => "ABS",
            Self::Mod => "MOD",
            Self::Ceil => "CEIL",
            Self::Floor => "FLOOR",
            Self::Round => "ROUND",
            Self::CurrentDate => "CURRENT_DATE",
            Self::CurrentTime => "CURRENT_TIME",
            Self::CurrentDateTime => "CURRENT_DATE_TIME",
            Self::Now => "NOW",
            Self::CurrentTimezone => "CURRENT_TIMEZONE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Date(String),
    Time(String),
    DateTime(String),
    Null,
}

// ============================================================================
// ORDER BY / LIMIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByExpr {
    pub path: IdentifiedPath,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitClause {
    pub limit: LimitOperand,
    #[serde(default)]
    pub offset: Option<LimitOperand>,
}

impl LimitClause {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: LimitOperand::Integer(limit),
            offset: None,
        }
    }

    pub fn offset(mut self, offset: LimitOperand) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitOperand {
    Integer(u64),
    Parameter(String),
}
