//! AQL (Archetype Query Language) to PostgreSQL compiler.
//!
//! Compiles a parsed AQL query into a single SQL statement over openEHR
//! documents stored as `jsonb`. The statement returns one JSON array per
//! row, and [`CompiledQuery::column_names`] names the array elements.
//!
//! ```ignore
//! let compiler = QueryCompiler::new(AqlSettings::default())?;
//! let compiled = compiler.compile(&query, &Parameters::new().with("ehr_id", id))?;
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod from_clause;
pub mod functions;
pub mod limit;
pub mod model;
pub mod params;
pub mod path;
pub mod predicate;
pub mod select;
pub mod sql_builder;
mod tables;
pub mod value;
pub mod where_clause;

pub use ast::Query;
pub use compiler::{CompiledQuery, QueryCompiler};
pub use config::{AqlSettings, Settings};
pub use error::{AqlError, ErrorCategory, Result};
pub use model::ModelTypeResolver;
pub use params::{ParamValue, Parameters};
pub use path::PathResolver;
pub use predicate::NodePredicateCompiler;
pub use value::ValueExtractor;
