//! Identified paths (`o/data[at0001]/events/value`) resolved against the
//! FROM clause sources.

use crate::ast::{IdentifiedPath, PathSegment};
use crate::context::{CompileContext, Source};
use crate::error::Result;
use crate::predicate::NodePredicateCompiler;
use crate::sql_builder::JsonPath;

/// The last segment of a path, compiled on its own relative to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSegment {
    pub identifier: String,
    pub path: JsonPath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub source: Source,
    /// Full path from the source document.
    pub full: JsonPath,
    /// Path to the parent of the terminal segment.
    pub parent: JsonPath,
    pub terminal: Option<TerminalSegment>,
    /// Attribute names only, no node predicates anywhere.
    pub plain: bool,
    segments: Vec<String>,
}

impl ResolvedPath {
    /// A path with no segments denotes the whole source document.
    pub fn is_whole_document(&self) -> bool {
        self.terminal.is_none() && self.full.is_root()
    }

    /// Attribute names joined with `/`, e.g. `value/magnitude`.
    pub fn attribute_path(&self) -> String {
        self.segments.join("/")
    }

    /// Every value at this path, as a set-returning expression.
    pub fn query(&self) -> String {
        if self.full.is_root() {
            self.source.data()
        } else {
            format!(
                "jsonb_path_query({}, {})",
                self.source.data(),
                self.full.to_sql()
            )
        }
    }

    /// The first value at this path, or NULL.
    pub fn query_first(&self) -> String {
        if self.full.is_root() {
            self.source.data()
        } else {
            format!(
                "jsonb_path_query_first({}, {})",
                self.source.data(),
                self.full.to_sql()
            )
        }
    }

    /// Whether the path selects at least one value.
    pub fn exists(&self) -> String {
        if self.full.is_root() {
            format!("{} IS NOT NULL", self.source.data())
        } else {
            format!(
                "jsonb_path_exists({}, {})",
                self.source.data(),
                self.full.to_sql()
            )
        }
    }
}

pub struct PathResolver;

impl PathResolver {
    /// Bind a path to its source and compile it to SQL/JSON paths.
    pub fn resolve(path: &IdentifiedPath, ctx: &CompileContext<'_>) -> Result<ResolvedPath> {
        let source = ctx.find_source(&path.alias)?.clone();

        let mut root = JsonPath::root();
        if let Some(predicate) = &path.predicate {
            root = root.filter(&NodePredicateCompiler::compile(predicate, ctx.params)?);
        }

        let mut full = root.clone();
        let mut parent = root;
        let mut terminal = None;
        let last = path.segments.len().saturating_sub(1);
        for (i, segment) in path.segments.iter().enumerate() {
            full = apply_segment(full, segment, ctx)?;
            if i < last {
                parent = apply_segment(parent, segment, ctx)?;
            } else {
                terminal = Some(TerminalSegment {
                    identifier: segment.identifier.clone(),
                    path: apply_segment(JsonPath::root(), segment, ctx)?,
                });
            }
        }

        let plain = path.predicate.is_none() && path.segments.iter().all(|s| s.predicate.is_none());

        Ok(ResolvedPath {
            source,
            full,
            parent,
            terminal,
            plain,
            segments: path.segments.iter().map(|s| s.identifier.clone()).collect(),
        })
    }
}

fn apply_segment(
    path: JsonPath,
    segment: &PathSegment,
    ctx: &CompileContext<'_>,
) -> Result<JsonPath> {
    let path = path.member(&segment.identifier);
    match &segment.predicate {
        Some(predicate) => Ok(path.filter(&NodePredicateCompiler::compile(predicate, ctx.params)?)),
        None => Ok(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodePredicate;
    use crate::config::AqlSettings;
    use crate::error::AqlError;
    use crate::params::Parameters;

    fn with_context<R>(f: impl FnOnce(&CompileContext<'_>) -> R) -> R {
        let settings = AqlSettings::default();
        let params = Parameters::new();
        let mut ctx = CompileContext::new(&settings, &params);
        ctx.add_source("EHR", Some("e")).unwrap();
        ctx.add_source("OBSERVATION", Some("o")).unwrap();
        f(&ctx)
    }

    #[test]
    fn test_resolve_plain_path() {
        with_context(|ctx| {
            let path = IdentifiedPath::with_path("e", "ehr_id/value");
            let resolved = PathResolver::resolve(&path, ctx).unwrap();
            assert_eq!(resolved.source.table, "source_0");
            assert_eq!(resolved.full.to_string(), "$.ehr_id.value");
            assert_eq!(resolved.parent.to_string(), "$.ehr_id");
            assert_eq!(
                resolved.terminal.as_ref().map(|t| t.path.to_string()),
                Some("$.value".to_string())
            );
            assert!(resolved.plain);
            assert_eq!(resolved.attribute_path(), "ehr_id/value");
            assert_eq!(
                resolved.query(),
                "jsonb_path_query(source_0.data, '$.ehr_id.value')"
            );
        });
    }

    #[test]
    fn test_resolve_with_predicates() {
        with_context(|ctx| {
            let path = IdentifiedPath::new("o")
                .segment("data")
                .segment_with("events", NodePredicate::at_code("at0002"))
                .segment("time");
            let resolved = PathResolver::resolve(&path, ctx).unwrap();
            assert_eq!(resolved.source.table, "source_1");
            assert_eq!(
                resolved.full.to_string(),
                "$.data.events ? (@.archetype_node_id == \"at0002\").time"
            );
            assert!(!resolved.plain);
        });
    }

    #[test]
    fn test_whole_document() {
        with_context(|ctx| {
            let resolved = PathResolver::resolve(&IdentifiedPath::new("o"), ctx).unwrap();
            assert!(resolved.is_whole_document());
            assert_eq!(resolved.query(), "source_1.data");
            assert_eq!(resolved.exists(), "source_1.data IS NOT NULL");
        });
    }

    #[test]
    fn test_unknown_alias() {
        with_context(|ctx| {
            let err = PathResolver::resolve(&IdentifiedPath::with_path("x", "name/value"), ctx)
                .unwrap_err();
            assert_eq!(err, AqlError::UnknownAlias("x".into()));
        });
    }
}
