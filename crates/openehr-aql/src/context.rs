//! Per-compilation state.
//!
//! A fresh [`CompileContext`] is created for every call to
//! [`QueryCompiler::compile`](crate::QueryCompiler::compile), so table and
//! helper numbering restart at zero and nothing is shared between queries.

use crate::config::AqlSettings;
use crate::error::{AqlError, Result};
use crate::params::Parameters;

/// A class operand from the FROM clause, bound to a generated table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Reference model class, e.g. `COMPOSITION`.
    pub model: String,
    /// Generated SQL relation name, `source_<n>`.
    pub table: String,
    pub alias: Option<String>,
}

impl Source {
    /// The JSON document column of this source.
    pub fn data(&self) -> String {
        format!("{}.data", self.table)
    }
}

pub struct CompileContext<'a> {
    pub settings: &'a AqlSettings,
    pub params: &'a Parameters,
    sources: Vec<Source>,
    next_helper: usize,
}

impl<'a> CompileContext<'a> {
    pub fn new(settings: &'a AqlSettings, params: &'a Parameters) -> Self {
        Self {
            settings,
            params,
            sources: Vec::new(),
            next_helper: 0,
        }
    }

    /// Register a class operand and allocate its table name.
    ///
    /// Fails on a repeated non-empty alias or when the FROM clause grows
    /// beyond `max_sources`.
    pub fn add_source(&mut self, model: &str, alias: Option<&str>) -> Result<Source> {
        if let Some(alias) = alias.filter(|a| !a.is_empty())
            && self
                .sources
                .iter()
                .any(|s| s.alias.as_deref() == Some(alias))
        {
            return Err(AqlError::duplicate_alias(alias));
        }
        if self.sources.len() >= self.settings.max_sources {
            return Err(AqlError::QueryTooComplex(format!(
                "more than {} class operands in FROM",
                self.settings.max_sources
            )));
        }

        let source = Source {
            model: model.to_string(),
            table: format!("source_{}", self.sources.len()),
            alias: alias.filter(|a| !a.is_empty()).map(str::to_string),
        };
        self.sources.push(source.clone());
        Ok(source)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn find_source(&self, alias: &str) -> Result<&Source> {
        self.sources
            .iter()
            .find(|s| s.alias.as_deref() == Some(alias))
            .ok_or_else(|| AqlError::unknown_alias(alias))
    }

    /// Allocate a name for an aggregate helper relation.
    pub fn next_helper_alias(&mut self) -> String {
        let alias = format!("helper_{}", self.next_helper);
        self.next_helper += 1;
        alias
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_are_numbered_in_order() {
        let settings = AqlSettings::default();
        let params = Parameters::new();
        let mut ctx = CompileContext::new(&settings, &params);

        let ehr = ctx.add_source("EHR", Some("e")).unwrap();
        let comp = ctx.add_source("COMPOSITION", None).unwrap();
        assert_eq!(ehr.table, "source_0");
        assert_eq!(comp.table, "source_1");
        assert_eq!(comp.alias, None);
        assert_eq!(ctx.find_source("e").unwrap().data(), "source_0.data");
        assert_eq!(ctx.next_helper_alias(), "helper_0");
        assert_eq!(ctx.next_helper_alias(), "helper_1");
    }

    #[test]
    fn test_duplicate_alias() {
        let settings = AqlSettings::default();
        let params = Parameters::new();
        let mut ctx = CompileContext::new(&settings, &params);

        ctx.add_source("COMPOSITION", Some("c")).unwrap();
        ctx.add_source("OBSERVATION", None).unwrap();
        ctx.add_source("OBSERVATION", None).unwrap();
        assert_eq!(
            ctx.add_source("EHR", Some("c")).unwrap_err(),
            AqlError::DuplicateAlias("c".into())
        );
    }

    #[test]
    fn test_unknown_alias() {
        let settings = AqlSettings::default();
        let params = Parameters::new();
        let ctx = CompileContext::new(&settings, &params);
        assert_eq!(
            ctx.find_source("x").unwrap_err(),
            AqlError::UnknownAlias("x".into())
        );
    }

    #[test]
    fn test_max_sources() {
        let settings = AqlSettings::default().with_max_sources(1);
        let params = Parameters::new();
        let mut ctx = CompileContext::new(&settings, &params);
        ctx.add_source("EHR", None).unwrap();
        assert!(matches!(
            ctx.add_source("COMPOSITION", None),
            Err(AqlError::QueryTooComplex(_))
        ));
    }
}
