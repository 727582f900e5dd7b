use serde::{Deserialize, Serialize};

use crate::error::{AqlError, Result};
use crate::sql_builder::validate_identifier;

/// Top-level settings file layout (`openehr.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub aql: AqlSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.aql.validate()?;
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(AqlError::configuration(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

/// Compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AqlSettings {
    /// Schema holding the `ehr`, `contribution`, `versioned_object` and
    /// `object_version` tables.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Upper bound on class operands in one FROM clause.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    /// Emit every generated statement at debug level.
    #[serde(default)]
    pub log_sql: bool,
}

impl Default for AqlSettings {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            max_sources: default_max_sources(),
            log_sql: false,
        }
    }
}

impl AqlSettings {
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if validate_identifier(&self.schema).is_err() {
            return Err(AqlError::configuration(format!(
                "aql.schema must be a plain SQL identifier, got '{}'",
                self.schema
            )));
        }
        if self.max_sources == 0 {
            return Err(AqlError::configuration("aql.max_sources must be > 0"));
        }
        Ok(())
    }
}

fn default_schema() -> String {
    "openehr".to_string()
}

fn default_max_sources() -> usize {
    32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub mod loader {
    use super::Settings;
    use crate::error::{AqlError, Result};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Load settings from `path` (or `openehr.toml` when present) layered with
    /// `OPENEHR__...` environment overrides, then validate them.
    pub fn load_settings(path: Option<&str>) -> Result<Settings> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or("openehr.toml"));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        } else if let Some(p) = path {
            return Err(AqlError::configuration(format!(
                "settings file not found: {p}"
            )));
        }
        // Environment variable overrides, e.g., OPENEHR__AQL__SCHEMA=ehr
        builder = builder.add_source(
            Environment::with_prefix("OPENEHR")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| AqlError::configuration(format!("config build error: {e}")))?;
        let merged: Settings = cfg
            .try_deserialize()
            .map_err(|e| AqlError::configuration(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
