//! Profiler configuration: defaults, optional file, then `PROFILER_*` environment

use crate::{ProfilerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime settings for a profiling run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Complete connection string, passed through untouched
    pub database_url: Option<String>,
    /// Appended to the source table name to name its profile table
    pub profile_suffix: String,
    /// Source columns never profiled (matched case-insensitively)
    pub skip_columns: Vec<String>,
    /// Emit JSON log lines instead of plain text
    pub log_json: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            profile_suffix: "_profile".to_string(),
            skip_columns: vec!["id".to_string()],
            log_json: false,
        }
    }
}

impl ProfilerConfig {
    /// Load layered configuration. Later layers override earlier ones.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("profile_suffix", defaults.profile_suffix)?
            .set_default("skip_columns", defaults.skip_columns)?
            .set_default("log_json", defaults.log_json)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PROFILER")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("skip_columns"),
        );

        let loaded: ProfilerConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// The suffix ends up in DDL text, so it must be a plain identifier fragment
    pub fn validate(&self) -> Result<()> {
        if self.profile_suffix.is_empty() {
            return Err(ProfilerError::Configuration(
                "profile_suffix must not be empty".into(),
            ));
        }
        if !self
            .profile_suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ProfilerError::Configuration(format!(
                "profile_suffix {:?} may only contain letters, digits and underscores",
                self.profile_suffix
            )));
        }
        Ok(())
    }

    pub fn is_skipped(&self, column: &str) -> bool {
        self.skip_columns
            .iter()
            .any(|skipped| skipped.eq_ignore_ascii_case(column))
    }
}
