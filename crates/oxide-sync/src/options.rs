//! Runner configuration.

use std::time::Duration;

use oxide_ddl::IsolationLevel;
use serde::Deserialize;

use crate::error::Result;

/// Default name of the view metadata table.
pub const DEFAULT_METADATA_TABLE: &str = "oxide_metadata";

/// Settings for a [`SchemaRunner`](crate::SchemaRunner).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    /// Default schema. When unset the session's current schema is used and
    /// tables in it are cached without a schema qualifier.
    pub schema: Option<String>,
    /// Table holding view definitions.
    pub metadata_table: String,
    /// Statements slower than this many milliseconds are logged.
    pub max_query_execution_time_ms: Option<u64>,
    /// Isolation level used when a transaction is started without one.
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            schema: None,
            metadata_table: DEFAULT_METADATA_TABLE.to_string(),
            max_query_execution_time_ms: None,
            isolation_level: None,
        }
    }
}

impl RunnerOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the default schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the metadata table name.
    #[must_use]
    pub fn metadata_table(mut self, name: impl Into<String>) -> Self {
        self.metadata_table = name.into();
        self
    }

    /// Sets the slow-query threshold in milliseconds.
    #[must_use]
    pub const fn max_query_execution_time_ms(mut self, millis: u64) -> Self {
        self.max_query_execution_time_ms = Some(millis);
        self
    }

    /// Sets the default isolation level.
    #[must_use]
    pub const fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    /// Slow-query threshold as a duration.
    #[must_use]
    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.max_query_execution_time_ms.map(Duration::from_millis)
    }
}
