//! Engine configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one `Executor`. Every field has a default, so a partial
/// YAML/JSON document deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Nested workflow runs allowed below the root run
    pub max_depth: usize,

    /// Per-attempt limit on one adapter invocation, in seconds
    pub step_timeout_secs: u64,

    /// Retries for recoverable failures, on top of the first attempt
    pub max_retries: u32,

    /// First retry delay in milliseconds; doubled on each further attempt
    pub retry_backoff_ms: u64,

    /// Concurrent adapter invocations within one fan-out group
    pub max_parallel: usize,

    /// Placeholder bindings supplied by the caller
    pub variables: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            step_timeout_secs: 300,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_parallel: 4,
            variables: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// First retry delay.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.step_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_parallel, 4);
        assert_eq!(config.retry_backoff(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_yaml() {
        let config: EngineConfig =
            serde_yaml::from_str("maxDepth: 2\nvariables:\n  CITY: Paris\n").unwrap();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.variables.get("CITY").map(String::as_str), Some("Paris"));
    }

    #[test]
    fn test_with_variable_overrides() {
        let config = EngineConfig::default()
            .with_variable("CITY", "Paris")
            .with_variable("CITY", "Lisbon");
        assert_eq!(config.variables.len(), 1);
        assert_eq!(config.variables.get("CITY").map(String::as_str), Some("Lisbon"));
    }
}
