// config.rs — Server configuration.
//
// ServerConfig holds the admission limits, the executor's step interval,
// how many finished goals to remember, and where (if anywhere) to append the
// JSONL event log. It is read from a TOML file; every field has a default so
// an empty or missing file yields the stock server.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fc_policy::engine::{DEFAULT_MAX_ORDER, DEFAULT_MIN_CANCELABLE_ORDER};
use fc_policy::AdmissionPolicy;

use crate::error::ServerError;

/// Default config file name, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fibonacci.toml";

/// Configuration for the goal server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Requests with a larger order are rejected.
    #[serde(default = "default_max_order")]
    pub max_order: u32,

    /// Goals with a smaller order refuse cancellation.
    #[serde(default = "default_min_cancelable_order")]
    pub min_cancelable_order: u32,

    /// Pause between computation steps, in milliseconds.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    /// How many finished goals `status` can still answer for.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Optional JSONL file receiving every lifecycle event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_order: default_max_order(),
            min_cancelable_order: default_min_cancelable_order(),
            step_interval_ms: default_step_interval_ms(),
            history_limit: default_history_limit(),
            events_log: None,
        }
    }
}

// Serde default functions
fn default_max_order() -> u32 {
    DEFAULT_MAX_ORDER
}

fn default_min_cancelable_order() -> u32 {
    DEFAULT_MIN_CANCELABLE_ORDER
}

fn default_step_interval_ms() -> u64 {
    1000
}

fn default_history_limit() -> usize {
    256
}

impl ServerConfig {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| ServerError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ServerError::Config { reason, .. } => ServerError::Config {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ServerError> {
        let config: ServerConfig = toml::from_str(content).map_err(|e| ServerError::Config {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values describe a server that can actually run.
    pub fn validate(&self) -> Result<(), ServerError> {
        self.admission_policy().validate()?;
        if self.step_interval_ms == 0 {
            return Err(ServerError::Config {
                path: "<inline>".to_string(),
                reason: "step_interval_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The limits handed to the admission gate.
    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            max_order: self.max_order,
            min_cancelable_order: self.min_cancelable_order,
        }
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.max_order, 20);
        assert_eq!(config.min_cancelable_order, 10);
        assert_eq!(config.step_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let config = ServerConfig::from_toml_str(
            r#"
            step_interval_ms = 50
            events_log = "/tmp/fc-events.jsonl"
            "#,
        )
        .unwrap();
        assert_eq!(config.step_interval_ms, 50);
        assert_eq!(config.max_order, 20);
        assert_eq!(
            config.events_log,
            Some(PathBuf::from("/tmp/fc-events.jsonl"))
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = ServerConfig::from_toml_str("step_interval_ms = 0");
        assert!(matches!(result, Err(ServerError::Config { .. })));
    }

    #[test]
    fn overflowing_order_limit_is_rejected() {
        let result = ServerConfig::from_toml_str("max_order = 200");
        assert!(matches!(result, Err(ServerError::Policy(_))));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fibonacci.toml");
        fs::write(&path, "max_order = \"twenty\"").unwrap();

        match ServerConfig::load(&path) {
            Err(ServerError::Config { path: p, .. }) => assert!(p.ends_with("fibonacci.toml")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }
}
