//! Runtime Configuration
//!
//! Limits that bound a propagation pass. Both have defaults suited to
//! interactive use; hosts that build very deep memo chains or intentionally
//! ping-pong between effects can raise them.
//!
//! Configuration is plain JSON:
//!
//! ```json
//! { "max_flush_iterations": 500, "max_run_depth": 64 }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of deferred-lane passes before a flush is aborted.
pub const DEFAULT_MAX_FLUSH_ITERATIONS: u32 = 1000;

/// Default number of nested synchronous computation runs.
pub const DEFAULT_MAX_RUN_DEPTH: usize = 256;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed runtime config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid runtime config: {0}")]
    Invalid(String),
}

/// Limits applied by a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Deferred-lane passes per flush before the flush is aborted with
    /// [`ReactiveError::MaxFlushIterations`](crate::ReactiveError::MaxFlushIterations).
    pub max_flush_iterations: u32,

    /// Nested synchronous runs (memo chains, render effects triggering render
    /// effects) before a run fails with
    /// [`ReactiveError::RunDepthExceeded`](crate::ReactiveError::RunDepthExceeded).
    pub max_run_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_iterations: DEFAULT_MAX_FLUSH_ITERATIONS,
            max_run_depth: DEFAULT_MAX_RUN_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_flush_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_flush_iterations must be at least 1".into(),
            ));
        }
        if self.max_run_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_run_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = RuntimeConfig::from_json(r#"{ "max_run_depth": 8 }"#).unwrap();
        assert_eq!(config.max_run_depth, 8);
        assert_eq!(config.max_flush_iterations, DEFAULT_MAX_FLUSH_ITERATIONS);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RuntimeConfig::from_json(r#"{ "max_depth": 8 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_limits_are_invalid() {
        let err = RuntimeConfig::from_json(r#"{ "max_flush_iterations": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RuntimeConfig::from_json(r#"{ "max_run_depth": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RuntimeConfig::from_path("/definitely/not/here.json").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.json"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
