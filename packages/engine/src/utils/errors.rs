// packages/engine/src/utils/errors.rs
//! Error types for the interception engine
//!
//! Every mocking-setup error is a programmer error: they are surfaced at the
//! point of violation and never retried.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// No alias config file was found among the candidates
    #[error("Cannot find any of these configuration files: {}", .candidates.join(", "))]
    ConfigError {
        /// Candidate names or paths that were tried, in order
        candidates: Vec<String>,
    },

    /// Config file was found but carries no alias table
    #[error("The resolved config file {0:?} doesn't contain a resolve configuration")]
    ConfigMalformed(PathBuf),

    /// Scope closed while required mocks were never consulted
    #[error("Unused mocks: {}", .keys.join(", "))]
    UnusedMock {
        /// Keys of the offending descriptors
        keys: Vec<String>,
    },

    /// Mock exports disagree with the real module
    #[error("Mock for {key} does not match its origin: {}", .problems.join("; "))]
    ExportMismatch {
        /// Mocked module key
        key: String,

        /// One entry per offending export
        problems: Vec<String>,
    },

    /// `enable()` called during an active session
    #[error("Interception is already enabled")]
    AlreadyEnabled,

    /// `disable()` called without an active session
    #[error("Interception is not enabled")]
    NotEnabled,

    /// Scope is not on the scope stack
    #[error("Scope {0} is not open")]
    ScopeNotOpen(u64),

    /// Real loader has no module for the key
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// Module required itself while still loading
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// Export exists but is not a function
    #[error("Export '{0}' is not a function")]
    NotCallable(String),

    /// Layered engine settings failed to load
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound(module.into())
    }

    /// Whether this error is a mocking-setup violation rather than a load failure
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::UnusedMock { .. }
                | Self::ExportMismatch { .. }
                | Self::AlreadyEnabled
                | Self::NotEnabled
                | Self::ScopeNotOpen(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_candidates() {
        let err = EngineError::ConfigError {
            candidates: vec!["a.json".to_string(), "b.yaml".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Cannot find any of these configuration files: a.json, b.yaml"
        );
    }

    #[test]
    fn test_unused_mock_message() {
        let err = EngineError::UnusedMock {
            keys: vec!["/proj/b.js".to_string()],
        };
        assert!(err.to_string().contains("/proj/b.js"));
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_load_errors_are_not_setup_errors() {
        assert!(!EngineError::module_not_found("x").is_setup_error());
    }
}
