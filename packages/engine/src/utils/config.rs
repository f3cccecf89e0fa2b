// packages/engine/src/utils/config.rs
//! Engine configuration
//!
//! Settings are layered with the `config` crate:
//!
//! 1. Built-in defaults (`#[serde(default)]`)
//! 2. Optional `rewire.{toml,yaml,json}` in the working directory
//! 3. `REWIRE__`-prefixed environment variables (`REWIRE__INTERCEPTION__PLUGINS`)

use crate::interception::plugins::BuiltinPlugin;
use crate::utils::errors::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Specifier resolution settings
    pub resolver: ResolverSettings,

    /// Interception defaults
    pub interception: InterceptionConfig,

    /// Logging settings
    pub observability: ObservabilityConfig,
}

/// Where alias configs are looked up and how harness-level specifiers resolve
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Explicit alias config path, tried before the candidate names
    pub config_path: Option<PathBuf>,

    /// Alias config file names probed in the working directory
    pub candidate_names: Vec<String>,

    /// Virtual module path of the test harness; harness-level relative
    /// specifiers resolve against its directory
    pub harness: PathBuf,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            config_path: None,
            candidate_names: vec![
                "webpack.config.json".to_string(),
                "webpack.config.yaml".to_string(),
                "webpack.config.yml".to_string(),
            ],
            harness: cwd.join("__harness__"),
        }
    }
}

/// Defaults applied to the plugin chain and to new mock descriptors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptionConfig {
    /// Plugins installed when a controller is created, in evaluation order
    pub plugins: Vec<BuiltinPlugin>,

    /// Preset `to_be_used()` on every new descriptor
    pub require_use_by_default: bool,

    /// Preset `to_match_origin()` on every new descriptor
    pub match_origin_by_default: bool,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            plugins: vec![BuiltinPlugin::ChildOnly],
            require_use_by_default: false,
            match_origin_by_default: false,
        }
    }
}

impl InterceptionConfig {
    /// Configuration with an empty plugin chain (nothing is mocked until a
    /// plugin votes for it)
    pub fn without_plugins() -> Self {
        Self {
            plugins: Vec::new(),
            ..Default::default()
        }
    }

    /// Configuration whose only plugin is the given one
    pub fn with_plugin(plugin: BuiltinPlugin) -> Self {
        Self {
            plugins: vec![plugin],
            ..Default::default()
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Emit JSON log lines
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            json_logs: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the working directory and environment
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::load_from(&cwd)
    }

    /// Load configuration, looking for `rewire.*` in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let base = dir.join("rewire");

        let settings = Config::builder()
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("REWIRE").separator("__"))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        debug!("Engine configuration: {:?}", config);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.interception.plugins, vec![BuiltinPlugin::ChildOnly]);
        assert!(!config.interception.require_use_by_default);
        assert_eq!(config.resolver.candidate_names.len(), 3);
        assert_eq!(config.observability.log_filter, "info");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.interception.plugins, vec![BuiltinPlugin::ChildOnly]);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("rewire.toml"),
            r#"
[interception]
plugins = ["any_place"]
require_use_by_default = true

[resolver]
candidate_names = ["aliases.json"]
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.interception.plugins, vec![BuiltinPlugin::AnyPlace]);
        assert!(config.interception.require_use_by_default);
        assert!(!config.interception.match_origin_by_default);
        assert_eq!(config.resolver.candidate_names, vec!["aliases.json"]);
    }
}
