// packages/engine/src/resolver/alias.rs
//! Alias tables and build-config discovery
//!
//! A build config is a JSON or YAML document holding either a single
//! `{resolve: {alias, extensions}}` shape or a list of them (multi-target
//! builds). Lists are merged: aliases with object-assign semantics (later
//! value wins, first position kept), extensions concatenated without
//! duplicates.

use crate::utils::config::ResolverSettings;
use crate::utils::errors::{EngineError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One alias rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// Pattern as written; a trailing `$` requests an exact match
    pub pattern: String,

    /// Replacement path or package id
    pub replacement: String,
}

impl AliasEntry {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    fn is_exact(&self) -> bool {
        self.pattern.ends_with('$')
    }

    fn stem(&self) -> &str {
        self.pattern.strip_suffix('$').unwrap_or(&self.pattern)
    }

    /// Match the pattern as an anchored path-segment prefix
    ///
    /// Returns the remainder of the specifier after the pattern (empty or
    /// starting with `/`).
    pub fn matches<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        let rest = specifier.strip_prefix(self.stem())?;

        if rest.is_empty() || (!self.is_exact() && rest.starts_with('/')) {
            Some(rest)
        } else {
            None
        }
    }
}

/// Ordered alias table with optional extension list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
    extensions: Option<Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite an alias; an overwritten alias keeps its position
    pub fn alias(mut self, pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.insert(pattern.into(), replacement.into());
        self
    }

    /// Set the extension list used to probe aliased paths
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extensions: Vec<String> = extensions.into_iter().map(Into::into).collect();
        self.extensions = if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        };
        self
    }

    fn insert(&mut self, pattern: String, replacement: String) {
        match self.entries.iter_mut().find(|entry| entry.pattern == pattern) {
            Some(entry) => entry.replacement = replacement,
            None => self.entries.push(AliasEntry {
                pattern,
                replacement,
            }),
        }
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn extension_list(&self) -> Option<&[String]> {
        self.extensions.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry, in declaration order, whose pattern matches
    pub fn find<'s>(&self, specifier: &'s str) -> Option<(&AliasEntry, &'s str)> {
        self.entries
            .iter()
            .find_map(|entry| entry.matches(specifier).map(|rest| (entry, rest)))
    }

    /// Locate and read the alias config described by `settings`
    ///
    /// The explicit `config_path` is tried first, then each candidate name,
    /// all relative to `cwd`.
    pub fn read(settings: &ResolverSettings, cwd: &Path) -> Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = &settings.config_path {
            candidates.push(path.clone());
        }
        candidates.extend(settings.candidate_names.iter().map(PathBuf::from));

        let found = candidates
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.is_file());

        match found {
            Some(path) => Self::from_file(&path),
            None => Err(EngineError::ConfigError {
                candidates: candidates
                    .iter()
                    .map(|candidate| candidate.display().to_string())
                    .collect(),
            }),
        }
    }

    /// Read an alias config file (`.yaml`/`.yml` as YAML, anything else as JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let document: Value = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        let table = Self::from_document(&document, path)?;

        info!(
            "Loaded {} aliases from {}",
            table.entries.len(),
            path.display()
        );

        Ok(table)
    }

    /// Build a table from a parsed config document
    pub fn from_document(document: &Value, path: &Path) -> Result<Self> {
        let document = unwrap_default(document);

        if let Some(targets) = document.as_array() {
            return Ok(Self::merge_targets(targets));
        }

        let alias = resolve_section(document)
            .and_then(|resolve| resolve.get("alias"))
            .and_then(Value::as_object)
            .ok_or_else(|| EngineError::ConfigMalformed(path.to_path_buf()))?;

        let mut table = Self::new();
        table.extend_aliases(alias);
        table.extensions = extensions_of(document).filter(|list| !list.is_empty());

        Ok(table)
    }

    fn merge_targets(targets: &[Value]) -> Self {
        let mut table = Self::new();
        let mut extensions: Vec<String> = Vec::new();

        for target in targets {
            if let Some(alias) = resolve_section(target)
                .and_then(|resolve| resolve.get("alias"))
                .and_then(Value::as_object)
            {
                table.extend_aliases(alias);
            }

            for extension in extensions_of(target).unwrap_or_default() {
                if !extensions.contains(&extension) {
                    extensions.push(extension);
                }
            }
        }

        if table.entries.is_empty() {
            debug!("Multi-target config carries no aliases");
            return Self::new();
        }

        table.extensions(extensions)
    }

    fn extend_aliases(&mut self, alias: &Map<String, Value>) {
        for (pattern, replacement) in alias {
            match replacement.as_str() {
                Some(replacement) => self.insert(pattern.clone(), replacement.to_string()),
                None => warn!("Ignoring non-string alias for {}", pattern),
            }
        }
    }
}

/// Transpiled ES module configs export `{default: config}`
fn unwrap_default(document: &Value) -> &Value {
    match document.get("default") {
        Some(inner) if document.get("resolve").is_none() => inner,
        _ => document,
    }
}

fn resolve_section(document: &Value) -> Option<&Value> {
    document.get("resolve")
}

fn extensions_of(document: &Value) -> Option<Vec<String>> {
    let list = resolve_section(document)?.get("extensions")?.as_array()?;
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_anchored_segment_match() {
        let entry = AliasEntry::new("@foo", "./src/foo");

        assert_eq!(entry.matches("@foo"), Some(""));
        assert_eq!(entry.matches("@foo/bar.js"), Some("/bar.js"));
        assert_eq!(entry.matches("@foobar"), None);
        assert_eq!(entry.matches("x/@foo"), None);
    }

    #[test]
    fn test_exact_match_pattern() {
        let entry = AliasEntry::new("vue$", "vue/dist/vue.esm.js");

        assert_eq!(entry.matches("vue"), Some(""));
        assert_eq!(entry.matches("vue/router"), None);
    }

    #[test]
    fn test_first_declared_alias_wins() {
        let table = AliasTable::new()
            .alias("@app", "./src")
            .alias("@app/components", "./components");

        let (entry, rest) = table.find("@app/components/x").unwrap();
        assert_eq!(entry.pattern, "@app");
        assert_eq!(rest, "/components/x");
    }

    #[test]
    fn test_single_config_document() {
        let document = json!({
            "resolve": {
                "alias": {"@foo": "./src/foo", "lodash": "lodash-es"},
                "extensions": [".js", ".ts"]
            }
        });

        let table = AliasTable::from_document(&document, Path::new("cfg.json")).unwrap();
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.entries()[0].pattern, "@foo");
        assert_eq!(
            table.extension_list(),
            Some(&[".js".to_string(), ".ts".to_string()][..])
        );
    }

    #[test]
    fn test_empty_extensions_mean_none() {
        let document = json!({"resolve": {"alias": {"a": "./a"}, "extensions": []}});
        let table = AliasTable::from_document(&document, Path::new("cfg.json")).unwrap();
        assert_eq!(table.extension_list(), None);
    }

    #[test]
    fn test_default_wrapper_is_unwrapped() {
        let document = json!({"default": {"resolve": {"alias": {"a": "./a"}}}});
        let table = AliasTable::from_document(&document, Path::new("cfg.json")).unwrap();
        assert_eq!(table.entries().len(), 1);
    }

    #[test]
    fn test_missing_alias_is_malformed() {
        let document = json!({"resolve": {"extensions": [".js"]}});
        let err = AliasTable::from_document(&document, Path::new("cfg.json")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMalformed(_)));
    }

    #[test]
    fn test_multi_target_merge() {
        let document = json!([
            {"resolve": {"alias": {"@a": "./a", "@b": "./b1"}, "extensions": [".js"]}},
            {"resolve": {"alias": {"@b": "./b2", "@c": "./c"}, "extensions": [".ts", ".js"]}},
            {"entry": "./main.js"}
        ]);

        let table = AliasTable::from_document(&document, Path::new("cfg.json")).unwrap();
        let patterns: Vec<_> = table.entries().iter().map(|e| e.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["@a", "@b", "@c"]);
        assert_eq!(table.entries()[1].replacement, "./b2");
        assert_eq!(
            table.extension_list(),
            Some(&[".js".to_string(), ".ts".to_string()][..])
        );
    }

    #[test]
    fn test_multi_target_without_aliases_is_empty() {
        let document = json!([{"entry": "./main.js"}]);
        let table = AliasTable::from_document(&document, Path::new("cfg.json")).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.extension_list(), None);
    }

    #[test]
    fn test_read_reports_candidates() {
        let dir = tempdir().unwrap();
        let settings = ResolverSettings {
            config_path: Some(PathBuf::from("build/custom.json")),
            ..Default::default()
        };

        let err = AliasTable::read(&settings, dir.path()).unwrap_err();
        match err {
            EngineError::ConfigError { candidates } => {
                assert_eq!(candidates[0], "build/custom.json");
                assert!(candidates.contains(&"webpack.config.json".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_yaml_candidate() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("webpack.config.yaml"),
            "resolve:\n  alias:\n    \"@z\": ./zeta\n    \"@a\": ./alpha\n",
        )
        .unwrap();

        let table = AliasTable::read(&ResolverSettings::default(), dir.path()).unwrap();
        let patterns: Vec<_> = table.entries().iter().map(|e| e.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["@z", "@a"]);
    }

    #[test]
    fn test_explicit_path_takes_precedence() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("webpack.config.json"),
            r#"{"resolve": {"alias": {"@default": "./d"}}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("aliases.json"),
            r#"{"resolve": {"alias": {"@explicit": "./e"}}}"#,
        )
        .unwrap();

        let settings = ResolverSettings {
            config_path: Some(PathBuf::from("aliases.json")),
            ..Default::default()
        };
        let table = AliasTable::read(&settings, dir.path()).unwrap();
        assert_eq!(table.entries()[0].pattern, "@explicit");
    }
}
