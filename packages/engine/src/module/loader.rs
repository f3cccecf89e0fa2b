// packages/engine/src/module/loader.rs
//! Module loading primitive
//!
//! The engine treats loading as a black box: a [`ModuleLoader`] executes a
//! module body for a normalized key and hands the body a [`Require`] through
//! which every dependency load re-enters the interception pipeline.

use crate::module::exports::Exports;
use crate::module::key::{normalize_path, ModuleKey};
use crate::module::request::PendingImport;
use crate::utils::errors::{EngineError, Result};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Backing filesystem consulted for extension probing
pub trait FileSystem {
    fn is_file(&self, path: &Path) -> bool;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Dependency loading surface handed to module bodies
pub trait Require {
    /// Load a dependency synchronously
    fn require(&mut self, specifier: &str) -> Result<Exports>;

    /// Issue a deferred import; it is resolved when settled
    fn import(&self, specifier: &str) -> PendingImport;

    /// Resolve a deferred import against the current registry state
    fn settle(&mut self, pending: PendingImport) -> Result<Exports>;

    /// Key of the module whose body is running
    fn key(&self) -> &ModuleKey;
}

/// Real module loader
pub trait ModuleLoader: FileSystem + Send + Sync {
    /// Execute the body of `key`
    fn load(&self, key: &ModuleKey, require: &mut dyn Require) -> Result<Exports>;

    /// Drop loader-side state for `key` so the next load re-executes it
    fn invalidate(&self, _key: &ModuleKey) {}
}

/// Module body executed by [`ModuleGraph`]
pub type ModuleBody = Arc<dyn Fn(&mut dyn Require) -> Result<Exports> + Send + Sync>;

/// In-memory module graph
///
/// Bodies are registered per key and executed on load. The set of defined
/// path keys doubles as the filesystem for extension probing.
#[derive(Default)]
pub struct ModuleGraph {
    bodies: DashMap<ModuleKey, ModuleBody>,
    executions: DashMap<ModuleKey, usize>,
    invalidations: DashMap<ModuleKey, usize>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a file module
    pub fn define<F>(&self, path: impl AsRef<Path>, body: F) -> &Self
    where
        F: Fn(&mut dyn Require) -> Result<Exports> + Send + Sync + 'static,
    {
        self.define_key(ModuleKey::path(path), body)
    }

    /// Define an external package
    pub fn define_external<F>(&self, id: impl Into<String>, body: F) -> &Self
    where
        F: Fn(&mut dyn Require) -> Result<Exports> + Send + Sync + 'static,
    {
        self.define_key(ModuleKey::external(id), body)
    }

    /// Define a file module with fixed exports and no dependencies
    pub fn define_static(&self, path: impl AsRef<Path>, exports: Exports) -> &Self {
        self.define(path, move |_| Ok(exports.clone()))
    }

    fn define_key<F>(&self, key: ModuleKey, body: F) -> &Self
    where
        F: Fn(&mut dyn Require) -> Result<Exports> + Send + Sync + 'static,
    {
        debug!("Defining module {}", key);
        self.bodies.insert(key, Arc::new(body));
        self
    }

    /// How many times the body of `key` has run
    pub fn execution_count(&self, key: &ModuleKey) -> usize {
        self.executions.get(key).map(|count| *count).unwrap_or(0)
    }

    /// How many times `key` has been invalidated
    pub fn invalidation_count(&self, key: &ModuleKey) -> usize {
        self.invalidations.get(key).map(|count| *count).unwrap_or(0)
    }
}

impl FileSystem for ModuleGraph {
    fn is_file(&self, path: &Path) -> bool {
        self.bodies
            .contains_key(&ModuleKey::Path(normalize_path(path)))
    }
}

impl ModuleLoader for ModuleGraph {
    fn load(&self, key: &ModuleKey, require: &mut dyn Require) -> Result<Exports> {
        // Clone out of the map so nested loads never run under a shard lock
        let body = self
            .bodies
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::module_not_found(key.to_string()))?;

        *self.executions.entry(key.clone()).or_insert(0) += 1;

        body(require)
    }

    fn invalidate(&self, key: &ModuleKey) {
        *self.invalidations.entry(key.clone()).or_insert(0) += 1;
    }
}

/// Loads `.json` files from disk; each top-level entry becomes an export
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModuleLoader;

impl FileSystem for JsonModuleLoader {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

impl ModuleLoader for JsonModuleLoader {
    fn load(&self, key: &ModuleKey, _require: &mut dyn Require) -> Result<Exports> {
        let path = key
            .as_path()
            .ok_or_else(|| EngineError::module_not_found(key.to_string()))?;

        if !path.is_file() {
            return Err(EngineError::module_not_found(key.to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let document: serde_json::Value = serde_json::from_str(&content)?;

        Ok(Exports::from_json(document))
    }
}
