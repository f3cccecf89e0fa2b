// packages/engine/src/module/cache.rs
//! Loaded-module cache
//!
//! Mirrors the real module system's cache. While interception is enabled the
//! controller owns it exclusively; enabling snapshots it and disabling
//! restores the snapshot wholesale.

use crate::interception::scope::ScopeId;
use crate::module::exports::Exports;
use crate::module::key::ModuleKey;
use dashmap::DashMap;

/// Cached module entry
#[derive(Debug, Clone)]
pub struct CachedModule {
    /// The module's identity
    pub key: ModuleKey,

    /// The module's exports
    pub exports: Exports,

    /// Module that first required this one (`None` for harness loads)
    pub parent: Option<ModuleKey>,

    /// Dependencies this module loaded, in load order
    pub children: Vec<ModuleKey>,

    /// Innermost scope open when the module was loaded
    pub scope: ScopeId,
}

/// Module cache keyed by normalized module key
pub struct ModuleCache {
    cache: DashMap<ModuleKey, CachedModule>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a cached module by key
    pub fn get(&self, key: &ModuleKey) -> Option<CachedModule> {
        self.cache.get(key).map(|entry| entry.clone())
    }

    /// Check if a module is cached
    pub fn has(&self, key: &ModuleKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Add a module to the cache
    pub fn set(&self, module: CachedModule) {
        self.cache.insert(module.key.clone(), module);
    }

    /// Remove a module from the cache
    pub fn delete(&self, key: &ModuleKey) -> Option<CachedModule> {
        self.cache.remove(key).map(|(_, v)| v)
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Remove `key` and every module that required it, directly or through
    /// other cached modules, returning the evicted keys
    pub fn evict_dependents(&self, key: &ModuleKey) -> Vec<ModuleKey> {
        let mut evicted = Vec::new();
        let mut pending = vec![key.clone()];

        while let Some(current) = pending.pop() {
            if self.delete(&current).is_some() {
                evicted.push(current.clone());
            }
            pending.extend(
                self.cache
                    .iter()
                    .filter(|entry| entry.children.contains(&current))
                    .map(|entry| entry.key().clone()),
            );
        }

        evicted
    }

    /// Copy of every entry
    pub fn snapshot(&self) -> Vec<CachedModule> {
        self.cache.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Replace the cache content with a snapshot
    pub fn restore(&self, snapshot: Vec<CachedModule>) {
        self.cache.clear();
        for module in snapshot {
            self.set(module);
        }
    }

    /// Remove every module loaded while `scope` or one of its descendants
    /// was innermost, returning the evicted keys
    pub fn evict_scope(&self, scope: ScopeId) -> Vec<ModuleKey> {
        let stale: Vec<ModuleKey> = self
            .cache
            .iter()
            .filter(|entry| entry.scope >= scope)
            .map(|entry| entry.key().clone())
            .collect();

        for key in &stale {
            self.cache.remove(key);
        }

        stale
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}
