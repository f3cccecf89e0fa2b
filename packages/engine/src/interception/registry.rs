// packages/engine/src/interception/registry.rs
//! Mock registry
//!
//! Maps module keys to mock descriptors. Every descriptor is owned by the
//! scope frame it was registered in; lookups walk from the innermost frame
//! outward, so an inner registration shadows an outer one for the inner
//! scope's lifetime.

use crate::interception::scope::{ScopeFrame, ScopeId, ScopeSnapshot, ScopeStack};
use crate::module::exports::{Export, Exports};
use crate::module::key::ModuleKey;
use crate::utils::errors::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a mock's exports come from
#[derive(Clone)]
pub enum MockSource {
    /// Fixed exports
    Static(Exports),

    /// Built on first consumption within a session
    Factory(Arc<dyn Fn() -> Exports + Send + Sync>),

    /// Another real module stands in for the mocked one
    Redirect(ModuleKey),
}

impl fmt::Debug for MockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(exports) => f.debug_tuple("Static").field(exports).finish(),
            Self::Factory(_) => f.write_str("Factory"),
            Self::Redirect(key) => f.debug_tuple("Redirect").field(key).finish(),
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::Static(Exports::new())
    }
}

/// Registered replacement plus its usage and validation policy
#[derive(Debug, Clone)]
pub struct MockDescriptor {
    /// Mocked module
    pub key: ModuleKey,

    /// Replacement exports
    pub source: MockSource,

    /// Replaces only the `default` export of whatever `source` yields
    pub default_override: Option<Export>,

    /// Real exports overlaid with the mock's exports
    pub call_through: bool,

    /// Scope close fails unless the mock was consulted
    pub required_use: bool,

    /// Shape-check against the real module at consumption
    pub validate_shape: bool,

    /// Disabled descriptors are invisible to lookups
    pub enabled: bool,

    usage: u32,

    /// Exports built for the current session
    pub(crate) materialized: Option<Exports>,
}

impl MockDescriptor {
    pub fn new(key: ModuleKey) -> Self {
        Self {
            key,
            source: MockSource::default(),
            default_override: None,
            call_through: false,
            required_use: false,
            validate_shape: false,
            enabled: true,
            usage: 0,
            materialized: None,
        }
    }

    /// How many loads consulted this descriptor
    pub fn usage_count(&self) -> u32 {
        self.usage
    }

    pub fn was_used(&self) -> bool {
        self.usage > 0
    }

    pub fn mark_used(&mut self) {
        self.usage += 1;
    }

    /// Drop the materialized exports so the next consumption rebuilds them
    pub fn invalidate(&mut self) {
        self.materialized = None;
    }
}

/// Descriptors removed by a scope close
#[derive(Debug)]
pub struct ClosedScope {
    /// The scope that was asked to close
    pub id: ScopeId,

    /// State captured when `id` opened
    pub snapshot: ScopeSnapshot,

    /// Required-use descriptors never consulted, across all closed frames
    pub unused: Vec<ModuleKey>,

    /// Number of descriptors dropped
    pub dropped: usize,
}

/// Scoped mock registry
#[derive(Debug, Default)]
pub struct MockRegistry {
    scopes: ScopeStack,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for `key` in the innermost frame, created with `init` if
    /// the frame has none
    pub fn register<F>(&mut self, key: ModuleKey, init: F) -> ScopeId
    where
        F: FnOnce(&mut MockDescriptor),
    {
        let frame = self.scopes.current_mut();
        if frame.find(&key).is_none() {
            let mut descriptor = MockDescriptor::new(key.clone());
            init(&mut descriptor);
            debug!("Registered mock for {} in scope {}", key, frame.id);
            frame.descriptors.push(descriptor);
        }
        frame.id
    }

    /// Nearest enabled descriptor for `key`
    pub fn resolve(&self, key: &ModuleKey) -> Option<&MockDescriptor> {
        self.nearest(key).filter(|descriptor| descriptor.enabled)
    }

    /// Nearest enabled descriptor for `key`, mutably
    pub fn resolve_mut(&mut self, key: &ModuleKey) -> Option<&mut MockDescriptor> {
        self.scopes
            .innermost_first_mut()
            .find_map(|frame| frame.find_mut(key))
            .filter(|descriptor| descriptor.enabled)
    }

    /// Nearest descriptor for `key`, enabled or not
    pub fn nearest(&self, key: &ModuleKey) -> Option<&MockDescriptor> {
        self.scopes
            .innermost_first()
            .find_map(|frame| frame.find(key))
    }

    /// Scope owning the nearest descriptor for `key`
    pub fn owner_of(&self, key: &ModuleKey) -> Option<ScopeId> {
        self.scopes
            .innermost_first()
            .find(|frame| frame.find(key).is_some())
            .map(|frame| frame.id)
    }

    /// Descriptor for `key` owned by `scope`
    pub fn descriptor_mut(&mut self, scope: ScopeId, key: &ModuleKey) -> Option<&mut MockDescriptor> {
        self.scopes
            .frame_mut(scope)
            .and_then(|frame| frame.find_mut(key))
    }

    pub fn open_scope(&mut self, snapshot: ScopeSnapshot) -> ScopeId {
        self.scopes.open(snapshot)
    }

    /// Remove `id` and its children with every descriptor they own
    pub fn close_scope(&mut self, id: ScopeId) -> Result<ClosedScope> {
        let frames = self.scopes.close(id)?;

        let mut unused = Vec::new();
        let mut dropped = 0;
        let mut snapshot = None;

        for frame in frames {
            unused.extend(frame.unused_required());
            dropped += frame.descriptors.len() + frame.retired.len();
            if frame.id == id {
                snapshot = frame.snapshot;
            }
        }

        let snapshot = snapshot.unwrap_or_else(|| unreachable!("closed frames include the requested scope"));

        Ok(ClosedScope {
            id,
            snapshot,
            unused,
            dropped,
        })
    }

    /// End of an interception session: retire every descriptor so no later
    /// session resolves it, and release the base frame
    ///
    /// Returns the base frame's required-use descriptors that were never
    /// consulted. Scoped frames keep their retired descriptors until close.
    pub fn retire_session(&mut self) -> Vec<ModuleKey> {
        for frame in self.scopes.innermost_first_mut() {
            frame.retire();
        }

        let base: &mut ScopeFrame = self.scopes.base_mut();
        let unused = base.unused_required();
        if !unused.is_empty() {
            warn!("Session ended with {} unused required mocks", unused.len());
        }
        base.retired.clear();

        unused
    }

    pub fn current_scope(&self) -> ScopeId {
        self.scopes.current().id
    }

    pub fn is_open(&self, id: ScopeId) -> bool {
        self.scopes.is_open(id)
    }

    /// Number of open scopes
    pub fn depth(&self) -> usize {
        self.scopes.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::plugins::PluginChain;
    use serde_json::json;

    fn snapshot() -> ScopeSnapshot {
        ScopeSnapshot {
            was_enabled: false,
            plugins: PluginChain::new(),
        }
    }

    fn with_value(value: i64) -> impl FnOnce(&mut MockDescriptor) {
        move |descriptor| {
            descriptor.source = MockSource::Static(Exports::builder().default_value(value).build());
        }
    }

    fn default_of(descriptor: &MockDescriptor) -> serde_json::Value {
        match &descriptor.source {
            MockSource::Static(exports) => exports.value("default").cloned().unwrap_or_default(),
            _ => serde_json::Value::Null,
        }
    }

    #[test]
    fn test_inner_registration_shadows_outer() {
        let mut registry = MockRegistry::new();
        let key = ModuleKey::path("/proj/b.js");
        registry.register(key.clone(), with_value(1));

        let scope = registry.open_scope(snapshot());
        registry.register(key.clone(), with_value(2));
        assert_eq!(default_of(registry.resolve(&key).unwrap()), json!(2));
        assert_eq!(registry.owner_of(&key), Some(scope));

        registry.close_scope(scope).unwrap();
        assert_eq!(default_of(registry.resolve(&key).unwrap()), json!(1));
        assert_eq!(registry.owner_of(&key), Some(ScopeId::BASE));
    }

    #[test]
    fn test_scoped_descriptor_gone_after_close() {
        let mut registry = MockRegistry::new();
        let key = ModuleKey::path("/proj/b.js");

        let scope = registry.open_scope(snapshot());
        registry.register(key.clone(), |_| {});
        assert!(registry.resolve(&key).is_some());

        let closed = registry.close_scope(scope).unwrap();
        assert_eq!(closed.dropped, 1);
        assert!(registry.resolve(&key).is_none());
    }

    #[test]
    fn test_register_twice_keeps_first() {
        let mut registry = MockRegistry::new();
        let key = ModuleKey::path("/proj/b.js");
        registry.register(key.clone(), with_value(1));
        registry.register(key.clone(), with_value(2));

        assert_eq!(default_of(registry.resolve(&key).unwrap()), json!(1));
    }

    #[test]
    fn test_disabled_descriptor_does_not_resolve() {
        let mut registry = MockRegistry::new();
        let key = ModuleKey::path("/proj/b.js");
        registry.register(key.clone(), |descriptor| descriptor.enabled = false);

        assert!(registry.resolve(&key).is_none());
        assert!(registry.resolve_mut(&key).is_none());
        assert!(registry.nearest(&key).is_some());
    }

    #[test]
    fn test_close_reports_unused_required() {
        let mut registry = MockRegistry::new();
        let used = ModuleKey::path("/proj/used.js");
        let unused = ModuleKey::path("/proj/unused.js");

        let outer = registry.open_scope(snapshot());
        registry.register(used.clone(), |descriptor| descriptor.required_use = true);
        registry.open_scope(snapshot());
        registry.register(unused.clone(), |descriptor| descriptor.required_use = true);

        registry.resolve_mut(&used).unwrap().mark_used();

        let closed = registry.close_scope(outer).unwrap();
        assert_eq!(closed.unused, vec![unused]);
        assert_eq!(registry.depth(), 0);
    }

    #[test]
    fn test_retire_session_hides_everything() {
        let mut registry = MockRegistry::new();
        let base_key = ModuleKey::path("/proj/base.js");
        let scoped_key = ModuleKey::path("/proj/scoped.js");

        registry.register(base_key.clone(), |descriptor| descriptor.required_use = true);
        let scope = registry.open_scope(snapshot());
        registry.register(scoped_key.clone(), |descriptor| descriptor.required_use = true);

        let unused = registry.retire_session();
        assert_eq!(unused, vec![base_key.clone()]);
        assert!(registry.resolve(&base_key).is_none());
        assert!(registry.resolve(&scoped_key).is_none());

        // scoped frames still answer for their required mocks at close
        let closed = registry.close_scope(scope).unwrap();
        assert_eq!(closed.unused, vec![scoped_key]);
    }
}
