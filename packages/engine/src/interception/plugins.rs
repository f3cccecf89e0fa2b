// packages/engine/src/interception/plugins.rs
//! Plugin chain deciding whether a load is mocked
//!
//! Plugins are evaluated in order. `Pass` abstains and defers to the next
//! plugin; the first `Mock` or `Skip` ends the evaluation. When every plugin
//! abstains (or there are none) the load is real.

use crate::interception::registry::MockDescriptor;
use crate::module::key::ModuleKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A plugin's answer for one pending load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// Abstain
    Pass,

    /// Substitute the mock
    Mock,

    /// Force the real module and stop evaluating
    Skip,
}

/// Outcome of a full chain evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Mock,
    Real,
}

/// What a plugin sees of a pending load
#[derive(Debug, Clone, Copy)]
pub struct PluginRequest<'a> {
    /// Specifier as written
    pub specifier: &'a str,

    /// Normalized key of the requested module
    pub key: &'a ModuleKey,

    /// Module issuing the request (`None` for the harness)
    pub requesting: Option<&'a ModuleKey>,

    /// Module under test for this load chain
    pub root: Option<&'a ModuleKey>,

    /// Descriptor registered for `key`, if any
    pub mock: Option<&'a MockDescriptor>,
}

impl PluginRequest<'_> {
    /// Whether the dependency is requested directly by the module under test
    pub fn is_direct_child_of_root(&self) -> bool {
        matches!((self.requesting, self.root), (Some(requesting), Some(root)) if requesting == root)
    }
}

/// Mocking policy
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn should_mock(&self, request: &PluginRequest<'_>) -> Vote;
}

/// Mocks only the direct collaborators of the module under test
///
/// Dependencies of dependencies are loaded for real; the veto stops any
/// plugin registered after this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildOnly;

impl Plugin for ChildOnly {
    fn name(&self) -> &str {
        "child_only"
    }

    fn should_mock(&self, request: &PluginRequest<'_>) -> Vote {
        if request.is_direct_child_of_root() {
            Vote::Mock
        } else {
            Vote::Skip
        }
    }
}

/// Mocks wherever the dependency is requested
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPlace;

impl Plugin for AnyPlace {
    fn name(&self) -> &str {
        "any_place"
    }

    fn should_mock(&self, _request: &PluginRequest<'_>) -> Vote {
        Vote::Mock
    }
}

/// Never mocks dependencies requested from inside an external package
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectExternal;

impl Plugin for ProtectExternal {
    fn name(&self) -> &str {
        "protect_external"
    }

    fn should_mock(&self, request: &PluginRequest<'_>) -> Vote {
        match request.requesting {
            Some(requesting) if requesting.is_external() => Vote::Skip,
            _ => Vote::Pass,
        }
    }
}

/// Plugin backed by a closure
pub struct FnPlugin {
    name: String,
    predicate: Box<dyn Fn(&PluginRequest<'_>) -> Vote + Send + Sync>,
}

impl FnPlugin {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&PluginRequest<'_>) -> Vote + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_mock(&self, request: &PluginRequest<'_>) -> Vote {
        (self.predicate)(request)
    }
}

/// Plugins selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinPlugin {
    ChildOnly,
    AnyPlace,
    ProtectExternal,
}

impl BuiltinPlugin {
    pub fn into_plugin(self) -> Arc<dyn Plugin> {
        match self {
            Self::ChildOnly => Arc::new(ChildOnly),
            Self::AnyPlace => Arc::new(AnyPlace),
            Self::ProtectExternal => Arc::new(ProtectExternal),
        }
    }
}

/// Ordered plugin list
#[derive(Clone, Default)]
pub struct PluginChain {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_builtins(builtins: &[BuiltinPlugin]) -> Self {
        Self {
            plugins: builtins.iter().map(|builtin| builtin.into_plugin()).collect(),
        }
    }

    /// Append a plugin (evaluated after the existing ones)
    pub fn push(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Insert a plugin ahead of the existing ones
    pub fn prepend(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(0, plugin);
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run the chain; the first non-`Pass` vote wins
    pub fn evaluate(&self, request: &PluginRequest<'_>) -> Decision {
        for plugin in &self.plugins {
            match plugin.should_mock(request) {
                Vote::Pass => continue,
                Vote::Mock => return Decision::Mock,
                Vote::Skip => return Decision::Real,
            }
        }

        Decision::Real
    }
}

impl fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
