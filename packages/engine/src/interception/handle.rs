// packages/engine/src/interception/handle.rs
//! Registration targets and the fluent mock handle

use crate::interception::controller::Controller;
use crate::interception::registry::{MockDescriptor, MockSource};
use crate::interception::scope::ScopeId;
use crate::module::exports::{Export, Exports};
use crate::module::key::ModuleKey;
use crate::module::request::PendingImport;
use std::fmt;
use std::sync::Arc;

/// Thunk naming a module through a deferred import
pub type Importer = Box<dyn FnOnce(&Controller) -> PendingImport + Send>;

/// What a mock is registered for
pub enum MockTarget {
    /// Specifier resolved from the harness
    Specifier(String),

    /// Specifier and context of an already issued import
    Pending(PendingImport),

    /// Issues an import only to learn which module it names; nothing loads
    Importer(Importer),
}

impl MockTarget {
    pub fn importer<F>(importer: F) -> Self
    where
        F: FnOnce(&Controller) -> PendingImport + Send + 'static,
    {
        Self::Importer(Box::new(importer))
    }
}

impl fmt::Debug for MockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Specifier(specifier) => f.debug_tuple("Specifier").field(specifier).finish(),
            Self::Pending(pending) => f.debug_tuple("Pending").field(pending).finish(),
            Self::Importer(_) => f.write_str("Importer"),
        }
    }
}

impl From<&str> for MockTarget {
    fn from(specifier: &str) -> Self {
        Self::Specifier(specifier.to_string())
    }
}

impl From<String> for MockTarget {
    fn from(specifier: String) -> Self {
        Self::Specifier(specifier)
    }
}

impl From<PendingImport> for MockTarget {
    fn from(pending: PendingImport) -> Self {
        Self::Pending(pending)
    }
}

/// Fluent access to one registered descriptor
///
/// Every mutation drops the descriptor's materialized exports, so the next
/// consumption rebuilds them.
pub struct MockHandle<'c> {
    controller: &'c mut Controller,
    key: ModuleKey,
    scope: ScopeId,
}

impl<'c> MockHandle<'c> {
    pub(crate) fn new(controller: &'c mut Controller, key: ModuleKey, scope: ScopeId) -> Self {
        Self {
            controller,
            key,
            scope,
        }
    }

    fn update<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut MockDescriptor),
    {
        if let Some(descriptor) = self
            .controller
            .registry_mut()
            .descriptor_mut(self.scope, &self.key)
        {
            f(descriptor);
            descriptor.invalidate();
        }
        self
    }

    /// Replace the module with fixed exports
    pub fn with(self, exports: Exports) -> Self {
        self.update(|descriptor| descriptor.source = MockSource::Static(exports))
    }

    /// Replace the module with exports built on first consumption
    pub fn with_factory<F>(self, factory: F) -> Self
    where
        F: Fn() -> Exports + Send + Sync + 'static,
    {
        self.update(|descriptor| descriptor.source = MockSource::Factory(Arc::new(factory)))
    }

    /// Replace only the `default` export
    pub fn with_default(self, export: impl Into<Export>) -> Self {
        let export = export.into();
        self.update(|descriptor| descriptor.default_override = Some(export))
    }

    /// Substitute another real module, resolved from the harness
    pub fn by(self, specifier: &str) -> Self {
        let target = self.controller.key_for(specifier);
        self.update(|descriptor| descriptor.source = MockSource::Redirect(target))
    }

    /// Lay the mock over the real module's exports
    pub fn call_through(self) -> Self {
        self.update(|descriptor| descriptor.call_through = true)
    }

    /// Fail the owning scope's close unless the mock is consumed
    pub fn to_be_used(self) -> Self {
        self.update(|descriptor| descriptor.required_use = true)
    }

    /// Shape-check against the real module when consumed
    pub fn to_match_origin(self) -> Self {
        self.update(|descriptor| descriptor.validate_shape = true)
    }

    pub fn disable(self) -> Self {
        self.update(|descriptor| descriptor.enabled = false)
    }

    pub fn enable(self) -> Self {
        self.update(|descriptor| descriptor.enabled = true)
    }

    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    /// Scope owning the descriptor
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Snapshot of the descriptor
    pub fn descriptor(&mut self) -> Option<MockDescriptor> {
        self.controller
            .registry_mut()
            .descriptor_mut(self.scope, &self.key)
            .map(|descriptor| descriptor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::plugins::BuiltinPlugin;
    use crate::module::loader::ModuleGraph;
    use crate::resolver::SpecifierResolver;
    use crate::utils::config::InterceptionConfig;
    use serde_json::json;

    fn controller() -> Controller {
        let graph = Arc::new(ModuleGraph::new());
        graph.define_static("/proj/b.js", Exports::builder().default_value(1).build());
        Controller::new(
            graph,
            SpecifierResolver::without_aliases(),
            InterceptionConfig::with_plugin(BuiltinPlugin::AnyPlace),
            "/proj/__harness__",
        )
    }

    #[test]
    fn test_builder_sets_flags() {
        let mut controller = controller();
        let mut handle = controller
            .mock("./b")
            .to_be_used()
            .to_match_origin()
            .call_through()
            .disable();

        assert_eq!(handle.key(), &ModuleKey::path("/proj/b.js"));
        assert_eq!(handle.scope(), ScopeId::BASE);

        let descriptor = handle.descriptor().unwrap();
        assert!(descriptor.required_use);
        assert!(descriptor.validate_shape);
        assert!(descriptor.call_through);
        assert!(!descriptor.enabled);
    }

    #[test]
    fn test_registering_twice_returns_same_descriptor() {
        let mut controller = controller();
        controller.mock("./b").to_be_used();

        let descriptor = controller.mock("./b.js").descriptor().unwrap();
        assert!(descriptor.required_use);
    }

    #[test]
    fn test_mutation_drops_materialized() {
        let mut controller = controller();
        controller.enable().unwrap();
        controller.mock("./b").with(Exports::builder().default_value(2).build());
        assert_eq!(controller.load("./b").unwrap().value("default"), Some(&json!(2)));

        controller
            .get_mock("./b")
            .unwrap()
            .with(Exports::builder().default_value(3).build());
        assert_eq!(controller.load("./b").unwrap().value("default"), Some(&json!(3)));
        controller.disable().unwrap();
    }

    #[test]
    fn test_target_from_pending_import() {
        let mut controller = controller();
        let pending = controller.import("./b");

        let handle = controller.mock(pending);
        assert_eq!(handle.key(), &ModuleKey::path("/proj/b.js"));
    }

    #[test]
    fn test_target_debug() {
        assert_eq!(format!("{:?}", MockTarget::from("./b")), "Specifier(\"./b\")");
        assert_eq!(
            format!("{:?}", MockTarget::importer(|controller| controller.import("./b"))),
            "Importer"
        );
    }
}
