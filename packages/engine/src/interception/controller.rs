// packages/engine/src/interception/controller.rs
//! Interception controller
//!
//! Owns the interception session, the scope stack and the module cache.
//! While a session is active every load is routed through the decision
//! pipeline:
//!
//! ```text
//! specifier ──▶ SpecifierResolver ──▶ MockRegistry ──▶ PluginChain
//!                                          │                │
//!                                          │          Mock  │  Real
//!                                          ▼                ▼
//!                                     materialize      ModuleCache ──▶ ModuleLoader
//! ```
//!
//! Outside a session the controller behaves like the plain module system:
//! loads hit the cache, then the real loader.

use crate::interception::handle::{MockHandle, MockTarget};
use crate::interception::plugins::{Decision, Plugin, PluginChain, PluginRequest};
use crate::interception::registry::{MockRegistry, MockSource};
use crate::interception::scope::{ScopeId, ScopeSnapshot};
use crate::interception::validator::ExportValidator;
use crate::module::cache::{CachedModule, ModuleCache};
use crate::module::exports::Exports;
use crate::module::key::ModuleKey;
use crate::module::loader::{ModuleLoader, Require};
use crate::module::request::{LoadRequest, PendingImport};
use crate::observability::{self, LoadOutcome};
use crate::resolver::{AliasTable, SpecifierResolver};
use crate::utils::config::{EngineConfig, InterceptionConfig};
use crate::utils::errors::{EngineError, Result};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State of one enabled period
struct Session {
    /// Cache content when the session started
    snapshot: Vec<CachedModule>,

    /// Every key routed during the session and how it was satisfied
    loaded: BTreeMap<ModuleKey, LoadOutcome>,
}

/// Interception controller
pub struct Controller {
    /// Real module loader
    loader: Arc<dyn ModuleLoader>,

    /// Specifier normalization
    resolver: SpecifierResolver,

    /// Descriptor defaults
    config: InterceptionConfig,

    /// Virtual path of the test harness
    harness: PathBuf,

    /// Active plugin chain
    plugins: PluginChain,

    /// Scoped mock descriptors
    registry: MockRegistry,

    /// Loaded-module cache
    cache: ModuleCache,

    validator: ExportValidator,

    /// `Some` while interception is enabled
    session: Option<Session>,

    /// Keys whose bodies are currently executing, outermost first
    loading: Vec<ModuleKey>,
}

impl Controller {
    /// Create a disabled controller
    pub fn new(
        loader: Arc<dyn ModuleLoader>,
        resolver: SpecifierResolver,
        config: InterceptionConfig,
        harness: impl Into<PathBuf>,
    ) -> Self {
        let plugins = PluginChain::from_builtins(&config.plugins);

        Self {
            loader,
            resolver,
            config,
            harness: harness.into(),
            plugins,
            registry: MockRegistry::new(),
            cache: ModuleCache::new(),
            validator: ExportValidator::new(),
            session: None,
            loading: Vec::new(),
        }
    }

    /// Create a controller from layered engine settings
    ///
    /// The alias config is optional when only the default candidate names
    /// are configured; an explicit `config_path` must exist.
    pub fn from_engine_config(loader: Arc<dyn ModuleLoader>, config: &EngineConfig) -> Result<Self> {
        let cwd = std::env::current_dir()?;

        let aliases = match AliasTable::read(&config.resolver, &cwd) {
            Ok(table) => table,
            Err(EngineError::ConfigError { candidates }) if config.resolver.config_path.is_none() => {
                debug!("No alias config among {:?}, resolving without aliases", candidates);
                AliasTable::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self::new(
            loader,
            SpecifierResolver::new(aliases),
            config.interception.clone(),
            config.resolver.harness.clone(),
        ))
    }

    // ----- session -----

    /// Start an interception session
    ///
    /// The current cache is snapshotted and emptied so every module loaded
    /// during the session runs through the pipeline.
    pub fn enable(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(EngineError::AlreadyEnabled);
        }

        let snapshot = self.cache.snapshot();
        self.cache.clear();

        info!("Interception enabled ({} modules snapshotted)", snapshot.len());
        observability::record_session_started();

        self.session = Some(Session {
            snapshot,
            loaded: BTreeMap::new(),
        });

        Ok(())
    }

    /// End the interception session
    ///
    /// Every descriptor is retired, every module loaded during the session
    /// is invalidated and the cache is restored to its pre-session content.
    /// Unused required mocks registered outside any scope are reported after
    /// teardown completes.
    pub fn disable(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(EngineError::NotEnabled)?;

        let unused = self.registry.retire_session();

        let mut invalidated = 0;
        for key in session.loaded.keys() {
            self.loader.invalidate(key);
            invalidated += 1;
        }
        self.cache.restore(session.snapshot);

        info!("Interception disabled ({} modules invalidated)", invalidated);

        if unused.is_empty() {
            Ok(())
        } else {
            Err(unused_mock(unused))
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    /// How `key` was satisfied during the current session
    pub fn loaded_as(&self, key: &ModuleKey) -> Option<LoadOutcome> {
        self.session
            .as_ref()
            .and_then(|session| session.loaded.get(key).copied())
    }

    // ----- registration -----

    /// Register (or reopen) the mock for `target` in the innermost scope
    pub fn mock(&mut self, target: impl Into<MockTarget>) -> MockHandle<'_> {
        let key = self.target_key(target.into());

        let require_use = self.config.require_use_by_default;
        let match_origin = self.config.match_origin_by_default;
        let scope = self.registry.register(key.clone(), |descriptor| {
            descriptor.required_use = require_use;
            descriptor.validate_shape = match_origin;
        });
        self.evict(&key);

        MockHandle::new(self, key, scope)
    }

    /// Handle for the nearest descriptor registered for `target`
    pub fn get_mock(&mut self, target: impl Into<MockTarget>) -> Option<MockHandle<'_>> {
        let key = self.target_key(target.into());
        let scope = self.registry.owner_of(&key)?;
        Some(MockHandle::new(self, key, scope))
    }

    pub(crate) fn registry_mut(&mut self) -> &mut MockRegistry {
        &mut self.registry
    }

    fn target_key(&self, target: MockTarget) -> ModuleKey {
        match target {
            MockTarget::Specifier(specifier) => self.key_for(&specifier),
            MockTarget::Pending(pending) => self.key_for_request(pending.request()),
            MockTarget::Importer(importer) => {
                let pending = importer(self);
                self.key_for_request(pending.request())
            }
        }
    }

    // ----- plugins -----

    /// Append a plugin to the chain
    pub fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        debug!("Adding plugin {}", plugin.name());
        self.plugins.push(plugin);
    }

    /// Insert a plugin ahead of the chain
    pub fn prepend_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        debug!("Prepending plugin {}", plugin.name());
        self.plugins.prepend(plugin);
    }

    pub fn clear_plugins(&mut self) {
        self.plugins.clear();
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.names()
    }

    // ----- scopes -----

    /// Open a nested scope
    pub fn open_scope(&mut self) -> ScopeId {
        let snapshot = ScopeSnapshot {
            was_enabled: self.is_enabled(),
            plugins: self.plugins.clone(),
        };
        self.registry.open_scope(snapshot)
    }

    /// Close `scope` and every scope opened inside it
    ///
    /// Descriptors owned by the closed scopes are dropped, modules loaded
    /// under them are evicted and invalidated, and the plugin chain and
    /// enable state captured at open are restored. Fails with `UnusedMock`
    /// after all of that when a required mock was never consulted.
    pub fn close_scope(&mut self, scope: ScopeId) -> Result<()> {
        let closed = self.registry.close_scope(scope)?;

        let evicted = self.cache.evict_scope(scope);
        for key in &evicted {
            self.loader.invalidate(key);
        }

        self.plugins = closed.snapshot.plugins;

        let mut unused: Vec<String> = closed.unused.iter().map(ModuleKey::to_string).collect();
        match (closed.snapshot.was_enabled, self.is_enabled()) {
            (true, false) => self.enable()?,
            (false, true) => match self.disable() {
                Err(EngineError::UnusedMock { keys }) => {
                    warn!("Scope {} ended a session with unused mocks", scope);
                    unused.extend(keys);
                }
                other => other?,
            },
            _ => {}
        }

        info!(
            "Closed scope {} ({} descriptors dropped, {} modules evicted)",
            scope,
            closed.dropped,
            evicted.len()
        );
        observability::record_scope_closed(unused.is_empty());

        if unused.is_empty() {
            Ok(())
        } else {
            Err(EngineError::UnusedMock { keys: unused })
        }
    }

    /// Run `body` inside a new scope that is closed on every exit path
    ///
    /// A body error takes precedence over a close error. Panics propagate
    /// after the scope is closed.
    pub fn with_scope<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Controller) -> Result<T>,
    {
        let scope = self.open_scope();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *self)));
        let closed = self.close_scope(scope);

        match outcome {
            Ok(result) => {
                let value = result?;
                closed?;
                Ok(value)
            }
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        self.registry.current_scope()
    }

    // ----- loading -----

    /// Load `specifier` from the test harness
    pub fn load(&mut self, specifier: &str) -> Result<Exports> {
        let request = LoadRequest::from_harness(specifier);
        self.route(&request).map(|(_, exports)| exports)
    }

    /// Issue a deferred harness-level import
    ///
    /// Nothing is resolved or decided until [`settle`](Self::settle).
    pub fn import(&self, specifier: &str) -> PendingImport {
        PendingImport::new(LoadRequest::from_harness(specifier))
    }

    /// Resolve a deferred import against the registry as it is now
    pub fn settle(&mut self, pending: PendingImport) -> Result<Exports> {
        debug!("Settling deferred import of {}", pending.specifier());
        let request = pending.into_request();
        self.route(&request).map(|(_, exports)| exports)
    }

    /// Key the harness would load for `specifier`
    pub fn key_for(&self, specifier: &str) -> ModuleKey {
        self.resolver.resolve(specifier, &self.harness, &*self.loader)
    }

    pub(crate) fn key_for_request(&self, request: &LoadRequest) -> ModuleKey {
        let referrer = request
            .requesting
            .as_ref()
            .and_then(ModuleKey::as_path)
            .unwrap_or(self.harness.as_path());
        self.resolver.resolve(&request.specifier, referrer, &*self.loader)
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Drop `key` and every cached module that depends on it
    ///
    /// The next load of any of them executes again against the registry as
    /// it is then.
    pub fn evict(&mut self, key: &ModuleKey) {
        let evicted = self.cache.evict_dependents(key);
        for stale in &evicted {
            self.loader.invalidate(stale);
        }
        if !evicted.is_empty() {
            debug!("Evicted {} cached modules depending on {}", evicted.len(), key);
        }
    }

    /// Run one request through the pipeline
    fn route(&mut self, request: &LoadRequest) -> Result<(ModuleKey, Exports)> {
        let key = self.key_for_request(request);

        if self.is_enabled() && self.decide(request, &key) == Decision::Mock {
            let exports = self.materialize(&key)?;
            self.track(&key, LoadOutcome::Mocked);
            return Ok((key, exports));
        }

        let exports = self.load_real(&key, request)?;
        Ok((key, exports))
    }

    fn decide(&self, request: &LoadRequest, key: &ModuleKey) -> Decision {
        let Some(descriptor) = self.registry.resolve(key) else {
            return Decision::Real;
        };

        let decision = self.plugins.evaluate(&PluginRequest {
            specifier: &request.specifier,
            key,
            requesting: request.requesting.as_ref(),
            root: request.root.as_ref(),
            mock: Some(descriptor),
        });

        debug!(
            "Mock for {} requested by {} -> {:?}",
            key,
            request
                .requesting
                .as_ref()
                .map(ModuleKey::to_string)
                .unwrap_or_else(|| "harness".to_string()),
            decision
        );

        decision
    }

    /// Resolve the mock's exports for this session, consulting the descriptor
    fn materialize(&mut self, key: &ModuleKey) -> Result<Exports> {
        let (source, default_override, call_through, validate_shape) = {
            let descriptor = self
                .registry
                .resolve_mut(key)
                .ok_or_else(|| EngineError::module_not_found(key.to_string()))?;
            descriptor.mark_used();

            if let Some(exports) = &descriptor.materialized {
                observability::record_load(LoadOutcome::Mocked);
                return Ok(exports.clone());
            }

            (
                descriptor.source.clone(),
                descriptor.default_override.clone(),
                descriptor.call_through,
                descriptor.validate_shape,
            )
        };

        let mut exports = match source {
            MockSource::Static(exports) => exports,
            MockSource::Factory(factory) => factory(),
            MockSource::Redirect(target) => self.load_origin(&target)?,
        };

        if let Some(default) = default_override {
            exports = exports.with_entry("default", default);
        }

        if validate_shape || call_through {
            let real = self.load_origin(key)?;

            if validate_shape {
                if let Err(e) = self.validator.validate(key, &exports, &real) {
                    observability::record_validation_failure();
                    return Err(e);
                }
            }

            if call_through {
                exports = real.overlay(&exports);
            }
        }

        if let Some(descriptor) = self.registry.resolve_mut(key) {
            descriptor.materialized = Some(exports.clone());
        }

        observability::record_load(LoadOutcome::Mocked);
        Ok(exports)
    }

    /// Load through the cache and the real loader
    fn load_real(&mut self, key: &ModuleKey, request: &LoadRequest) -> Result<Exports> {
        if let Some(cached) = self.cache.get(key) {
            observability::record_load(LoadOutcome::Cached);
            return Ok(cached.exports);
        }

        // A harness-level load makes the loaded module the root of its chain
        let root = request.root.clone().unwrap_or_else(|| key.clone());
        let (exports, children) = self.execute(key, root, false)?;

        self.cache.set(CachedModule {
            key: key.clone(),
            exports: exports.clone(),
            parent: request.requesting.clone(),
            children,
            scope: self.registry.current_scope(),
        });
        self.track(key, LoadOutcome::Real);

        observability::record_load(LoadOutcome::Real);
        Ok(exports)
    }

    /// Load the real module, bypassing mocks and the cache for it and for
    /// everything it requires
    fn load_origin(&mut self, key: &ModuleKey) -> Result<Exports> {
        debug!("Loading origin of {}", key);
        self.execute(key, key.clone(), true).map(|(exports, _)| exports)
    }

    fn execute(&mut self, key: &ModuleKey, root: ModuleKey, bypass: bool) -> Result<(Exports, Vec<ModuleKey>)> {
        if self.loading.contains(key) {
            return Err(EngineError::CircularDependency(key.to_string()));
        }

        self.loading.push(key.clone());
        let loader = Arc::clone(&self.loader);

        let mut context = RequireContext {
            controller: &mut *self,
            key: key.clone(),
            root,
            children: Vec::new(),
            bypass,
        };
        let result = loader.load(key, &mut context);
        let children = context.children;

        self.loading.pop();
        result.map(|exports| (exports, children))
    }

    fn track(&mut self, key: &ModuleKey, outcome: LoadOutcome) {
        if let Some(session) = self.session.as_mut() {
            session.loaded.insert(key.clone(), outcome);
        }
    }
}

fn unused_mock(keys: Vec<ModuleKey>) -> EngineError {
    EngineError::UnusedMock {
        keys: keys.iter().map(ModuleKey::to_string).collect(),
    }
}

/// [`Require`] handed to a module body while it executes
struct RequireContext<'c> {
    controller: &'c mut Controller,
    key: ModuleKey,
    root: ModuleKey,
    children: Vec<ModuleKey>,
    bypass: bool,
}

impl RequireContext<'_> {
    fn request(&self, specifier: &str) -> LoadRequest {
        LoadRequest::from_module(specifier, self.key.clone(), self.root.clone())
    }

    fn load(&mut self, request: LoadRequest) -> Result<Exports> {
        if self.bypass {
            let key = self.controller.key_for_request(&request);
            let exports = self.controller.load_origin(&key)?;
            self.children.push(key);
            return Ok(exports);
        }

        let (key, exports) = self.controller.route(&request)?;
        self.children.push(key);
        Ok(exports)
    }
}

impl Require for RequireContext<'_> {
    fn require(&mut self, specifier: &str) -> Result<Exports> {
        let request = self.request(specifier);
        self.load(request)
    }

    fn import(&self, specifier: &str) -> PendingImport {
        PendingImport::new(self.request(specifier))
    }

    fn settle(&mut self, pending: PendingImport) -> Result<Exports> {
        self.load(pending.into_request())
    }

    fn key(&self) -> &ModuleKey {
        &self.key
    }
}
