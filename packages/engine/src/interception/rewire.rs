// packages/engine/src/interception/rewire.rs
//! Async surface over the controller
//!
//! [`Rewire`] is a cloneable handle for harnesses running on tokio. Deferred
//! imports settle only after yielding to the runtime, so anything another
//! task registers in between is taken into account.

use crate::interception::controller::Controller;
use crate::interception::handle::MockTarget;
use crate::module::exports::Exports;
use crate::module::request::PendingImport;
use crate::utils::errors::Result;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared controller handle
#[derive(Clone)]
pub struct Rewire {
    controller: Arc<Mutex<Controller>>,
}

impl Rewire {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    /// Exclusive access to the controller
    ///
    /// The guard must not be held across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Controller> {
        self.controller.lock()
    }

    /// Settle a deferred import after yielding to the runtime
    pub async fn resolve(&self, pending: PendingImport) -> Result<Exports> {
        tokio::task::yield_now().await;
        self.controller.lock().settle(pending)
    }

    /// Import `target` with mocks registered by `setup` in a fresh scope
    ///
    /// The scope opens before `setup` runs and closes once the import has
    /// settled, whatever the outcome. Interception is enabled for the
    /// duration of the scope if it was not already. A cached copy of the
    /// target is evicted first, so the import always executes against the
    /// scope's mocks.
    pub async fn around<F>(&self, target: impl Into<MockTarget>, setup: F) -> Result<Exports>
    where
        F: FnOnce(&mut Controller) -> Result<()>,
    {
        let (scope, pending) = {
            let mut controller = self.controller.lock();
            let scope = controller.open_scope();

            let prepared = setup(&mut *controller).and_then(|()| {
                if !controller.is_enabled() {
                    controller.enable()?;
                }
                let pending = pending_for(&*controller, target.into());
                let key = controller.key_for_request(pending.request());
                controller.evict(&key);
                Ok(pending)
            });

            match prepared {
                Ok(pending) => (scope, pending),
                Err(e) => {
                    if let Err(close) = controller.close_scope(scope) {
                        warn!("Scope {} failed to close after setup error: {}", scope, close);
                    }
                    return Err(e);
                }
            }
        };

        debug!("Scope {} waiting on import of {}", scope, pending.specifier());
        tokio::task::yield_now().await;

        let mut controller = self.controller.lock();
        let loaded = controller.settle(pending);
        let closed = controller.close_scope(scope);

        let exports = loaded?;
        closed?;
        Ok(exports)
    }
}

fn pending_for(controller: &Controller, target: MockTarget) -> PendingImport {
    match target {
        MockTarget::Specifier(specifier) => controller.import(&specifier),
        MockTarget::Pending(pending) => pending,
        MockTarget::Importer(importer) => importer(controller),
    }
}
