// packages/engine/src/interception/mod.rs
//! Module-load interception layer
//!
//! This module decides, for every load request, whether a dependency is
//! satisfied by a registered mock or by the real module:
//!
//! - **Controller**: Session switch and the decision pipeline
//! - **Plugins**: Ordered mocking policies (`child_only`, `any_place`, ...)
//! - **Registry**: Mock descriptors keyed by module, owned by scopes
//! - **Scope**: Nested registration lifetimes
//! - **Validator**: Mock-vs-origin export shape checks
//! - **Handle**: Fluent descriptor configuration
//! - **Rewire**: Async harness surface
//!
//! # Architecture
//!
//! ```text
//! Module under test (unmodified)
//!     │
//!     └─ require("./dep") → Controller → PluginChain → MockRegistry → mock exports
//!                               │
//!                               └──────────────────────────────────→ real module
//! ```

pub mod controller;
pub mod handle;
pub mod plugins;
pub mod registry;
pub mod rewire;
pub mod scope;
pub mod validator;

// Re-export commonly used types
pub use controller::Controller;
pub use handle::{MockHandle, MockTarget};
pub use plugins::{
    AnyPlace, BuiltinPlugin, ChildOnly, Decision, FnPlugin, Plugin, PluginChain, PluginRequest,
    ProtectExternal, Vote,
};
pub use registry::{ClosedScope, MockDescriptor, MockRegistry, MockSource};
pub use rewire::Rewire;
pub use scope::{ScopeId, ScopeSnapshot};
pub use validator::ExportValidator;
