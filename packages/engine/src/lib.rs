// packages/engine/src/lib.rs
//! Rewire Engine Library
//!
//! This library substitutes the dependencies of a module under test without
//! touching its source, by intercepting every dependency load and deciding
//! whether a registered mock or the real module satisfies it.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **module**: Module keys, exports, the loader black box and the cache
//! - **resolver**: Alias-aware specifier resolution
//! - **interception**: Session control, plugins, scoped mocks, validation
//! - **observability**: Tracing and metrics
//! - **utils**: Configuration and errors
//!
//! # Example
//!
//! ```
//! use rewire_engine::{Controller, Exports, ModuleGraph, SpecifierResolver};
//! use rewire_engine::utils::config::InterceptionConfig;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let graph = Arc::new(ModuleGraph::new());
//! graph
//!     .define("/app/api.js", |_| Ok(Exports::builder().default_function(|_| json!("live")).build()))
//!     .define("/app/service.js", |require| {
//!         let api = require.require("./api")?;
//!         Ok(Exports::builder().value("answer", api.call_default()?).build())
//!     });
//!
//! let mut controller = Controller::new(
//!     graph,
//!     SpecifierResolver::without_aliases(),
//!     InterceptionConfig::default(),
//!     "/app/__harness__",
//! );
//!
//! controller.enable()?;
//! controller
//!     .mock("./api")
//!     .with(Exports::builder().default_function(|_| json!("mocked")).build())
//!     .to_be_used();
//!
//! let service = controller.load("./service")?;
//! assert_eq!(service.value("answer"), Some(&json!("mocked")));
//! controller.disable()?;
//! # Ok::<(), rewire_engine::EngineError>(())
//! ```

// Public module exports
pub mod interception;
pub mod module;
pub mod observability;
pub mod resolver;
pub mod utils;

// Re-export commonly used types
pub use interception::controller::Controller;
pub use interception::handle::{MockHandle, MockTarget};
pub use interception::rewire::Rewire;
pub use module::exports::{Export, Exports};
pub use module::key::ModuleKey;
pub use module::loader::{ModuleGraph, ModuleLoader, Require};
pub use resolver::{AliasTable, SpecifierResolver};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
