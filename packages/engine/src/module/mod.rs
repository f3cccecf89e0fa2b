// packages/engine/src/module/mod.rs
//! Module model shared by the resolver and the interception layer
//!
//! - **Key**: Normalized module identity (absolute path or external id)
//! - **Exports**: Export maps with coarse function/value kinds
//! - **Loader**: The black-box loading primitive and the `Require` surface
//!   module bodies use to load their dependencies
//! - **Cache**: Loaded-module cache owned by the controller
//! - **Request**: Load requests and deferred imports
//!
//! # Architecture
//!
//! ```text
//! Module body ── require("./b") ──▶ Require ──▶ Controller ──▶ ModuleLoader
//!                                                   │
//!                                                   └──▶ ModuleCache
//! ```

pub mod cache;
pub mod exports;
pub mod key;
pub mod loader;
pub mod request;

// Re-export commonly used types
pub use cache::{CachedModule, ModuleCache};
pub use exports::{Export, ExportFn, ExportKind, Exports, ExportsBuilder};
pub use key::{normalize_path, ModuleKey};
pub use loader::{
    FileSystem, JsonModuleLoader, ModuleBody, ModuleGraph, ModuleLoader, RealFileSystem, Require,
};
pub use request::{LoadRequest, PendingImport};
