// packages/engine/src/resolver/mod.rs
//! Specifier resolution
//!
//! Turns a raw import specifier into a normalized [`ModuleKey`]:
//!
//! - **Alias**: Bundler-style alias tables read from a build config file
//! - **Specifier**: Alias rewrite, relative/absolute resolution and
//!   extension probing
//!
//! [`ModuleKey`]: crate::module::ModuleKey

pub mod alias;
pub mod specifier;

// Re-export commonly used types
pub use alias::{AliasEntry, AliasTable};
pub use specifier::{looks_like_path, SpecifierResolver, DEFAULT_EXTENSIONS};
