// packages/engine/src/utils/mod.rs
//! Common utilities shared across the engine
//!
//! - **config**: Layered engine configuration
//! - **errors**: Error taxonomy and `Result` alias

pub mod config;
pub mod errors;

pub use self::config::EngineConfig;
pub use errors::{EngineError, Result};
