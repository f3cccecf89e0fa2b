// packages/engine/src/interception/validator.rs
//! Export shape validation
//!
//! Structural comparison only: which names exist and whether each one is a
//! function or a plain value. Values are never compared.

use crate::module::exports::Exports;
use crate::module::key::ModuleKey;
use crate::utils::errors::{EngineError, Result};
use tracing::debug;

/// Compares a mock's exports against the real module's
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportValidator;

impl ExportValidator {
    pub fn new() -> Self {
        Self
    }

    /// Describe every disagreement between `mock` and `real`
    ///
    /// A mock may omit real exports; it may not add names the real module
    /// lacks, and shared names must have the same kind.
    pub fn compare(&self, mock: &Exports, real: &Exports) -> Vec<String> {
        let mut problems = Vec::new();

        for (name, export) in mock.iter() {
            match real.kind(name) {
                None => problems.push(format!("export '{}' does not exist in the original module", name)),
                Some(real_kind) if real_kind != export.kind() => problems.push(format!(
                    "export '{}' is {} in the mock but {} in the original module",
                    name,
                    export.kind(),
                    real_kind
                )),
                Some(_) => {}
            }
        }

        problems
    }

    /// Fail with `ExportMismatch` when `mock` disagrees with `real`
    pub fn validate(&self, key: &ModuleKey, mock: &Exports, real: &Exports) -> Result<()> {
        let problems = self.compare(mock, real);
        if problems.is_empty() {
            debug!("Mock for {} matches its origin", key);
            return Ok(());
        }

        Err(EngineError::ExportMismatch {
            key: key.to_string(),
            problems,
        })
    }
}
