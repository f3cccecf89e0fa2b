// packages/engine/src/module/request.rs
//! Load requests and deferred imports

use crate::module::key::ModuleKey;

/// One load attempt, as seen by the decision pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Specifier exactly as written by the requesting module
    pub specifier: String,

    /// Module issuing the request (`None` for the test harness)
    pub requesting: Option<ModuleKey>,

    /// Module under test for this load chain (`None` when the harness
    /// itself issues the request)
    pub root: Option<ModuleKey>,
}

impl LoadRequest {
    /// Request issued directly by the test harness
    pub fn from_harness(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            requesting: None,
            root: None,
        }
    }

    /// Request issued by a module body
    pub fn from_module(specifier: impl Into<String>, requesting: ModuleKey, root: ModuleKey) -> Self {
        Self {
            specifier: specifier.into(),
            requesting: Some(requesting),
            root: Some(root),
        }
    }
}

/// Import issued now and resolved later
///
/// Nothing is decided when the import is issued: the full pipeline runs
/// when it settles, against the registry state at that moment. A mock
/// registered between issue and settle applies; a scope closed in between
/// no longer does.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending import does nothing until it is settled"]
pub struct PendingImport {
    request: LoadRequest,
}

impl PendingImport {
    pub fn new(request: LoadRequest) -> Self {
        Self { request }
    }

    pub fn specifier(&self) -> &str {
        &self.request.specifier
    }

    pub fn request(&self) -> &LoadRequest {
        &self.request
    }

    pub fn into_request(self) -> LoadRequest {
        self.request
    }
}
