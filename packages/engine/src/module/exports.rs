// packages/engine/src/module/exports.rs
//! Module export maps
//!
//! Exports are either callable functions or plain JSON values. Shape
//! validation only cares about the coarse [`ExportKind`], never about deep
//! equality.

use crate::utils::errors::{EngineError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callable export
#[derive(Clone)]
pub struct ExportFn(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl ExportFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl fmt::Debug for ExportFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[Function]")
    }
}

/// Coarse kind of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Function,
    Value,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => f.write_str("a function"),
            Self::Value => f.write_str("a value"),
        }
    }
}

/// A single export
#[derive(Debug, Clone)]
pub enum Export {
    Function(ExportFn),
    Value(Value),
}

impl Export {
    /// Function export from a closure
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::Function(ExportFn::new(f))
    }

    /// Plain value export
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn kind(&self) -> ExportKind {
        match self {
            Self::Function(_) => ExportKind::Function,
            Self::Value(_) => ExportKind::Value,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Function(_) => None,
        }
    }
}

impl From<Value> for Export {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ExportFn> for Export {
    fn from(f: ExportFn) -> Self {
        Self::Function(f)
    }
}

/// Exports of a loaded (or mocked) module
///
/// Cloning is cheap; the map is shared and never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    entries: Arc<BTreeMap<String, Export>>,
}

impl Exports {
    /// Module with no exports
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ExportsBuilder {
        ExportsBuilder::default()
    }

    /// Build exports from a JSON document
    ///
    /// Object entries become value exports; any other document becomes the
    /// `default` export.
    pub fn from_json(document: Value) -> Self {
        match document {
            Value::Object(map) => map
                .into_iter()
                .map(|(name, value)| (name, Export::Value(value)))
                .collect(),
            other => Self::builder().default_value(other).build(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.entries.get(name)
    }

    pub fn default_export(&self) -> Option<&Export> {
        self.get("default")
    }

    /// Value of a plain export
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Export::as_value)
    }

    pub fn kind(&self, name: &str) -> Option<ExportKind> {
        self.get(name).map(Export::kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.entries.iter().map(|(name, export)| (name.as_str(), export))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call a function export
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.get(name) {
            Some(Export::Function(f)) => Ok(f.call(args)),
            _ => Err(EngineError::NotCallable(name.to_string())),
        }
    }

    /// Call the `default` export with no arguments
    pub fn call_default(&self) -> Result<Value> {
        self.call("default", &[])
    }

    /// Copy with one export added or replaced
    pub fn with_entry(&self, name: impl Into<String>, export: Export) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(name.into(), export);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Copy of `self` with every export of `overrides` laid on top
    pub fn overlay(&self, overrides: &Exports) -> Self {
        let mut entries = (*self.entries).clone();
        for (name, export) in overrides.entries.iter() {
            entries.insert(name.clone(), export.clone());
        }
        Self {
            entries: Arc::new(entries),
        }
    }
}

impl FromIterator<(String, Export)> for Exports {
    fn from_iter<I: IntoIterator<Item = (String, Export)>>(iter: I) -> Self {
        Self {
            entries: Arc::new(iter.into_iter().collect()),
        }
    }
}

/// Builder for [`Exports`]
#[derive(Debug, Default)]
pub struct ExportsBuilder {
    entries: BTreeMap<String, Export>,
}

impl ExportsBuilder {
    pub fn function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Export::function(f));
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), Export::value(value));
        self
    }

    pub fn export(mut self, name: impl Into<String>, export: Export) -> Self {
        self.entries.insert(name.into(), export);
        self
    }

    pub fn default_function<F>(self, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.function("default", f)
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.value("default", value)
    }

    pub fn build(self) -> Exports {
        Exports {
            entries: Arc::new(self.entries),
        }
    }
}
