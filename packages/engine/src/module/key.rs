// packages/engine/src/module/key.rs
//! Normalized module identity

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Identity of a loadable unit
///
/// Two specifiers the resolver judges equivalent produce the same key, so
/// keys are the unit of caching, mocking and invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleKey {
    /// File module, lexically normalized absolute path
    Path(PathBuf),

    /// External package id (e.g. `lodash`, `@scope/pkg/sub`)
    External(String),
}

impl ModuleKey {
    /// Create a path key, normalizing `.` and `..` segments
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(normalize_path(path.as_ref()))
    }

    /// Create an external package key
    pub fn external(id: impl Into<String>) -> Self {
        Self::External(id.into())
    }

    /// Path of a file module
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::External(_) => None,
        }
    }

    /// Whether this key names an external package
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// Directory relative specifiers requested by this module resolve against
    pub fn dir(&self) -> Option<&Path> {
        self.as_path().and_then(Path::parent)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::External(id) => f.write_str(id),
        }
    }
}

/// Lexically normalize a path (no filesystem access, symlinks untouched)
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_in_normal = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if ends_in_normal {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }

    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }

    normalized
}
