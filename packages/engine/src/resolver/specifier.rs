// packages/engine/src/resolver/specifier.rs
//! Specifier to module key resolution
//!
//! Deterministic rewrite with one precedence order:
//!
//! 1. First alias (declaration order) matching as a path-segment prefix
//! 2. Relative specifiers against the requesting module's directory
//! 3. Absolute specifiers as-is
//! 4. Everything else is an external package id

use crate::module::key::{normalize_path, ModuleKey};
use crate::module::loader::FileSystem;
use crate::resolver::alias::AliasTable;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions probed for non-aliased file specifiers
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".json"];

/// Whether a replacement or specifier denotes a filesystem path rather
/// than a package id (`.`, `..`, `./x`, `../x`, `/x`, `C:\x`)
pub fn looks_like_path(target: &str) -> bool {
    if target == "." || target == ".." {
        return true;
    }
    if target.starts_with("./")
        || target.starts_with(".\\")
        || target.starts_with("../")
        || target.starts_with("..\\")
        || target.starts_with('/')
    {
        return true;
    }

    let bytes = target.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn is_relative(specifier: &str) -> bool {
    looks_like_path(specifier) && !Path::new(specifier).is_absolute() && !specifier.starts_with('/')
}

/// Resolves specifiers into normalized keys
#[derive(Debug, Clone)]
pub struct SpecifierResolver {
    aliases: AliasTable,
    extensions: Vec<String>,
}

impl SpecifierResolver {
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            aliases,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    /// Resolver with an empty alias table
    pub fn without_aliases() -> Self {
        Self::new(AliasTable::new())
    }

    /// Override the extensions probed for non-aliased file specifiers
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Resolve `specifier` as requested by the module at `referrer`
    pub fn resolve<F>(&self, specifier: &str, referrer: &Path, fs: &F) -> ModuleKey
    where
        F: FileSystem + ?Sized,
    {
        let referrer_dir = referrer.parent().unwrap_or_else(|| Path::new("/"));

        if let Some((entry, rest)) = self.aliases.find(specifier) {
            if !looks_like_path(&entry.replacement) {
                debug!("Alias {} -> external {}", entry.pattern, entry.replacement);
                return ModuleKey::external(entry.replacement.clone());
            }

            let mut target = referrer_dir.join(&entry.replacement);
            let rest = rest.trim_start_matches('/');
            if !rest.is_empty() {
                target.push(rest);
            }
            let target = normalize_path(&target);

            let key = match self.aliases.extension_list() {
                Some(extensions) => ModuleKey::Path(append_probe(&target, extensions, fs).unwrap_or(target)),
                None => ModuleKey::Path(target),
            };

            debug!("Alias {} rewrote {} to {}", entry.pattern, specifier, key);
            return key;
        }

        if is_relative(specifier) {
            let target = normalize_path(&referrer_dir.join(specifier));
            return ModuleKey::Path(self.probe(target, fs));
        }

        if Path::new(specifier).is_absolute() || specifier.starts_with('/') {
            let target = normalize_path(Path::new(specifier));
            return ModuleKey::Path(self.probe(target, fs));
        }

        ModuleKey::external(specifier)
    }

    /// Keep an existing file, otherwise try the default extensions
    fn probe<F>(&self, target: PathBuf, fs: &F) -> PathBuf
    where
        F: FileSystem + ?Sized,
    {
        if fs.is_file(&target) {
            return target;
        }
        append_probe(&target, &self.extensions, fs).unwrap_or(target)
    }
}

impl Default for SpecifierResolver {
    fn default() -> Self {
        Self::without_aliases()
    }
}

/// First `target + extension` that exists; empty extensions are skipped
fn append_probe<F>(target: &Path, extensions: &[String], fs: &F) -> Option<PathBuf>
where
    F: FileSystem + ?Sized,
{
    extensions
        .iter()
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            let mut candidate = target.as_os_str().to_owned();
            candidate.push(ext);
            PathBuf::from(candidate)
        })
        .find(|candidate| fs.is_file(candidate))
}
