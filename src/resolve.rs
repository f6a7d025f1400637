//! Module name resolution
//!
//! Maps a Python source file to its fully-qualified module name by
//! climbing package directories (directories holding `__init__.py`)
//! until one of the configured search roots is reached.
//!
//! Files that sit outside every search root are treated as free-standing
//! scripts and receive a synthetic `<script:…>` name derived from their
//! path, which can never collide with a dotted module name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// File extension of a unit (module source file)
pub const UNIT_EXTENSION: &str = "py";

/// Stem of the sentinel file that turns a directory into a package
pub const PACKAGE_SENTINEL: &str = "__init__";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Not a python module file: {0}")]
    NotAUnit(PathBuf),
    #[error("No module name found on search path: {0}")]
    NoSearchRoot(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of resolving one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Fully-qualified dotted name (or synthetic script name)
    pub name: String,
    /// Enclosing package, `None` for top-level modules and scripts
    pub package: Option<String>,
}

/// Resolves file paths to module names against an ordered search path
///
/// Results are cached per normalized path; call [`NameResolver::invalidate`]
/// when a unit is reloaded.
#[derive(Debug, Clone)]
pub struct NameResolver {
    search_paths: Vec<PathBuf>,
    standalone: bool,
    cache: HashMap<PathBuf, ResolvedName>,
}

impl NameResolver {
    /// Create a resolver over `search_paths`.
    ///
    /// Entries are normalized; entries that are not existing directories
    /// are dropped (zip archives, eggs and stale entries are ignored).
    pub fn new<I, P>(search_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut roots: Vec<PathBuf> = Vec::new();
        for path in search_paths {
            let path = path.as_ref();
            if !path.is_dir() {
                tracing::debug!(path = %path.display(), "Ignoring search path entry");
                continue;
            }
            let path = normalize_path(path);
            if !roots.contains(&path) {
                roots.push(path);
            }
        }
        Self {
            search_paths: roots,
            standalone: true,
            cache: HashMap::new(),
        }
    }

    /// Refuse free-standing scripts instead of naming them synthetically
    pub fn strict(mut self) -> Self {
        self.standalone = false;
        self
    }

    /// The normalized search roots, in priority order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Drop the cached name for `path`
    pub fn invalidate(&mut self, path: &Path) {
        self.cache.remove(&normalize_path(path));
    }

    /// Resolve `filepath` to its module name and owning package
    pub fn resolve(&mut self, filepath: &Path) -> Result<ResolvedName, ResolveError> {
        let path = normalize_path(filepath);
        if let Some(hit) = self.cache.get(&path) {
            return Ok(hit.clone());
        }
        if !is_unit_file(&path) {
            return Err(ResolveError::NotAUnit(path));
        }

        let resolved = match self.resolve_on_search_path(&path) {
            Some(name) => {
                let package = package_of(&path, &name);
                ResolvedName { name, package }
            }
            None if self.standalone => ResolvedName {
                name: script_name(&path),
                package: None,
            },
            None => return Err(ResolveError::NoSearchRoot(path)),
        };

        tracing::debug!(path = %path.display(), name = %resolved.name, "Resolved module name");
        self.cache.insert(path, resolved.clone());
        Ok(resolved)
    }

    fn resolve_on_search_path(&self, path: &Path) -> Option<String> {
        let dirpath = path.parent()?;
        let stem = path.file_stem()?.to_str()?;

        // A short name found for a file directly inside a package is only
        // a fallback: a deeper root may still yield the qualified name.
        let mut skipped: Option<String> = None;

        'roots: for root in &self.search_paths {
            let mut dir = dirpath;
            let mut name = stem.to_string();

            while dir != root.as_path() {
                if !is_package(dir) {
                    continue 'roots;
                }
                let (Some(parent), Some(segment)) = (dir.parent(), dir.file_name()) else {
                    continue 'roots;
                };
                name = format!("{}.{}", segment.to_string_lossy(), name);
                dir = parent;
            }

            if is_package(dirpath) && !name.contains('.') {
                skipped = Some(name);
                continue;
            }
            return Some(strip_sentinel(name));
        }

        skipped
    }
}

/// Normalize a path to an absolute real path.
///
/// Falls back to a lexical absolute path when the file does not exist
/// (removed files must still map to the key they were registered under).
pub fn normalize_path(path: &Path) -> PathBuf {
    match dunce::canonicalize(path) {
        Ok(p) => p,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Whether `path` names a module source file
pub fn is_unit_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == UNIT_EXTENSION) && path.is_file()
}

/// Whether `dir` is a package directory (contains `__init__.py`)
pub fn is_package(dir: &Path) -> bool {
    dir.join(format!("{PACKAGE_SENTINEL}.{UNIT_EXTENSION}"))
        .is_file()
}

/// Whether `path` is a package sentinel file
pub fn is_package_sentinel(path: &Path) -> bool {
    path.file_stem().is_some_and(|s| s == PACKAGE_SENTINEL)
}

/// Synthetic name for a file outside every search root
pub fn script_name(path: &Path) -> String {
    let hash = blake3::hash(path.as_os_str().as_encoded_bytes());
    format!("<script:{}>", &hash.to_hex()[..16])
}

/// Whether `name` was synthesized by [`script_name`]
pub fn is_script_name(name: &str) -> bool {
    name.starts_with("<script:")
}

/// Split a dotted name into `(parent, last)`.
///
/// ```
/// use modwatch::resolve::split_name;
/// assert_eq!(split_name("a.b.c"), (Some("a.b"), "c"));
/// assert_eq!(split_name("a"), (None, "a"));
/// ```
pub fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, name),
    }
}

/// Resolve a relative import target against the importing package.
///
/// `level` counts leading dots: level 1 is the package itself, level 2 its
/// parent, and so on. Returns `None` when the import climbs above the
/// top-level package or the importer is not inside a package. Non-positive
/// levels are returned unchanged.
pub fn resolve_relative_name(name: &str, package: Option<&str>, level: i32) -> Option<String> {
    if level <= 0 {
        return Some(name.to_string());
    }
    let package = package?;
    let segments: Vec<&str> = package.split('.').collect();
    let up = (level - 1) as usize;
    if up >= segments.len() {
        return None;
    }
    let prefix = segments[..segments.len() - up].join(".");
    if name.is_empty() {
        Some(prefix)
    } else {
        Some(format!("{prefix}.{name}"))
    }
}

fn strip_sentinel(name: String) -> String {
    match name.strip_suffix(&format!(".{PACKAGE_SENTINEL}")) {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

fn package_of(path: &Path, name: &str) -> Option<String> {
    if is_package_sentinel(path) {
        return Some(name.to_string());
    }
    split_name(name).0.map(str::to_string)
}
