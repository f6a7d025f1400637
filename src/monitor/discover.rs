//! Discovery of unit files under the watched roots

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::resolve::{is_unit_file, normalize_path};

/// Directory names never descended into, besides hidden ones
const SKIPPED_NAMES: &[&str] = &["CVS", "__pycache__"];

/// Every unit file under `roots`, normalized, in walk order.
///
/// A root may be a single file. Roots that do not exist are skipped.
/// Symlinked directories are not followed.
pub(crate) fn unit_files(roots: &[PathBuf], ignore: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        if root.is_file() {
            if is_unit_file(root) {
                files.push(normalize_path(root));
            }
            continue;
        }
        if !root.is_dir() {
            tracing::debug!(root = %root.display(), "Skipping missing root");
            continue;
        }

        let ignore = ignore.to_vec();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                entry.depth() == 0 || !is_skipped(entry.file_name(), &ignore)
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if is_unit_file(path) {
                files.push(normalize_path(path));
            }
        }
    }

    files
}

fn is_skipped(name: &std::ffi::OsStr, ignore: &[String]) -> bool {
    let Some(name) = name.to_str() else {
        return false;
    };
    (name.len() > 1 && name.starts_with('.'))
        || SKIPPED_NAMES.contains(&name)
        || ignore.iter().any(|i| i == name)
}

/// Directory used as a default search root for a watched root
pub(crate) fn search_root_for(root: &Path) -> Option<PathBuf> {
    if root.is_dir() {
        Some(normalize_path(root))
    } else if root.is_file() {
        root.parent().map(normalize_path)
    } else {
        None
    }
}
