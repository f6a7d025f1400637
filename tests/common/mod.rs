//! Common test fixtures and helpers
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::TestTree;
//! ```
#![allow(dead_code)]

use modwatch::{Monitor, MonitorOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Python source tree in a temporary directory
///
/// Paths are canonicalized so they compare equal to the paths the
/// monitor registers (temp dirs may sit behind a symlink).
pub struct TestTree {
    root: PathBuf,
    _dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dunce::canonicalize(dir.path()).expect("Failed to canonicalize temp dir");
        Self { root, _dir: dir }
    }

    /// Create a tree from `(relative path, source)` pairs
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let tree = Self::new();
        for (rel, source) in files {
            tree.write(rel, source);
        }
        tree
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write a file, creating parent directories
    pub fn write(&self, rel: &str, source: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dirs");
        }
        fs::write(&path, source).expect("Failed to write file");
        path
    }

    /// Rewrite a file and push its mtime forward so a poll sees it
    pub fn modify(&self, rel: &str, source: &str) {
        let path = self.write(rel, source);
        touch_later(&path);
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("Failed to remove file");
    }

    /// Monitor over the whole tree with the tree root as only search root
    pub fn monitor(&self) -> Monitor {
        Monitor::new(MonitorOptions::new([self.root()]).with_search_paths([self.root()]))
            .expect("Failed to create monitor")
    }

    /// Same as [`TestTree::monitor`] with initial discovery done
    pub fn loaded_monitor(&self) -> Monitor {
        let mut monitor = self.monitor();
        monitor.descriptors().expect("Initial discovery failed");
        monitor
    }
}

static BUMPS: AtomicU64 = AtomicU64::new(0);

/// Set a file's mtime into the future, later on every call
pub fn touch_later(path: &Path) {
    let step = BUMPS.fetch_add(1, Ordering::Relaxed);
    fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to open file")
        .set_modified(SystemTime::now() + Duration::from_secs(60 + step * 5))
        .expect("Failed to set mtime");
}

/// Names of the given unit ids, in order
pub fn names(graph: &modwatch::Graph, ids: &[modwatch::UnitId]) -> Vec<String> {
    ids.iter()
        .filter_map(|&id| graph.name_of(id).map(str::to_string))
        .collect()
}
