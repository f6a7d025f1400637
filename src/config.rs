//! Configuration file support for modwatch
//!
//! Config files are loaded in order (later overrides earlier):
//! 1. `~/.config/modwatch/config.toml` (user defaults)
//! 2. `.modwatch.toml` in project root (project overrides)
//!
//! CLI flags override all config file values.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::autotest::DEFAULT_TEST_BASE;
use crate::monitor::{
    interval_from_secs, MonitorError, MonitorOptions, DEFAULT_INTERVAL, DEFAULT_REFRESH_FACTOR,
};

/// Project config file name
pub const PROJECT_CONFIG: &str = ".modwatch.toml";

/// Configuration options loaded from config files
///
/// # Example
///
/// ```toml
/// # ~/.config/modwatch/config.toml or .modwatch.toml
/// interval = 0.5                      # Seconds between polls
/// refresh_factor = 10                 # Full rescan every 10th poll
/// search_paths = ["src", "lib"]       # Module search roots
/// implicit_relative_imports = false   # Python 2 import semantics
/// test_base = "unittest.TestCase"     # Base class of test cases
/// ignore = ["build", "node_modules"]  # Directory names to skip
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Poll interval in seconds (overridden by --interval)
    pub interval: Option<f64>,
    /// Polls per full refresh (overridden by --refresh-factor)
    pub refresh_factor: Option<u32>,
    /// Search roots for name resolution (overridden by --search-path)
    pub search_paths: Option<Vec<PathBuf>>,
    pub implicit_relative_imports: Option<bool>,
    /// Qualified name of the test base class used by autotest
    pub test_base: Option<String>,
    /// Directory names skipped during discovery
    pub ignore: Vec<String>,
}

impl Config {
    /// Load configuration from user and project config files
    pub fn load(project_root: &Path) -> Self {
        let user_config = dirs::config_dir()
            .map(|d| d.join("modwatch/config.toml"))
            .and_then(|p| Self::load_file(&p))
            .unwrap_or_default();

        let project_config =
            Self::load_file(&project_root.join(PROJECT_CONFIG)).unwrap_or_default();

        // Project overrides user
        let merged = user_config.override_with(project_config);
        tracing::debug!(
            interval = ?merged.interval,
            refresh_factor = ?merged.refresh_factor,
            search_paths = ?merged.search_paths,
            implicit_relative_imports = ?merged.implicit_relative_imports,
            test_base = ?merged.test_base,
            ignore = merged.ignore.len(),
            "Effective config after merge"
        );
        merged
    }

    /// Load configuration from a specific file.
    ///
    /// Relative search paths are taken relative to the file's directory.
    pub fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), e);
                return None;
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(mut config) => {
                if let (Some(paths), Some(base)) = (config.search_paths.as_mut(), path.parent()) {
                    for p in paths.iter_mut() {
                        if p.is_relative() {
                            *p = base.join(&*p);
                        }
                    }
                }
                tracing::debug!(
                    path = %path.display(),
                    interval = ?config.interval,
                    refresh_factor = ?config.refresh_factor,
                    "Loaded config"
                );
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Layer another config on top (other overrides self where present)
    fn override_with(self, other: Self) -> Self {
        // Ignore lists accumulate
        let mut ignore = self.ignore;
        for name in other.ignore {
            if !ignore.contains(&name) {
                ignore.push(name);
            }
        }

        Config {
            interval: other.interval.or(self.interval),
            refresh_factor: other.refresh_factor.or(self.refresh_factor),
            search_paths: other.search_paths.or(self.search_paths),
            implicit_relative_imports: other
                .implicit_relative_imports
                .or(self.implicit_relative_imports),
            test_base: other.test_base.or(self.test_base),
            ignore,
        }
    }

    // ===== Accessors with defaults =====

    /// Poll interval, validated
    pub fn interval_or_default(&self) -> Result<Duration, MonitorError> {
        match self.interval {
            Some(secs) => interval_from_secs(secs),
            None => Ok(DEFAULT_INTERVAL),
        }
    }

    pub fn refresh_factor_or_default(&self) -> u32 {
        self.refresh_factor.unwrap_or(DEFAULT_REFRESH_FACTOR)
    }

    pub fn implicit_relative_imports_or_default(&self) -> bool {
        self.implicit_relative_imports.unwrap_or(false)
    }

    pub fn test_base_or_default(&self) -> &str {
        self.test_base.as_deref().unwrap_or(DEFAULT_TEST_BASE)
    }

    /// Monitor construction options for `roots`
    pub fn monitor_options(&self, roots: Vec<PathBuf>) -> MonitorOptions {
        let mut options = MonitorOptions::new(roots)
            .with_implicit_relative_imports(self.implicit_relative_imports_or_default())
            .with_ignore(self.ignore.clone());
        if let Some(paths) = &self.search_paths {
            options = options.with_search_paths(paths.iter().cloned());
        }
        options
    }
}
