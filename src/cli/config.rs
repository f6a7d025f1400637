//! Configuration and project root detection
//!
//! Provides project root detection and config file application.

use std::path::PathBuf;

use modwatch::config::{Config, PROJECT_CONFIG};

use super::Cli;

/// Find project root by looking for common markers.
///
/// Walks up from the current directory; falls back to it when no marker
/// is found.
pub(crate) fn find_project_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut current = cwd.as_path();

    // Listed in priority order: if multiple exist, first match wins
    let markers = [
        PROJECT_CONFIG,   // Explicit modwatch config
        "pyproject.toml", // Python (modern)
        "setup.py",       // Python (legacy)
        "setup.cfg",
        ".git", // Git repository root (fallback)
    ];

    loop {
        if markers.iter().any(|m| current.join(m).exists()) {
            return current.to_path_buf();
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    tracing::debug!("No project root found, using current directory");
    cwd
}

/// Apply config file defaults to CLI options
/// CLI flags always override config values
pub(super) fn apply_config_defaults(cli: &mut Cli, config: &Config) {
    if cli.interval.is_none() {
        cli.interval = config.interval;
    }
    if cli.refresh_factor.is_none() {
        cli.refresh_factor = config.refresh_factor;
    }
}
