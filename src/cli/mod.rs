//! CLI implementation for modwatch

mod config;
mod display;
mod signal;
mod watch;

use config::{apply_config_defaults, find_project_root};

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};

use modwatch::autotest::affected_tests;
use modwatch::config::Config;
use modwatch::graph::affected_by;
use modwatch::{Monitor, MonitorOptions};

#[derive(Parser)]
#[command(name = "modwatch")]
#[command(about = "Python module dependency graph and change monitor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Module search root (repeatable; default: watched roots, then PYTHONPATH)
    #[arg(short = 's', long = "search-path", global = true)]
    search_paths: Vec<PathBuf>,

    /// Seconds between polls
    #[arg(long, global = true)]
    interval: Option<f64>,

    /// Polls per full rescan
    #[arg(long, global = true)]
    refresh_factor: Option<u32>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show debug info (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover modules and print the dependency graph
    Graph {
        /// Files or directories to scan (default: current directory)
        paths: Vec<PathBuf>,
    },
    /// List modules affected by a change to NAME (reverse dependencies)
    Affected {
        /// Fully-qualified module name
        name: String,
        /// Files or directories to scan (default: current directory)
        paths: Vec<PathBuf>,
        /// Only list test modules
        #[arg(long)]
        tests: bool,
    },
    /// Poll for changes and print one line per event
    Watch {
        /// Files or directories to watch (default: current directory)
        paths: Vec<PathBuf>,
        /// Print the test modules affected by each change
        #[arg(long)]
        autotest: bool,
    },
}

/// Run CLI with pre-parsed arguments (main.rs inspects -v/-q first)
pub fn run_with(mut cli: Cli) -> Result<()> {
    // Load config and apply defaults (CLI flags override config)
    let config = Config::load(&find_project_root());
    apply_config_defaults(&mut cli, &config);

    match cli.command {
        Commands::Graph { ref paths } => cmd_graph(&cli, &config, paths),
        Commands::Affected {
            ref name,
            ref paths,
            tests,
        } => cmd_affected(&cli, &config, name, paths, tests),
        Commands::Watch {
            ref paths,
            autotest,
        } => watch::cmd_watch(&cli, &config, paths, autotest),
    }
}

/// Roots given on the command line, or the current directory
fn roots_or_cwd(paths: &[PathBuf]) -> Vec<PathBuf> {
    if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths.to_vec()
    }
}

fn monitor_options(cli: &Cli, config: &Config, paths: &[PathBuf]) -> MonitorOptions {
    let roots = roots_or_cwd(paths);
    for root in &roots {
        if !root.exists() {
            tracing::warn!(root = %root.display(), "Root does not exist, ignoring");
        }
    }
    let options = config.monitor_options(roots);
    if cli.search_paths.is_empty() {
        options
    } else {
        options.with_search_paths(cli.search_paths.iter().cloned())
    }
}

fn load_monitor(cli: &Cli, config: &Config, paths: &[PathBuf]) -> Result<Monitor> {
    let mut monitor = Monitor::new(monitor_options(cli, config, paths))?;
    monitor
        .descriptors()
        .context("Failed to discover modules")?;
    Ok(monitor)
}

// === Commands ===

fn cmd_graph(cli: &Cli, config: &Config, paths: &[PathBuf]) -> Result<()> {
    let monitor = load_monitor(cli, config, paths)?;
    let graph = monitor.graph();
    if cli.json {
        display::print_graph_json(graph)
    } else {
        display::print_graph(graph);
        Ok(())
    }
}

fn cmd_affected(
    cli: &Cli,
    config: &Config,
    name: &str,
    paths: &[PathBuf],
    tests: bool,
) -> Result<()> {
    let monitor = load_monitor(cli, config, paths)?;
    let graph = monitor.graph();
    let Some(id) = graph.id_of(name) else {
        bail!("Unknown module: {name}");
    };

    let ids = if tests {
        affected_tests(graph, &[id], config.test_base_or_default())
    } else {
        affected_by(graph, &[id])
    };
    let names: Vec<&str> = ids.iter().filter_map(|&i| graph.name_of(i)).collect();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_graph_defaults() {
        let cli = Cli::try_parse_from(["modwatch", "graph"]).unwrap();
        assert!(!cli.json);
        assert!(!cli.quiet);
        assert!(!cli.verbose);
        assert!(cli.search_paths.is_empty());
        assert!(cli.interval.is_none());
        match cli.command {
            Commands::Graph { paths } => assert!(paths.is_empty()),
            _ => panic!("Expected Graph command"),
        }
    }

    #[test]
    fn test_cli_affected() {
        let cli = Cli::try_parse_from(["modwatch", "affected", "pkg.a", "src", "--tests"]).unwrap();
        match cli.command {
            Commands::Affected { name, paths, tests } => {
                assert_eq!(name, "pkg.a");
                assert_eq!(paths, vec![PathBuf::from("src")]);
                assert!(tests);
            }
            _ => panic!("Expected Affected command"),
        }
    }

    #[test]
    fn test_cli_watch_flags() {
        let cli = Cli::try_parse_from([
            "modwatch",
            "watch",
            "--interval",
            "0.5",
            "--refresh-factor",
            "3",
            "--autotest",
            "-s",
            "lib",
            "--search-path",
            "src",
        ])
        .unwrap();
        assert_eq!(cli.interval, Some(0.5));
        assert_eq!(cli.refresh_factor, Some(3));
        assert_eq!(cli.search_paths, vec![PathBuf::from("lib"), PathBuf::from("src")]);
        assert!(matches!(cli.command, Commands::Watch { autotest: true, .. }));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["modwatch"]).is_err());
        assert!(Cli::try_parse_from(["modwatch", "affected"]).is_err());
    }

    #[test]
    fn test_cli_quiet_verbose_flags() {
        let cli = Cli::try_parse_from(["modwatch", "-q", "graph"]).unwrap();
        assert!(cli.quiet);
        let cli = Cli::try_parse_from(["modwatch", "graph", "-v"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_roots_or_cwd() {
        assert_eq!(roots_or_cwd(&[]), vec![PathBuf::from(".")]);
        assert_eq!(roots_or_cwd(&[PathBuf::from("a")]), vec![PathBuf::from("a")]);
    }
}
