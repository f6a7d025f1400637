//! # modwatch - Python module dependency monitor
//!
//! Keeps a live import graph of a Python source tree and reports which
//! modules a change affects.
//!
//! ## Features
//!
//! - **Name resolution**: file path to dotted module name, honoring
//!   package nesting and search path order
//! - **Dependency graph**: mirrored forward/reverse edges built from import
//!   statements (tree-sitter)
//! - **Polling monitor**: created/modified/removed events, in a stable order
//! - **Affected sets**: breadth-first reverse walks, cycle safe
//! - **Autotest**: select the test modules affected by a change
//!
//! ## Quick Start
//!
//! ```no_run
//! use modwatch::{Direction, Monitor, MonitorOptions};
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut monitor = Monitor::new(MonitorOptions::new(["src"]))?;
//!
//! // Initial discovery
//! let graph = monitor.descriptors()?;
//! if let Some(unit) = graph.get("app.models") {
//!     for affected in graph.walk(unit.id, Direction::Reverse) {
//!         println!("{}", affected.name);
//!     }
//! }
//!
//! // Poll forever
//! for event in monitor.start(Duration::from_secs(1), 5)? {
//!     let event = event?;
//!     println!("{}: {}", event.kind, event.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod application;
pub mod autotest;
pub mod config;
pub mod graph;
pub mod monitor;
pub mod resolve;

pub use analyzer::{Facts, ImportFact, PythonAnalyzer, TypeDeclaration, UnitAnalyzer};
pub use application::{Application, Context, Handler, MonitorHandle};
pub use autotest::Autotest;
pub use config::Config;
pub use graph::{Direction, Graph, Unit, UnitId};
pub use monitor::{Event, EventKind, Monitor, MonitorError, MonitorOptions, StopHandle};
pub use resolve::{NameResolver, ResolvedName};
