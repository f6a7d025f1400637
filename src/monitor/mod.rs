//! Polling monitor
//!
//! Owns the watched roots, the name resolver and the dependency graph.
//! Each poll cycle stats every known unit, reloads the ones whose
//! modification time moved forward, drops the ones that vanished, and
//! (on a full refresh) discovers new files. Changes surface as a pull-based
//! stream of [`Event`]s.
//!
//! Nothing here runs in the background: [`Monitor::start`] returns a
//! [`Watch`] iterator that sleeps between cycles on the caller's thread.

mod changes;
mod discover;
mod watch;

pub use changes::Changes;
pub use watch::Watch;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use thiserror::Error;

use crate::analyzer::{AnalysisError, Facts, PythonAnalyzer, UnitAnalyzer};
use crate::graph::{Graph, GraphError, Unit, UnitId};
use crate::resolve::{normalize_path, NameResolver, ResolveError};

use changes::{Cycle, Pass};

/// Default poll interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of incremental polls per full refresh
pub const DEFAULT_REFRESH_FACTOR: u32 = 5;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Poll interval must be positive, got {0}s")]
    InvalidInterval(f64),
    #[error("Refresh factor must be at least 1, got {0}")]
    InvalidRefreshFactor(u32),
    #[error("Failed to stat {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unknown module: {0}")]
    UnknownUnit(String),
    #[error("No root paths to watch")]
    RootMissing,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Convert a poll interval in seconds, rejecting zero, negative and NaN
pub fn interval_from_secs(secs: f64) -> Result<Duration, MonitorError> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(MonitorError::InvalidInterval(secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| MonitorError::InvalidInterval(secs))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Modified,
    Removed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// One change to a tracked unit
///
/// The unit is still present in the graph while its event is being
/// handled, including for `Removed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub unit: UnitId,
    pub name: String,
    pub path: PathBuf,
    /// Set when the unit's source could not be analyzed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Event {
    fn new(kind: EventKind, unit: &Unit, warning: Option<String>) -> Self {
        Self {
            kind,
            unit: unit.id,
            name: unit.name.clone(),
            path: unit.path.clone(),
            warning,
        }
    }
}

/// Shared running flag. Clones observe the same state.
///
/// Stopping takes effect before the next event is yielded; graph changes
/// already applied in the current cycle stay applied.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request the watch loop to end. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn start(&self) {
        self.running.store(true, Ordering::Release);
    }
}

/// Construction parameters for a [`Monitor`]
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Files or directories to watch
    pub roots: Vec<PathBuf>,
    /// Search roots for name resolution. `None` means the watched roots
    /// followed by `PYTHONPATH`.
    pub search_paths: Option<Vec<PathBuf>>,
    /// Parse plain imports as package-relative first
    pub implicit_relative_imports: bool,
    /// Extra directory names to skip during discovery
    pub ignore: Vec<String>,
}

impl MonitorOptions {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_search_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_implicit_relative_imports(mut self, enabled: bool) -> Self {
        self.implicit_relative_imports = enabled;
        self
    }

    pub fn with_ignore(mut self, names: Vec<String>) -> Self {
        self.ignore = names;
        self
    }

    fn effective_search_paths(&self) -> Vec<PathBuf> {
        if let Some(paths) = &self.search_paths {
            return paths.clone();
        }
        let mut paths: Vec<PathBuf> = self
            .roots
            .iter()
            .filter_map(|r| discover::search_root_for(r))
            .collect();
        if let Some(pythonpath) = std::env::var_os("PYTHONPATH") {
            paths.extend(std::env::split_paths(&pythonpath));
        }
        paths
    }
}

/// Watches a set of roots and keeps the dependency graph current
pub struct Monitor {
    roots: Vec<PathBuf>,
    ignore: Vec<String>,
    resolver: NameResolver,
    analyzer: Box<dyn UnitAnalyzer>,
    graph: Graph,
    loaded: bool,
    /// Paths that failed name resolution. Never retried.
    failures: HashSet<PathBuf>,
    running: StopHandle,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("roots", &self.roots)
            .field("search_paths", &self.resolver.search_paths())
            .field("units", &self.graph.len())
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl Monitor {
    /// Create a monitor using the tree-sitter Python analyzer
    pub fn new(options: MonitorOptions) -> Result<Self, MonitorError> {
        let analyzer = PythonAnalyzer::new()
            .with_implicit_relative_imports(options.implicit_relative_imports);
        Self::with_analyzer(options, analyzer)
    }

    /// Create a monitor with a custom analyzer
    pub fn with_analyzer(
        options: MonitorOptions,
        analyzer: impl UnitAnalyzer + 'static,
    ) -> Result<Self, MonitorError> {
        if options.roots.is_empty() {
            return Err(MonitorError::RootMissing);
        }
        let resolver = NameResolver::new(options.effective_search_paths());
        tracing::debug!(
            roots = options.roots.len(),
            search_paths = resolver.search_paths().len(),
            "Created monitor"
        );
        Ok(Self {
            roots: options.roots.iter().map(|r| normalize_path(r)).collect(),
            ignore: options.ignore,
            resolver,
            analyzer: Box::new(analyzer),
            graph: Graph::new(),
            loaded: false,
            failures: HashSet::new(),
            running: StopHandle::default(),
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        self.resolver.search_paths()
    }

    /// The graph as it stands, without triggering discovery
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The graph, running the initial discovery on first access
    pub fn descriptors(&mut self) -> Result<&Graph, MonitorError> {
        self.ensure_loaded()?;
        Ok(&self.graph)
    }

    /// Paths recorded as permanent name-resolution failures
    pub fn failures(&self) -> impl Iterator<Item = &Path> {
        self.failures.iter().map(PathBuf::as_path)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Stop a running watch loop. Safe to call at any time.
    pub fn stop(&self) {
        if self.running.is_running() {
            tracing::info!("Stopping monitor");
        }
        self.running.stop();
    }

    /// One detection pass over already-known units
    pub fn monitor(&mut self) -> Result<Changes<'_>, MonitorError> {
        self.ensure_loaded()?;
        let cycle = Cycle::begin(self, Pass::Monitor)?;
        Ok(Changes::new(self, cycle))
    }

    /// Detection pass followed by discovery of new files
    pub fn refresh(&mut self) -> Result<Changes<'_>, MonitorError> {
        self.ensure_loaded()?;
        let cycle = Cycle::begin(self, Pass::Refresh)?;
        Ok(Changes::new(self, cycle))
    }

    /// Start the watch loop.
    ///
    /// Arguments are validated before any filesystem access. The returned
    /// iterator sleeps `interval` before each cycle and runs a full refresh
    /// every `refresh_factor`-th cycle.
    pub fn start(
        &mut self,
        interval: Duration,
        refresh_factor: u32,
    ) -> Result<Watch<'_>, MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::InvalidInterval(0.0));
        }
        if refresh_factor < 1 {
            return Err(MonitorError::InvalidRefreshFactor(refresh_factor));
        }

        self.ensure_loaded()?;
        tracing::info!(
            units = self.graph.len(),
            interval_ms = interval.as_millis() as u64,
            refresh_factor,
            "Monitoring"
        );
        for id in self.graph.ids() {
            if let Some(description) = self.graph.describe(id) {
                tracing::info!("{description}");
            }
        }

        self.running.start();
        Ok(Watch::new(self, interval, refresh_factor))
    }

    /// Track one file explicitly.
    ///
    /// Only the new unit's own edges are built; call [`Monitor::refresh`]
    /// to let existing units pick it up.
    pub fn add(&mut self, path: &Path) -> Result<UnitId, MonitorError> {
        let path = normalize_path(path);
        let resolved = self.resolver.resolve(&path)?;
        let mtime = std::fs::metadata(&path)
            .map_err(|source| MonitorError::Io {
                path: path.clone(),
                source,
            })?
            .modified()
            .ok();
        let (facts, _) = self.analyze(&path).map_err(|e| MonitorError::Io {
            path: path.clone(),
            source: match e {
                AnalysisError::Io(source) => source,
                other => std::io::Error::other(other.to_string()),
            },
        })?;
        let id = self
            .graph
            .insert(resolved.name, resolved.package, path, mtime, facts)?;
        self.graph.update_dependencies(id);
        tracing::debug!(name = self.graph.name_of(id).unwrap_or_default(), "Added");
        Ok(id)
    }

    /// Stop tracking the unit named `name`
    pub fn remove(&mut self, name: &str) -> Result<Unit, MonitorError> {
        let id = self
            .graph
            .id_of(name)
            .ok_or_else(|| MonitorError::UnknownUnit(name.to_string()))?;
        self.detach(id)
            .ok_or_else(|| MonitorError::UnknownUnit(name.to_string()))
    }

    fn ensure_loaded(&mut self) -> Result<(), MonitorError> {
        if self.loaded {
            return Ok(());
        }
        let _span = tracing::info_span!("load").entered();
        self.loaded = true;
        let mut cycle = Cycle::begin(self, Pass::Refresh)?;
        cycle.drain(self);
        tracing::debug!(units = self.graph.len(), "Initial discovery complete");
        Ok(())
    }

    /// Analyze a file. Failures become empty facts plus a warning message;
    /// only a vanished file is returned as an error.
    fn analyze(&self, path: &Path) -> Result<(Facts, Option<String>), AnalysisError> {
        match self.analyzer.analyze_file(path) {
            Ok(facts) => Ok((facts, None)),
            Err(e) if e.is_not_found() => Err(e),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Analysis failed, tracking without imports"
                );
                Ok((Facts::default(), Some(e.to_string())))
            }
        }
    }

    /// Stat every known unit, then reload the modified ones.
    ///
    /// Returns the `Modified` events and the ids of vanished units. Every
    /// stat happens before the first reload, so a fatal stat error leaves
    /// the graph untouched and the modifications are seen again next pass.
    fn scan(&mut self) -> Result<(Vec<Event>, Vec<UnitId>), MonitorError> {
        let mut stale = Vec::new();
        let mut vanished = Vec::new();

        for unit in self.graph.units() {
            let mtime = match std::fs::metadata(&unit.path) {
                Ok(meta) => meta.modified().ok(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    vanished.push(unit.id);
                    continue;
                }
                Err(source) => {
                    return Err(MonitorError::Io {
                        path: unit.path.clone(),
                        source,
                    });
                }
            };
            if is_newer(mtime, unit.mtime) {
                stale.push((unit.id, unit.path.clone(), mtime));
            }
        }

        let mut modified = Vec::new();
        for (id, path, mtime) in stale {
            let Ok((facts, warning)) = self.analyze(&path) else {
                // Deleted between stat and read
                vanished.push(id);
                continue;
            };
            self.resolver.invalidate(&path);
            self.graph.reload(id, facts, mtime);
            if let Some(unit) = self.graph.unit(id) {
                tracing::debug!(name = %unit.name, "Modified");
                modified.push(Event::new(EventKind::Modified, unit, warning));
            }
        }

        Ok((modified, vanished))
    }

    /// Remove a unit from the graph and forget its cached name
    fn detach(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.graph.remove(id)?;
        self.resolver.invalidate(&unit.path);
        tracing::debug!(name = %unit.name, "Removed");
        Some(unit)
    }

    /// Find and register files not yet tracked.
    ///
    /// When anything new arrives every unit's edges are rebuilt, since an
    /// existing unit may import a newcomer.
    fn discover(&mut self) -> Vec<Event> {
        let mut added = Vec::new();

        for path in discover::unit_files(&self.roots, &self.ignore) {
            if self.graph.by_path(&path).is_some() || self.failures.contains(&path) {
                continue;
            }

            let resolved = match self.resolver.resolve(&path) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(
                        path = %path.display(),
                        error = %e,
                        "Cannot resolve module name"
                    );
                    self.failures.insert(path);
                    continue;
                }
            };
            if let Some(existing) = self.graph.get(&resolved.name) {
                tracing::warn!(
                    path = %path.display(),
                    name = %resolved.name,
                    existing = %existing.path.display(),
                    "Module name already taken, skipping"
                );
                self.failures.insert(path);
                continue;
            }

            let mtime = match std::fs::metadata(&path) {
                Ok(meta) => meta.modified().ok(),
                Err(e) => {
                    tracing::debug!(
                        path = %path.display(),
                        error = %e,
                        "File disappeared during discovery"
                    );
                    continue;
                }
            };
            let Ok((facts, warning)) = self.analyze(&path) else {
                continue;
            };

            match self
                .graph
                .insert(resolved.name, resolved.package, path, mtime, facts)
            {
                Ok(id) => added.push((id, warning)),
                Err(e) => tracing::warn!(error = %e, "Failed to register module"),
            }
        }

        if added.is_empty() {
            return Vec::new();
        }
        self.graph.update_all_dependencies();

        added
            .into_iter()
            .filter_map(|(id, warning)| {
                let unit = self.graph.unit(id)?;
                tracing::debug!(name = %unit.name, "Added");
                Some(Event::new(EventKind::Created, unit, warning))
            })
            .collect()
    }
}

/// Strictly newer modification time
fn is_newer(current: Option<SystemTime>, recorded: Option<SystemTime>) -> bool {
    match (current, recorded) {
        (Some(now), Some(then)) => now > then,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
