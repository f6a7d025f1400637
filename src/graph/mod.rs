//! Module dependency graph
//!
//! Units live in an arena keyed by [`UnitId`]. Edges are id sets, never
//! references, and every forward edge `a -> b` is mirrored by `a` in
//! `b`'s reverse set. The registry keeps two indexes (by name and by
//! normalized path) that always hold the same set of units.
//!
//! Split into submodules:
//! - `ordered_set`: insertion-ordered edge sets
//! - `walk`: breadth-first traversal

mod ordered_set;
mod walk;

pub use ordered_set::OrderedSet;
pub use walk::{affected_by, Direction, Walk};

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use crate::analyzer::{Facts, ImportFact};
use crate::resolve::{resolve_relative_name, split_name};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Module name already registered: {0}")]
    DuplicateName(String),
    #[error("Module file already registered: {0}")]
    DuplicatePath(PathBuf),
}

/// Stable identifier of a unit. Ids are never reused within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tracked source file
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    /// Fully-qualified module name (unique within the graph)
    pub name: String,
    /// Owning package, if any
    pub package: Option<String>,
    /// Normalized absolute path (unique within the graph)
    pub path: PathBuf,
    /// Last observed modification time
    pub mtime: Option<SystemTime>,
    /// Facts from the last analysis; replaced wholesale on reload
    pub facts: Facts,
    dependencies: OrderedSet<UnitId>,
    reverse_dependencies: OrderedSet<UnitId>,
}

impl Unit {
    /// Units this one imports, in declaration order
    pub fn dependencies(&self) -> &[UnitId] {
        self.dependencies.as_slice()
    }

    /// Units importing this one, in the order the edges were added
    pub fn reverse_dependencies(&self) -> &[UnitId] {
        self.reverse_dependencies.as_slice()
    }
}

/// The registry of units plus their mirrored edges
#[derive(Debug, Default)]
pub struct Graph {
    units: BTreeMap<UnitId, Unit>,
    by_name: HashMap<String, UnitId>,
    by_path: HashMap<PathBuf, UnitId>,
    next_id: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Look up a unit by fully-qualified name
    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.by_name.get(name).and_then(|id| self.units.get(id))
    }

    pub fn id_of(&self, name: &str) -> Option<UnitId> {
        self.by_name.get(name).copied()
    }

    /// Look up a unit by its normalized path
    pub fn by_path(&self, path: &Path) -> Option<&Unit> {
        self.by_path.get(path).and_then(|id| self.units.get(id))
    }

    /// Units in registration order
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    pub fn name_of(&self, id: UnitId) -> Option<&str> {
        self.units.get(&id).map(|u| u.name.as_str())
    }

    /// Register a unit without touching any edges
    pub fn insert(
        &mut self,
        name: String,
        package: Option<String>,
        path: PathBuf,
        mtime: Option<SystemTime>,
        facts: Facts,
    ) -> Result<UnitId, GraphError> {
        if self.by_name.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        if self.by_path.contains_key(&path) {
            return Err(GraphError::DuplicatePath(path));
        }

        let id = UnitId(self.next_id);
        self.next_id += 1;
        self.by_name.insert(name.clone(), id);
        self.by_path.insert(path.clone(), id);
        self.units.insert(
            id,
            Unit {
                id,
                name,
                package,
                path,
                mtime,
                facts,
                dependencies: OrderedSet::new(),
                reverse_dependencies: OrderedSet::new(),
            },
        );
        Ok(id)
    }

    /// Detach and drop a unit.
    ///
    /// Removes it from every other unit's dependency and reverse-dependency
    /// sets, then from both indexes.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.clear_dependencies(id);
        let dependents = self.units.get_mut(&id)?.reverse_dependencies.take();
        for dependent in dependents {
            if let Some(unit) = self.units.get_mut(&dependent) {
                unit.dependencies.remove(&id);
            }
        }

        let unit = self.units.remove(&id)?;
        self.by_name.remove(&unit.name);
        self.by_path.remove(&unit.path);
        Some(unit)
    }

    /// Add the edge `from -> to`. Self-edges and unknown ids are ignored.
    pub fn add_dependency(&mut self, from: UnitId, to: UnitId) -> bool {
        if from == to || !self.contains(from) || !self.contains(to) {
            return false;
        }
        let inserted = self
            .units
            .get_mut(&from)
            .is_some_and(|u| u.dependencies.insert(to));
        if inserted {
            if let Some(target) = self.units.get_mut(&to) {
                target.reverse_dependencies.insert(from);
            }
        }
        inserted
    }

    /// Drop every forward edge of `id` (and the mirrored reverse entries)
    pub fn clear_dependencies(&mut self, id: UnitId) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        for dep in unit.dependencies.take() {
            if let Some(target) = self.units.get_mut(&dep) {
                target.reverse_dependencies.remove(&id);
            }
        }
    }

    /// Rebuild the forward edges of `id` from its import facts.
    ///
    /// Other units only see their reverse sets change.
    pub fn update_dependencies(&mut self, id: UnitId) {
        let Some(unit) = self.units.get(&id) else {
            return;
        };
        let targets: Vec<UnitId> = unit
            .facts
            .imports
            .iter()
            .filter_map(|fact| self.resolve_import(unit, fact))
            .collect();

        self.clear_dependencies(id);
        for target in targets {
            self.add_dependency(id, target);
        }
    }

    /// Rebuild every unit's forward edges, in registration order
    pub fn update_all_dependencies(&mut self) {
        for id in self.ids() {
            self.update_dependencies(id);
        }
    }

    /// Replace a unit's facts and modification time, then rebuild its edges
    pub fn reload(&mut self, id: UnitId, facts: Facts, mtime: Option<SystemTime>) -> bool {
        let Some(unit) = self.units.get_mut(&id) else {
            return false;
        };
        unit.facts = facts;
        unit.mtime = mtime;
        self.update_dependencies(id);
        true
    }

    /// Map one import fact of `importer` to a tracked unit, if any.
    ///
    /// Untracked (external) imports resolve to `None`; that is not an error.
    pub fn resolve_import(&self, importer: &Unit, fact: &ImportFact) -> Option<UnitId> {
        let package = importer.package.as_deref();
        let found = match fact.level {
            0 => self.lookup_module(&fact.target),
            level if level < 0 => package
                .and_then(|pkg| self.lookup_in_package(pkg, &fact.target))
                .or_else(|| self.lookup_module(&fact.target)),
            level => resolve_relative_name(&fact.target, package, level)
                .and_then(|name| self.lookup_module(&name)),
        };
        found.filter(|&target| target != importer.id)
    }

    /// Exact name, or the name minus its last segment (an attribute import)
    fn lookup_module(&self, name: &str) -> Option<UnitId> {
        if let Some(&id) = self.by_name.get(name) {
            return Some(id);
        }
        let (parent, _) = split_name(name);
        parent.and_then(|p| self.by_name.get(p).copied())
    }

    /// Package-relative lookup for ambiguous imports.
    ///
    /// The attribute fallback never collapses onto the package itself:
    /// `import os` inside `pkg` must not become a dependency on `pkg`.
    fn lookup_in_package(&self, package: &str, target: &str) -> Option<UnitId> {
        let qualified = format!("{package}.{target}");
        if let Some(&id) = self.by_name.get(&qualified) {
            return Some(id);
        }
        let (parent, _) = split_name(target);
        parent.and_then(|p| self.by_name.get(&format!("{package}.{p}")).copied())
    }

    /// Walk from `start` along the given edge direction (start first)
    pub fn walk(&self, start: UnitId, direction: Direction) -> Walk<'_> {
        Walk::new(self, start, direction)
    }

    /// Human-readable summary of one unit and its edges
    pub fn describe(&self, id: UnitId) -> Option<String> {
        let unit = self.units.get(&id)?;
        let names = |ids: &[UnitId]| {
            ids.iter()
                .filter_map(|&i| self.name_of(i))
                .collect::<Vec<_>>()
                .join(", ")
        };
        Some(format!(
            "{}: {}\n  Dependencies: [{}]\n  Reverse: [{}]",
            unit.name,
            unit.path.display(),
            names(unit.dependencies()),
            names(unit.reverse_dependencies()),
        ))
    }

    /// Serializable view of one unit
    pub fn summary(&self, id: UnitId) -> Option<UnitSummary> {
        let unit = self.units.get(&id)?;
        let names = |ids: &[UnitId]| {
            ids.iter()
                .filter_map(|&i| self.name_of(i).map(str::to_string))
                .collect()
        };
        Some(UnitSummary {
            name: unit.name.clone(),
            package: unit.package.clone(),
            path: unit.path.clone(),
            dependencies: names(unit.dependencies()),
            reverse_dependencies: names(unit.reverse_dependencies()),
        })
    }
}

/// Display-ready unit with edges by name
#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub name: String,
    pub package: Option<String>,
    pub path: PathBuf,
    pub dependencies: Vec<String>,
    pub reverse_dependencies: Vec<String>,
}
