//! Affected test selection
//!
//! A test module is any unit declaring a class that derives (statically)
//! from the configured test base, `unittest.TestCase` by default. When a
//! unit changes, the tests to rerun are the test modules in its reverse
//! walk.

use std::collections::HashSet;

use crate::application::{Context, Handler, HandlerResult, MonitorHandle};
use crate::graph::{affected_by, Graph, Unit, UnitId};
use crate::monitor::{Event, EventKind};
use crate::resolve::{resolve_relative_name, split_name};

/// Default base class of test cases
pub const DEFAULT_TEST_BASE: &str = "unittest.TestCase";

/// Context key holding the space-separated affected test modules
pub const CONTEXT_KEY: &str = "autotest.tests";

/// Whether `unit` declares a class deriving from `base`.
///
/// Base references are resolved through the unit's imports (aliases and
/// relative levels). Classes declared in the same unit or in other tracked
/// units are followed transitively.
pub fn declares_subclass(graph: &Graph, unit: &Unit, base: &str) -> bool {
    let mut visited = HashSet::new();
    unit.facts
        .types
        .iter()
        .any(|decl| class_derives(graph, unit, &decl.name, base, &mut visited))
}

fn class_derives(
    graph: &Graph,
    unit: &Unit,
    class: &str,
    base: &str,
    visited: &mut HashSet<(UnitId, String)>,
) -> bool {
    if !visited.insert((unit.id, class.to_string())) {
        return false;
    }
    let Some(decl) = unit.facts.types.iter().find(|t| t.name == class) else {
        return false;
    };

    for reference in &decl.bases {
        let candidates = qualify(unit, reference);
        if candidates.iter().any(|c| c == base) {
            return true;
        }

        // Bare name with no import binding: a class from the same unit
        if candidates.is_empty() {
            if reference == base {
                return true;
            }
            if class_derives(graph, unit, reference, base, visited) {
                return true;
            }
            continue;
        }

        for qualified in &candidates {
            let (Some(module), class) = split_name(qualified) else {
                continue;
            };
            if let Some(other) = graph.get(module) {
                if class_derives(graph, other, class, base, visited) {
                    return true;
                }
            }
        }
    }
    false
}

/// Fully-qualified candidates for a base reference as written in `unit`.
///
/// Empty when no import binds the reference's leading name.
fn qualify(unit: &Unit, reference: &str) -> Vec<String> {
    // Later imports rebind earlier ones
    let binding = unit.facts.imports.iter().rev().find_map(|fact| {
        if fact.symbol == "*" {
            return None;
        }
        if reference == fact.symbol {
            Some((fact, String::new()))
        } else {
            reference
                .strip_prefix(&fact.symbol)
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|rest| (fact, format!(".{rest}")))
        }
    });
    let Some((fact, rest)) = binding else {
        return Vec::new();
    };

    let package = unit.package.as_deref();
    let mut candidates = Vec::new();
    if fact.level < 0 {
        if let Some(pkg) = package {
            candidates.push(format!("{pkg}.{}{rest}", fact.target));
        }
    }
    if let Some(target) = resolve_relative_name(&fact.target, package, fact.level) {
        candidates.push(format!("{target}{rest}"));
    }
    candidates
}

/// Test modules affected by a change to any of `changed`, in walk order
pub fn affected_tests(graph: &Graph, changed: &[UnitId], base: &str) -> Vec<UnitId> {
    affected_by(graph, changed)
        .into_iter()
        .filter(|&id| {
            graph
                .unit(id)
                .is_some_and(|unit| declares_subclass(graph, unit, base))
        })
        .collect()
}

type Sink = Box<dyn FnMut(&Event, &[String])>;

/// Handler selecting the tests affected by each created or modified unit
pub struct Autotest {
    base: String,
    sink: Option<Sink>,
}

impl Autotest {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            sink: None,
        }
    }

    /// Receive the selected test modules for each event
    pub fn with_sink(mut self, sink: impl FnMut(&Event, &[String]) + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Default for Autotest {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_BASE)
    }
}

impl Handler for Autotest {
    fn invoke(
        &mut self,
        event: &Event,
        monitor: &MonitorHandle<'_>,
        context: &mut Context,
    ) -> HandlerResult {
        if event.kind == EventKind::Removed {
            return Ok(None);
        }

        let tests: Vec<String> = affected_tests(monitor.graph, &[event.unit], &self.base)
            .into_iter()
            .filter_map(|id| monitor.graph.name_of(id).map(str::to_string))
            .collect();
        tracing::info!(changed = %event.name, tests = tests.len(), "Affected tests");

        context.insert(CONTEXT_KEY.to_string(), tests.join(" "));
        if let Some(sink) = self.sink.as_mut() {
            sink(event, &tests);
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "autotest"
    }
}
