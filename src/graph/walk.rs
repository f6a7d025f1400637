//! Breadth-first traversal over dependency edges

use std::collections::{HashSet, VecDeque};

use super::{Graph, Unit, UnitId};

/// Which edge set a walk follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow `dependencies` (what this unit imports)
    Forward,
    /// Follow `reverse_dependencies` (what imports this unit)
    Reverse,
}

/// Lazy breadth-first walk starting at one unit
///
/// Yields the start unit first, then every reachable unit exactly once,
/// shallowest first. Units already discovered are never re-queued, which
/// is all it takes to terminate on cycles.
pub struct Walk<'g> {
    graph: &'g Graph,
    direction: Direction,
    queue: VecDeque<UnitId>,
    discovered: HashSet<UnitId>,
}

impl<'g> Walk<'g> {
    pub(super) fn new(graph: &'g Graph, start: UnitId, direction: Direction) -> Self {
        let mut queue = VecDeque::new();
        let mut discovered = HashSet::new();
        if graph.contains(start) {
            queue.push_back(start);
            discovered.insert(start);
        }
        Self {
            graph,
            direction,
            queue,
            discovered,
        }
    }
}

impl<'g> Iterator for Walk<'g> {
    type Item = &'g Unit;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        let unit = self.graph.unit(id)?;
        let neighbors = match self.direction {
            Direction::Forward => unit.dependencies(),
            Direction::Reverse => unit.reverse_dependencies(),
        };
        for &next in neighbors {
            if self.discovered.insert(next) {
                self.queue.push_back(next);
            }
        }
        Some(unit)
    }
}

/// Multi-source reverse walk: every unit affected by any of `changed`.
///
/// Each unit appears once, in breadth-first order across all sources.
pub fn affected_by(graph: &Graph, changed: &[UnitId]) -> Vec<UnitId> {
    let mut discovered: HashSet<UnitId> = HashSet::new();
    let mut queue: VecDeque<UnitId> = VecDeque::new();
    let mut order = Vec::new();

    for &id in changed {
        if graph.contains(id) && discovered.insert(id) {
            queue.push_back(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        order.push(id);
        if let Some(unit) = graph.unit(id) {
            for &dependent in unit.reverse_dependencies() {
                if discovered.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
    }

    order
}
