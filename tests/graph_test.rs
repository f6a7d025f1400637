//! Dependency graph property tests
//!
//! Random import graphs (self-imports, duplicates, cycles, dangling
//! targets included) must always keep mirrored edges and produce
//! well-formed walks.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use modwatch::{Direction, Facts, Graph, ImportFact, UnitId};
use proptest::prelude::*;

const MAX_UNITS: usize = 12;

/// Build a graph of `m0..mN` where `imports[i]` lists indices module `i`
/// imports. Indices past the end become dangling (external) imports.
fn build(imports: &[Vec<usize>]) -> Graph {
    let mut graph = Graph::new();
    for (i, targets) in imports.iter().enumerate() {
        let facts = Facts {
            imports: targets
                .iter()
                .map(|t| ImportFact::new(format!("m{t}"), format!("m{t}"), 0))
                .collect(),
            types: Vec::new(),
        };
        graph
            .insert(format!("m{i}"), None, PathBuf::from(format!("/g/m{i}.py")), None, facts)
            .unwrap();
    }
    graph.update_all_dependencies();
    graph
}

fn assert_mirrored(graph: &Graph) -> Result<(), TestCaseError> {
    for unit in graph.units() {
        for &dep in unit.dependencies() {
            let target = graph.unit(dep);
            prop_assert!(target.is_some(), "{} points at a dead unit", unit.name);
            prop_assert!(target.unwrap().reverse_dependencies().contains(&unit.id));
        }
        for &rdep in unit.reverse_dependencies() {
            let source = graph.unit(rdep);
            prop_assert!(source.is_some(), "{} is imported by a dead unit", unit.name);
            prop_assert!(source.unwrap().dependencies().contains(&unit.id));
        }
        prop_assert!(!unit.dependencies().contains(&unit.id), "self edge on {}", unit.name);
        let unique: HashSet<_> = unit.dependencies().iter().collect();
        prop_assert_eq!(unique.len(), unit.dependencies().len());
    }
    Ok(())
}

/// Reference closure computed independently of the walk
fn reachable(graph: &Graph, start: UnitId, direction: Direction) -> HashSet<UnitId> {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        let unit = graph.unit(id).unwrap();
        let next = match direction {
            Direction::Forward => unit.dependencies(),
            Direction::Reverse => unit.reverse_dependencies(),
        };
        for &n in next {
            if seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
    seen
}

fn imports_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..MAX_UNITS).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0..n + 2, 0..5), n)
    })
}

proptest! {
    /// Property: edges are always mirrored, never self-referential
    #[test]
    fn prop_edges_mirrored(imports in imports_strategy()) {
        let graph = build(&imports);
        assert_mirrored(&graph)?;
    }

    /// Property: walks start at the start unit, never repeat, and cover the closure
    #[test]
    fn prop_walk_closure(
        imports in imports_strategy(),
        start in 0usize..MAX_UNITS,
        reverse in any::<bool>(),
    ) {
        let graph = build(&imports);
        let start = graph.id_of(&format!("m{}", start % imports.len())).unwrap();
        let direction = if reverse { Direction::Reverse } else { Direction::Forward };

        let order: Vec<UnitId> = graph.walk(start, direction).map(|u| u.id).collect();
        prop_assert_eq!(order[0], start);
        let unique: HashSet<UnitId> = order.iter().copied().collect();
        prop_assert_eq!(unique.len(), order.len());
        prop_assert_eq!(unique, reachable(&graph, start, direction));
    }

    /// Property: removal drops exactly one unit and leaves no edge behind
    #[test]
    fn prop_remove_detaches(imports in imports_strategy(), victim in 0usize..MAX_UNITS) {
        let mut graph = build(&imports);
        let before = graph.len();
        let name = format!("m{}", victim % imports.len());
        let id = graph.id_of(&name).unwrap();

        prop_assert!(graph.remove(id).is_some());
        prop_assert_eq!(graph.len(), before - 1);
        prop_assert!(graph.get(&name).is_none());
        for unit in graph.units() {
            prop_assert!(!unit.dependencies().contains(&id));
            prop_assert!(!unit.reverse_dependencies().contains(&id));
        }
        assert_mirrored(&graph)?;
    }

    /// Property: rebuilding from unchanged facts changes nothing
    #[test]
    fn prop_rebuild_idempotent(imports in imports_strategy()) {
        let mut graph = build(&imports);
        let snapshot = |g: &Graph| -> Vec<(Vec<UnitId>, Vec<UnitId>)> {
            g.units()
                .map(|u| (u.dependencies().to_vec(), u.reverse_dependencies().to_vec()))
                .collect()
        };
        let before = snapshot(&graph);
        for id in graph.ids() {
            let facts = graph.unit(id).unwrap().facts.clone();
            graph.reload(id, facts, None);
        }
        let after = snapshot(&graph);
        // Same edge sets; reverse order may shift as edges are re-added
        for ((d1, r1), (d2, r2)) in before.iter().zip(after.iter()) {
            prop_assert_eq!(d1, d2);
            let r1: HashSet<_> = r1.iter().collect();
            let r2: HashSet<_> = r2.iter().collect();
            prop_assert_eq!(r1, r2);
        }
    }
}

#[test]
fn test_edges_follow_declaration_order() {
    let graph = build(&[vec![3, 1, 2, 1], vec![], vec![], vec![]]);
    let m0 = graph.get("m0").unwrap();
    let deps: Vec<&str> = m0
        .dependencies()
        .iter()
        .map(|&id| graph.name_of(id).unwrap())
        .collect();
    assert_eq!(deps, ["m3", "m1", "m2"]);
}

#[test]
fn test_dangling_imports_are_not_edges() {
    let graph = build(&[vec![5, 6], vec![0]]);
    assert!(graph.get("m0").unwrap().dependencies().is_empty());
    assert_eq!(graph.get("m0").unwrap().reverse_dependencies().len(), 1);
}
