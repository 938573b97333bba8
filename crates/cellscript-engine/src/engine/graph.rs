//! Dependency scheduling for formula cells.
//!
//! Cells form a directed graph: an edge runs from each precedent to the
//! cell whose formula reads it. A topological linearization of that graph
//! is an evaluation order. Cycles are reported, not raised; the cells a
//! cycle traps stay in `unordered` so the code generator can hand them to
//! the runtime evaluator instead of dropping them silently.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::location::CellLocation;

/// Result of a scheduling pass. `order` is always a valid topological
/// order of the acyclic portion; `unordered` holds the rest.
#[derive(Clone, Debug)]
pub struct ExecutionOrder {
    pub order: Vec<CellLocation>,
    pub has_cycle: bool,
    pub unordered: Vec<CellLocation>,
}

/// Compute a deterministic evaluation order with Kahn's algorithm.
///
/// The vertex set is the union of `vertices` and every location named in
/// `precedents`. Vertices seed the queue in their `BTreeSet` order and
/// the queue is FIFO, so identical inputs always produce identical
/// output.
pub fn build_order(
    vertices: &BTreeSet<CellLocation>,
    precedents: &BTreeMap<CellLocation, Vec<CellLocation>>,
) -> ExecutionOrder {
    let mut all: BTreeSet<CellLocation> = vertices.clone();
    for (dependent, precs) in precedents {
        all.insert(dependent.clone());
        for p in precs {
            all.insert(p.clone());
        }
    }

    let mut dependents_of: BTreeMap<&CellLocation, Vec<&CellLocation>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&CellLocation, usize> = all.iter().map(|v| (v, 0)).collect();

    for (dependent, precs) in precedents {
        for p in precs {
            // Self-references are already a cycle of length one; recording
            // the edge lets Kahn's algorithm report them via `unordered`.
            dependents_of.entry(p).or_default().push(dependent);
            *in_degree.get_mut(dependent).expect("dependent in vertex set") += 1;
        }
    }

    let mut queue: VecDeque<&CellLocation> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(v, _)| *v)
        .collect();

    let mut order = Vec::with_capacity(all.len());
    while let Some(current) = queue.pop_front() {
        order.push(current.clone());
        if let Some(dependents) = dependents_of.get(current) {
            for dep in dependents {
                let deg = in_degree.get_mut(*dep).expect("dependent in vertex set");
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(*dep);
                }
            }
        }
    }

    let emitted: BTreeSet<&CellLocation> = order.iter().collect();
    let unordered: Vec<CellLocation> = all
        .iter()
        .filter(|v| !emitted.contains(v))
        .cloned()
        .collect();

    ExecutionOrder {
        has_cycle: !unordered.is_empty(),
        order,
        unordered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(address: &str) -> CellLocation {
        CellLocation::new("Sheet1", address)
    }

    fn set(addresses: &[&str]) -> BTreeSet<CellLocation> {
        addresses.iter().map(|a| loc(a)).collect()
    }

    #[test]
    fn test_chain_orders_precedents_first() {
        // C1 depends on B1 depends on A1.
        let mut precedents = BTreeMap::new();
        precedents.insert(loc("B1"), vec![loc("A1")]);
        precedents.insert(loc("C1"), vec![loc("B1")]);
        let result = build_order(&set(&["A1", "B1", "C1"]), &precedents);
        assert!(!result.has_cycle);
        assert_eq!(result.order, vec![loc("A1"), loc("B1"), loc("C1")]);
    }

    #[test]
    fn test_precedent_only_vertices_are_included() {
        let mut precedents = BTreeMap::new();
        precedents.insert(loc("B1"), vec![loc("A1")]);
        // A1 never appears as a record; it still must be in the order.
        let result = build_order(&set(&["B1"]), &precedents);
        assert_eq!(result.order, vec![loc("A1"), loc("B1")]);
    }

    #[test]
    fn test_cycle_reported_with_partial_order() {
        let mut precedents = BTreeMap::new();
        precedents.insert(loc("A1"), vec![loc("B1")]);
        precedents.insert(loc("B1"), vec![loc("A1")]);
        precedents.insert(loc("C1"), vec![]);
        let result = build_order(&set(&["A1", "B1", "C1"]), &precedents);
        assert!(result.has_cycle);
        assert_eq!(result.order, vec![loc("C1")]);
        assert_eq!(result.unordered, vec![loc("A1"), loc("B1")]);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut precedents = BTreeMap::new();
        precedents.insert(loc("A1"), vec![loc("A1")]);
        let result = build_order(&set(&["A1"]), &precedents);
        assert!(result.has_cycle);
        assert_eq!(result.unordered, vec![loc("A1")]);
    }

    #[test]
    fn test_order_is_deterministic_for_independent_cells() {
        let vertices = set(&["B2", "A1", "C3"]);
        let precedents = BTreeMap::new();
        let first = build_order(&vertices, &precedents);
        let second = build_order(&vertices, &precedents);
        assert_eq!(first.order, second.order);
        assert_eq!(first.order, vec![loc("A1"), loc("B2"), loc("C3")]);
    }

    #[test]
    fn test_precedents_appear_strictly_earlier() {
        let mut precedents = BTreeMap::new();
        precedents.insert(loc("D1"), vec![loc("A1"), loc("B1")]);
        precedents.insert(loc("B1"), vec![loc("A1")]);
        let result = build_order(&set(&["A1", "B1", "D1"]), &precedents);
        let pos = |l: &CellLocation| result.order.iter().position(|x| x == l).unwrap();
        for (dependent, precs) in &precedents {
            for p in precs {
                assert!(pos(p) < pos(dependent), "{} should precede {}", p, dependent);
            }
        }
    }
}
