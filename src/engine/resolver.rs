//! Dependency ordering via depth-first topological sort.
//!
//! Inputs are pre-sorted by descending priority so higher-priority engines
//! are visited, and thus scheduled, earlier among dependency-order ties.
//! The tie-break is deterministic, not a correctness requirement.

use std::collections::HashMap;

use tracing::debug;

use crate::engine::contract::EngineMetadata;
use crate::error::{OrchestratorError, Result};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Produce a flat ordering of the given metadata set in which every
/// dependency precedes its dependents.
///
/// Fails with [`OrchestratorError::CyclicDependency`] naming the engines on
/// the active visit stack when a back-edge is found, and with
/// [`OrchestratorError::MissingDependency`] when an engine depends on an id
/// absent from the input set.
pub fn resolve_order(metadata: &[EngineMetadata]) -> Result<Vec<String>> {
    let by_id: HashMap<&str, &EngineMetadata> =
        metadata.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut roots: Vec<&EngineMetadata> = metadata.iter().collect();
    roots.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    let mut marks: HashMap<&str, Mark> = metadata
        .iter()
        .map(|m| (m.id.as_str(), Mark::Unvisited))
        .collect();
    let mut stack: Vec<String> = Vec::new();
    let mut order: Vec<String> = Vec::with_capacity(metadata.len());

    for root in roots {
        visit(root, &by_id, &mut marks, &mut stack, &mut order)?;
    }

    debug!(engines = order.len(), "Resolved dependency order");
    Ok(order)
}

fn visit<'a>(
    node: &'a EngineMetadata,
    by_id: &HashMap<&'a str, &'a EngineMetadata>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    match marks[node.id.as_str()] {
        Mark::Visited => return Ok(()),
        Mark::Visiting => {
            // Reaching a Visiting node through a dependency edge means a
            // back-edge; the cycle is the stack suffix from that node on.
            return Err(cycle_from_stack(stack, &node.id));
        }
        Mark::Unvisited => {}
    }

    marks.insert(&node.id, Mark::Visiting);
    stack.push(node.id.clone());

    // Visit dependencies in the same priority order as the roots, keeping
    // the overall ordering deterministic.
    let mut deps: Vec<&str> = node.dependencies.iter().map(String::as_str).collect();
    deps.sort_by(|a, b| {
        let pa = by_id.get(a).map(|m| m.priority).unwrap_or_default();
        let pb = by_id.get(b).map(|m| m.priority).unwrap_or_default();
        pb.cmp(&pa).then_with(|| a.cmp(b))
    });

    for dep in deps {
        match by_id.get(dep) {
            Some(dep_metadata) => {
                if marks[dep] == Mark::Visiting {
                    return Err(cycle_from_stack(stack, dep));
                }
                visit(dep_metadata, by_id, marks, stack, order)?;
            }
            None => {
                return Err(OrchestratorError::MissingDependency {
                    engine: node.id.clone(),
                    dependency: dep.to_string(),
                });
            }
        }
    }

    stack.pop();
    marks.insert(&node.id, Mark::Visited);
    order.push(node.id.clone());
    Ok(())
}

fn cycle_from_stack(stack: &[String], back_edge_target: &str) -> OrchestratorError {
    let start = stack
        .iter()
        .position(|id| id == back_edge_target)
        .unwrap_or(0);
    let mut engines: Vec<String> = stack[start..].to_vec();
    engines.sort();
    OrchestratorError::CyclicDependency { engines }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, deps: &[&str]) -> EngineMetadata {
        EngineMetadata::new(id)
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn dependencies_precede_dependents() {
        let metadata = vec![
            meta("e", &["c", "d"]),
            meta("c", &["a"]),
            meta("d", &["a", "b"]),
            meta("a", &[]),
            meta("b", &[]),
        ];
        let order = resolve_order(&metadata).unwrap();
        assert_eq!(order.len(), 5);
        for (engine, deps) in [("c", vec!["a"]), ("d", vec!["a", "b"]), ("e", vec!["c", "d"])] {
            for dep in deps {
                assert!(position(&order, dep) < position(&order, engine));
            }
        }
    }

    #[test]
    fn cycle_is_detected_and_named() {
        let metadata = vec![meta("a", &["b"]), meta("b", &["c"]), meta("c", &["a"])];
        let err = resolve_order(&metadata).unwrap_err();
        match err {
            OrchestratorError::CyclicDependency { engines } => {
                assert_eq!(engines, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let metadata = vec![meta("a", &["a"])];
        let err = resolve_order(&metadata).unwrap_err();
        assert!(matches!(err, OrchestratorError::CyclicDependency { .. }));
    }

    #[test]
    fn missing_dependency_names_the_pair() {
        let metadata = vec![meta("a", &["phantom"])];
        let err = resolve_order(&metadata).unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::MissingDependency {
                engine: "a".to_string(),
                dependency: "phantom".to_string(),
            }
        );
    }

    #[test]
    fn priority_breaks_ties_deterministically() {
        let metadata = vec![
            EngineMetadata::new("slow").with_priority(1),
            EngineMetadata::new("fast").with_priority(9),
            EngineMetadata::new("mid").with_priority(5),
        ];
        let order = resolve_order(&metadata).unwrap();
        assert_eq!(order, vec!["fast", "mid", "slow"]);
    }

    #[test]
    fn empty_input_resolves_to_empty_order() {
        assert!(resolve_order(&[]).unwrap().is_empty());
    }
}
