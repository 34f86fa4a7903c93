//! Groups a resolved order into sequential phases for intra-phase
//! parallelism.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::contract::EngineMetadata;
use crate::error::{OrchestratorError, Result};

/// A batch of engines whose dependencies are all satisfied by earlier
/// phases. Members may execute concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPhase {
    pub engine_ids: Vec<String>,
    /// Everything the members transitively depend on.
    pub depends_on: Vec<String>,
    /// Max of the members' registration-time estimates. Display hint only.
    pub estimated_duration_ms: u64,
}

/// Ordered phases for one `execute_all` call. Ephemeral: recomputed every
/// call, never cached across registrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub phases: Vec<ExecutionPhase>,
    pub total_engines: usize,
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    /// Phase index of an engine, if it appears in the plan.
    pub fn phase_of(&self, engine_id: &str) -> Option<usize> {
        self.phases
            .iter()
            .position(|phase| phase.engine_ids.iter().any(|id| id == engine_id))
    }
}

/// Build a phase plan from the resolver's flat order and the declared
/// dependencies. The defensive no-progress check fails with the same cycle
/// error as the resolver, though a validated order should never trip it.
pub fn build_plan(order: &[String], metadata: &[EngineMetadata]) -> Result<ExecutionPlan> {
    let by_id: HashMap<&str, &EngineMetadata> =
        metadata.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut placed: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&str> = order.iter().map(String::as_str).collect();
    let mut phases = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&str>, Vec<&str>) = remaining.iter().partition(|id| {
            by_id
                .get(*id)
                .map(|m| m.dependencies.iter().all(|dep| placed.contains(dep.as_str())))
                .unwrap_or(true)
        });

        if ready.is_empty() {
            let mut engines: Vec<String> = blocked.iter().map(|id| id.to_string()).collect();
            engines.sort();
            return Err(OrchestratorError::CyclicDependency { engines });
        }

        let estimated_duration_ms = ready
            .iter()
            .filter_map(|id| by_id.get(*id))
            .map(|m| m.estimated_duration_ms)
            .max()
            .unwrap_or(0);

        let mut depends_on: HashSet<String> = HashSet::new();
        for id in &ready {
            collect_transitive_deps(id, &by_id, &mut depends_on);
        }
        let mut depends_on: Vec<String> = depends_on.into_iter().collect();
        depends_on.sort();

        for id in &ready {
            placed.insert(id);
        }
        phases.push(ExecutionPhase {
            engine_ids: ready.iter().map(|id| id.to_string()).collect(),
            depends_on,
            estimated_duration_ms,
        });
        remaining = blocked;
    }

    debug!(
        phases = phases.len(),
        total_engines = order.len(),
        "Built execution plan"
    );

    Ok(ExecutionPlan {
        phases,
        total_engines: order.len(),
        created_at: Utc::now(),
    })
}

fn collect_transitive_deps(
    id: &str,
    by_id: &HashMap<&str, &EngineMetadata>,
    out: &mut HashSet<String>,
) {
    if let Some(metadata) = by_id.get(id) {
        for dep in &metadata.dependencies {
            if out.insert(dep.clone()) {
                collect_transitive_deps(dep, by_id, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::resolver::resolve_order;

    fn meta(id: &str, deps: &[&str]) -> EngineMetadata {
        EngineMetadata::new(id)
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    fn plan_for(metadata: Vec<EngineMetadata>) -> ExecutionPlan {
        let order = resolve_order(&metadata).unwrap();
        build_plan(&order, &metadata).unwrap()
    }

    #[test]
    fn diamond_produces_three_phases() {
        let plan = plan_for(vec![
            meta("a", &[]),
            meta("b", &[]),
            meta("c", &["a"]),
            meta("d", &["a", "b"]),
            meta("e", &["c", "d"]),
        ]);

        assert_eq!(plan.phases.len(), 3);
        let mut phase0 = plan.phases[0].engine_ids.clone();
        phase0.sort();
        assert_eq!(phase0, vec!["a", "b"]);
        let mut phase1 = plan.phases[1].engine_ids.clone();
        phase1.sort();
        assert_eq!(phase1, vec!["c", "d"]);
        assert_eq!(plan.phases[2].engine_ids, vec!["e"]);
    }

    #[test]
    fn every_dependency_lands_in_an_earlier_phase() {
        let metadata = vec![
            meta("a", &[]),
            meta("b", &["a"]),
            meta("c", &["a"]),
            meta("d", &["b", "c"]),
            meta("e", &["d"]),
        ];
        let plan = plan_for(metadata.clone());

        for m in &metadata {
            for dep in &m.dependencies {
                assert!(plan.phase_of(dep).unwrap() < plan.phase_of(&m.id).unwrap());
            }
        }
    }

    #[test]
    fn phase_estimate_is_max_of_members() {
        let metadata = vec![
            EngineMetadata::new("a").with_estimated_duration_ms(100),
            EngineMetadata::new("b").with_estimated_duration_ms(700),
        ];
        let plan = plan_for(metadata);
        assert_eq!(plan.phases[0].estimated_duration_ms, 700);
    }

    #[test]
    fn depends_on_is_transitive() {
        let plan = plan_for(vec![
            meta("a", &[]),
            meta("b", &["a"]),
            meta("c", &["b"]),
        ]);
        assert_eq!(plan.phases[2].depends_on, vec!["a", "b"]);
    }

    #[test]
    fn unresolvable_order_is_rejected_defensively() {
        // Hand the planner an order the resolver would never produce.
        let metadata = vec![meta("a", &["b"]), meta("b", &["a"])];
        let order = vec!["a".to_string(), "b".to_string()];
        let err = build_plan(&order, &metadata).unwrap_err();
        assert!(matches!(err, OrchestratorError::CyclicDependency { .. }));
    }
}
