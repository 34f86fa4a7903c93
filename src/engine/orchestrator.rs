//! The coordinator: owns the registry, drives execution plans, routes
//! outcomes through per-engine breakers, and publishes lifecycle events.
//!
//! An orchestrator is an explicitly constructed value owned by the caller's
//! composition root. There is no global instance; multiple independent
//! orchestrators can coexist in one process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::core::concurrency::ConcurrencyLimiter;
use crate::core::events::{EventBus, EventKind, OrchestratorEvent, SubscriptionId};
use crate::engine::breaker::{BreakerConfig, BreakerState, CircuitBreakerTable};
use crate::engine::contract::{Engine, EngineMetadata, EngineReport, ExecutionFilter};
use crate::engine::health::{HealthMonitor, SystemHealth};
use crate::engine::planner::{self, ExecutionPlan};
use crate::engine::registry::EngineRegistry;
use crate::engine::resolver;
use crate::error::{OrchestratorError, Result};

/// Options for one `execute_all` call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Narrow the run to engines matching this filter.
    pub filter: Option<ExecutionFilter>,
    /// When true, ignore dependencies and submit everything at once.
    pub parallel: bool,
    /// Override the configured `skip_on_dependency_failure` policy for this
    /// call.
    pub skip_on_dependency_failure: Option<bool>,
}

/// Per-engine result of an `execute_all` call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EngineOutcome {
    Completed { report: EngineReport },
    Failed { error: String },
    Skipped { missing_dependencies: Vec<String> },
}

impl EngineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, EngineOutcome::Completed { .. })
    }
}

type SharedExecution = Shared<BoxFuture<'static, Result<EngineReport>>>;

/// Coordinates engine registration, planning, bounded execution, fault
/// isolation, and health reporting.
pub struct EngineOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<EngineRegistry>,
    breakers: Arc<CircuitBreakerTable>,
    limiter: ConcurrencyLimiter,
    events: EventBus,
    in_flight: Arc<Mutex<HashMap<String, SharedExecution>>>,
    monitor: Arc<HealthMonitor>,
}

impl EngineOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let registry = Arc::new(EngineRegistry::new());
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_engines);
        let events = EventBus::new();
        let breakers = Arc::new(CircuitBreakerTable::new(BreakerConfig {
            enabled: config.enable_circuit_breaker,
            failure_threshold: config.circuit_breaker_threshold,
            reset_timeout: config.circuit_breaker_reset_timeout(),
        }));
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            limiter.clone(),
            events.clone(),
            config.health_check_interval(),
        ));

        info!(
            max_concurrent_engines = config.max_concurrent_engines,
            circuit_breaker = config.enable_circuit_breaker,
            "Engine orchestrator created"
        );

        Self {
            config,
            registry,
            breakers,
            limiter,
            events,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            monitor,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    // ---- registration -----------------------------------------------------

    /// Register an engine under `metadata.id`, seeding its breaker state.
    pub async fn register_engine(
        &self,
        engine: Arc<dyn Engine>,
        metadata: EngineMetadata,
    ) -> Result<()> {
        if engine.id() != metadata.id {
            return Err(OrchestratorError::Configuration(format!(
                "engine id '{}' does not match metadata id '{}'",
                engine.id(),
                metadata.id
            )));
        }

        let id = metadata.id.clone();
        self.registry.register(engine, metadata).await;
        self.breakers.register(&id).await;
        self.events
            .publish(EventKind::EngineRegistered { engine_id: id })
            .await;
        Ok(())
    }

    /// Remove an engine, its breaker state, and any pending in-flight entry.
    /// The in-flight future, if any, is left to settle; its result is simply
    /// no longer joinable through this orchestrator.
    pub async fn unregister_engine(&self, id: &str) -> Result<()> {
        self.registry.unregister(id).await?;
        self.breakers.remove(id).await;
        self.in_flight.lock().await.remove(id);
        self.events
            .publish(EventKind::EngineUnregistered {
                engine_id: id.to_string(),
            })
            .await;
        Ok(())
    }

    // ---- single-engine execution ------------------------------------------

    /// Execute one engine, de-duplicating concurrent requests for the same
    /// id onto a single underlying `execute()` call.
    pub async fn execute_engine(&self, id: &str) -> Result<EngineReport> {
        let entry = self.registry.get(id).await?;

        if !self.breakers.can_execute(id).await {
            debug!(engine_id = id, "Rejected by open circuit breaker");
            return Err(OrchestratorError::CircuitOpen {
                engine: id.to_string(),
            });
        }

        let execution = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(id) {
                Some(existing) => {
                    debug!(engine_id = id, "Joining in-flight execution");
                    existing.clone()
                }
                None => {
                    let execution = self.build_execution(id.to_string(), entry.engine);
                    in_flight.insert(id.to_string(), execution.clone());
                    execution
                }
            }
        };

        execution.await
    }

    /// Build the shared future that performs one gated `execute()` call and
    /// settles the breaker and event bookkeeping.
    fn build_execution(&self, id: String, engine: Arc<dyn Engine>) -> SharedExecution {
        let limiter = self.limiter.clone();
        let breakers = Arc::clone(&self.breakers);
        let events = self.events.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.config.execution_timeout();

        async move {
            let _permit = limiter.acquire().await?;

            events
                .publish(EventKind::ExecutionStart {
                    engine_id: id.clone(),
                })
                .await;
            let started = Instant::now();

            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, engine.execute()).await {
                    Ok(result) => result,
                    // The underlying call is not aborted; it may still
                    // complete in the background.
                    Err(_) => Err(OrchestratorError::Timeout {
                        engine: id.clone(),
                        timeout_ms: limit.as_millis() as u64,
                    }),
                },
                None => engine.execute().await,
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            in_flight.lock().await.remove(&id);

            match outcome {
                Ok(report) => {
                    breakers.record_success(&id).await;
                    info!(engine_id = %id, duration_ms, "Engine execution succeeded");
                    events
                        .publish(EventKind::ExecutionSuccess {
                            engine_id: id.clone(),
                            duration_ms,
                        })
                        .await;
                    Ok(report)
                }
                Err(err) => {
                    error!(engine_id = %id, duration_ms, error = %err, "Engine execution failed");
                    events
                        .publish(EventKind::ExecutionError {
                            engine_id: id.clone(),
                            duration_ms,
                            error: err.to_string(),
                        })
                        .await;
                    if let Some(failure_count) = breakers.record_failure(&id).await {
                        events
                            .publish(EventKind::CircuitBreakerOpened {
                                engine_id: id.clone(),
                                failure_count,
                            })
                            .await;
                    }
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }

    // ---- batch execution --------------------------------------------------

    /// Execute every engine selected by the context.
    ///
    /// Individual engine failures are recorded in the result map and never
    /// abort the batch; only planning errors (cycles, missing dependencies)
    /// fail the whole call, before any engine runs.
    pub async fn execute_all(
        &self,
        context: ExecutionContext,
    ) -> Result<HashMap<String, EngineOutcome>> {
        let selected = self.registry.list(context.filter.as_ref()).await;
        info!(
            selected = selected.len(),
            parallel = context.parallel,
            "Starting batch execution"
        );

        if context.parallel {
            Ok(self.execute_unordered(&selected).await)
        } else {
            let skip_on_dependency_failure = context
                .skip_on_dependency_failure
                .unwrap_or(self.config.skip_on_dependency_failure);
            self.execute_phased(&selected, skip_on_dependency_failure)
                .await
        }
    }

    /// Build the phase plan for a selection without executing anything.
    pub async fn plan(&self, filter: Option<&ExecutionFilter>) -> Result<ExecutionPlan> {
        let selected = self.registry.list(filter).await;
        let order = resolver::resolve_order(&selected)?;
        planner::build_plan(&order, &selected)
    }

    async fn execute_unordered(
        &self,
        selected: &[EngineMetadata],
    ) -> HashMap<String, EngineOutcome> {
        let executions = selected.iter().map(|metadata| {
            let id = metadata.id.clone();
            async move {
                let outcome = self.execute_engine(&id).await;
                (id, outcome)
            }
        });

        join_all(executions)
            .await
            .into_iter()
            .map(|(id, outcome)| (id, Self::into_outcome(outcome)))
            .collect()
    }

    async fn execute_phased(
        &self,
        selected: &[EngineMetadata],
        skip_on_dependency_failure: bool,
    ) -> Result<HashMap<String, EngineOutcome>> {
        let order = resolver::resolve_order(selected)?;
        let plan = planner::build_plan(&order, selected)?;
        let dependencies: HashMap<&str, &[String]> = selected
            .iter()
            .map(|m| (m.id.as_str(), m.dependencies.as_slice()))
            .collect();

        self.events
            .publish(EventKind::PlanCreated {
                phases: plan.phases.len(),
                total_engines: plan.total_engines,
            })
            .await;

        let mut results: HashMap<String, EngineOutcome> = HashMap::new();
        // Engines that failed or were skipped; consulted when the skip
        // policy is active.
        let mut unsuccessful: HashSet<String> = HashSet::new();

        for (index, phase) in plan.phases.iter().enumerate() {
            self.events
                .publish(EventKind::PhaseStart {
                    phase: index,
                    engine_ids: phase.engine_ids.clone(),
                })
                .await;

            let mut runnable: Vec<String> = Vec::with_capacity(phase.engine_ids.len());
            for id in &phase.engine_ids {
                if skip_on_dependency_failure {
                    let missing: Vec<String> = dependencies
                        .get(id.as_str())
                        .into_iter()
                        .flat_map(|deps| deps.iter())
                        .filter(|dep| unsuccessful.contains(dep.as_str()))
                        .cloned()
                        .collect();
                    if !missing.is_empty() {
                        warn!(engine_id = %id, missing = ?missing, "Skipping engine, dependencies unsuccessful");
                        unsuccessful.insert(id.clone());
                        results.insert(
                            id.clone(),
                            EngineOutcome::Skipped {
                                missing_dependencies: missing,
                            },
                        );
                        continue;
                    }
                }
                runnable.push(id.clone());
            }

            let executions = runnable.iter().map(|id| {
                let id = id.clone();
                async move {
                    let outcome = self.execute_engine(&id).await;
                    (id, outcome)
                }
            });

            let mut succeeded = 0usize;
            let mut failed = 0usize;
            for (id, outcome) in join_all(executions).await {
                match &outcome {
                    Ok(_) => succeeded += 1,
                    Err(_) => {
                        failed += 1;
                        unsuccessful.insert(id.clone());
                    }
                }
                results.insert(id, Self::into_outcome(outcome));
            }

            self.events
                .publish(EventKind::PhaseComplete {
                    phase: index,
                    succeeded,
                    failed,
                })
                .await;
        }

        Ok(results)
    }

    fn into_outcome(result: Result<EngineReport>) -> EngineOutcome {
        match result {
            Ok(report) => EngineOutcome::Completed { report },
            Err(err) => EngineOutcome::Failed {
                error: err.to_string(),
            },
        }
    }

    // ---- health & events --------------------------------------------------

    /// On-demand health snapshot.
    pub async fn health(&self) -> SystemHealth {
        self.monitor.snapshot().await
    }

    /// Start the periodic health monitor (interval from configuration).
    pub async fn start_health_monitor(&self) {
        self.monitor.start().await;
    }

    pub async fn stop_health_monitor(&self) {
        self.monitor.stop().await;
    }

    /// Subscribe to lifecycle events. Cancel with [`unsubscribe`](Self::unsubscribe).
    pub async fn subscribe(
        &self,
    ) -> (
        SubscriptionId,
        tokio::sync::mpsc::UnboundedReceiver<OrchestratorEvent>,
    ) {
        self.events.subscribe().await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id).await;
    }

    /// Breaker state for one engine, if registered.
    pub async fn breaker_state(&self, id: &str) -> Option<BreakerState> {
        self.breakers.state(id).await
    }
}

impl Default for EngineOrchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}
