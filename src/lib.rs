//! Orchestration core for independent computation engines.
//!
//! Callers register engines with declared dependencies, then request
//! execution either in dependency-respecting phases or as one unordered
//! parallel batch. Execution is bounded by a concurrency limiter, guarded by
//! per-engine circuit breakers, de-duplicated per engine id, and observable
//! through a typed event bus and an aggregate health monitor.
//!
//! ```no_run
//! use std::sync::Arc;
//! use insight_engine::{
//!     EngineMetadata, EngineOrchestrator, ExecutionContext, OrchestratorConfig,
//! };
//!
//! # async fn demo(engine: Arc<dyn insight_engine::Engine>) -> insight_engine::Result<()> {
//! let orchestrator = EngineOrchestrator::new(OrchestratorConfig::default());
//! orchestrator
//!     .register_engine(engine, EngineMetadata::new("momentum"))
//!     .await?;
//! let results = orchestrator.execute_all(ExecutionContext::default()).await?;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;

pub use config::OrchestratorConfig;
pub use core::events::{EventBus, EventKind, OrchestratorEvent, SubscriptionId};
pub use core::ConcurrencyLimiter;
pub use engine::{
    Engine, EngineMetadata, EngineMetrics, EngineOrchestrator, EngineOutcome, EngineReport,
    ExecutionContext, ExecutionFilter, ExecutionPhase, ExecutionPlan, HealthStatus, SystemHealth,
};
pub use error::{OrchestratorError, Result};
