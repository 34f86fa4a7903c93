//! Engine orchestration: registration, dependency planning, bounded
//! execution, fault isolation, and health reporting.

pub mod breaker;
pub mod contract;
pub mod health;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod resolver;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreakerTable};
pub use contract::{Engine, EngineMetadata, EngineMetrics, EngineReport, ExecutionFilter};
pub use health::{HealthMonitor, HealthStatus, SystemHealth};
pub use orchestrator::{EngineOrchestrator, EngineOutcome, ExecutionContext};
pub use planner::{ExecutionPhase, ExecutionPlan};
pub use registry::{EngineRegistry, RegisteredEngine};
