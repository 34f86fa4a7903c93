//! Demo composition root: wires a handful of sample engines into an
//! orchestrator, runs a phased batch, and prints the health snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dotenv::dotenv;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insight_engine::{
    Engine, EngineMetadata, EngineMetrics, EngineOrchestrator, EngineReport, ExecutionContext,
    OrchestratorConfig, Result,
};

/// A stand-in computation unit: sleeps for its configured duration and
/// reports a fixed score.
struct SampleEngine {
    id: String,
    duration: Duration,
    score: f64,
}

impl SampleEngine {
    fn new(id: &str, duration_ms: u64, score: f64) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            duration: Duration::from_millis(duration_ms),
            score,
        })
    }
}

#[async_trait]
impl Engine for SampleEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<EngineReport> {
        tokio::time::sleep(self.duration).await;
        Ok(
            EngineReport::new(self.id.clone(), json!({ "score": self.score }))
                .with_confidence(self.score),
        )
    }

    fn metrics(&self) -> Option<EngineMetrics> {
        Some(EngineMetrics {
            confidence_score: self.score,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = OrchestratorConfig::from_env();
    let orchestrator = EngineOrchestrator::new(config);

    let engines: Vec<(Arc<SampleEngine>, EngineMetadata)> = vec![
        (
            SampleEngine::new("momentum", 40, 0.82),
            EngineMetadata::new("momentum")
                .with_category("signal")
                .with_priority(10),
        ),
        (
            SampleEngine::new("volatility", 30, 0.77),
            EngineMetadata::new("volatility")
                .with_category("signal")
                .with_priority(5),
        ),
        (
            SampleEngine::new("correlation", 25, 0.71),
            EngineMetadata::new("correlation")
                .with_category("signal")
                .with_dependencies(vec!["momentum".to_string()]),
        ),
        (
            SampleEngine::new("portfolio-risk", 60, 0.88),
            EngineMetadata::new("portfolio-risk")
                .with_category("risk")
                .with_dependencies(vec!["momentum".to_string(), "volatility".to_string()]),
        ),
        (
            SampleEngine::new("allocation", 35, 0.9),
            EngineMetadata::new("allocation")
                .with_category("advice")
                .with_dependencies(vec!["correlation".to_string(), "portfolio-risk".to_string()]),
        ),
    ];

    for (engine, metadata) in engines {
        orchestrator.register_engine(engine, metadata).await?;
    }

    // Log every lifecycle event as it happens.
    let (subscription, mut events) = orchestrator.subscribe().await;
    let logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(event = %serde_json::to_string(&event).unwrap_or_default(), "orchestrator event");
        }
    });

    orchestrator.start_health_monitor().await;

    let plan = orchestrator.plan(None).await?;
    info!(phases = plan.phases.len(), "Execution plan ready");

    let results = orchestrator.execute_all(ExecutionContext::default()).await?;
    for (id, outcome) in &results {
        info!(engine_id = %id, completed = outcome.is_completed(), "engine finished");
    }

    let health = orchestrator.health().await;
    println!("{}", serde_json::to_string_pretty(&health)?);

    orchestrator.stop_health_monitor().await;
    orchestrator.unsubscribe(subscription).await;
    logger.await?;

    Ok(())
}
