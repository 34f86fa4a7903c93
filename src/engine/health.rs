//! Read-only aggregate health reporting.
//!
//! The monitor polls each engine's optional health capabilities and the
//! limiter's load. It never starts or stops an engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::concurrency::ConcurrencyLimiter;
use crate::core::events::{EventBus, EventKind};
use crate::engine::registry::EngineRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

/// Point-in-time aggregate view of the registered engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub healthy_engines: usize,
    pub total_engines: usize,
    /// Mean of self-reported confidence, over engines exposing metrics.
    pub average_confidence: f64,
    /// In-flight executions divided by the concurrency limit.
    pub system_load: f64,
    pub overall_status: HealthStatus,
}

impl SystemHealth {
    fn classify(healthy_fraction: f64, average_confidence: f64) -> HealthStatus {
        if healthy_fraction >= 0.8 && average_confidence >= 0.7 {
            HealthStatus::Healthy
        } else if healthy_fraction >= 0.5 && average_confidence >= 0.4 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Critical
        }
    }
}

/// Periodically snapshots [`SystemHealth`] and publishes it on the bus.
pub struct HealthMonitor {
    registry: Arc<EngineRegistry>,
    limiter: ConcurrencyLimiter,
    events: EventBus,
    interval: std::time::Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<EngineRegistry>,
        limiter: ConcurrencyLimiter,
        events: EventBus,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            registry,
            limiter,
            events,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Compute a health snapshot on demand.
    pub async fn snapshot(&self) -> SystemHealth {
        let entries = self.registry.entries().await;
        let total_engines = entries.len();

        let healthy_engines = entries
            .iter()
            .filter(|entry| entry.engine.is_healthy())
            .count();

        let confidences: Vec<f64> = entries
            .iter()
            .filter_map(|entry| entry.engine.metrics())
            .map(|m| m.confidence_score)
            .collect();
        let average_confidence = if confidences.is_empty() {
            // No engine exposes metrics; let the healthy fraction decide.
            1.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        let healthy_fraction = if total_engines == 0 {
            1.0
        } else {
            healthy_engines as f64 / total_engines as f64
        };

        let snapshot = SystemHealth {
            healthy_engines,
            total_engines,
            average_confidence,
            system_load: self.limiter.load(),
            overall_status: SystemHealth::classify(healthy_fraction, average_confidence),
        };

        debug!(
            healthy = healthy_engines,
            total = total_engines,
            average_confidence = average_confidence,
            status = ?snapshot.overall_status,
            "Computed health snapshot"
        );

        snapshot
    }

    /// Start the periodic snapshot task. Idempotent: a second call replaces
    /// the previous task.
    pub async fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the monitor
            // reports on a steady cadence after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let health = monitor.snapshot().await;
                monitor
                    .events
                    .publish(EventKind::HealthUpdate { health })
                    .await;
            }
        });

        let mut task = self.task.lock().await;
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
        info!(interval_ms = interval.as_millis() as u64, "Health monitor started");
    }

    /// Stop the periodic task, if running.
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!("Health monitor stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_match_specified_bands() {
        assert_eq!(SystemHealth::classify(0.9, 0.75), HealthStatus::Healthy);
        assert_eq!(SystemHealth::classify(0.8, 0.7), HealthStatus::Healthy);
        assert_eq!(SystemHealth::classify(0.6, 0.5), HealthStatus::Degraded);
        assert_eq!(SystemHealth::classify(0.9, 0.5), HealthStatus::Degraded);
        assert_eq!(SystemHealth::classify(0.2, 0.9), HealthStatus::Critical);
        assert_eq!(SystemHealth::classify(0.6, 0.3), HealthStatus::Critical);
    }
}
