use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Runtime configuration for an [`EngineOrchestrator`](crate::EngineOrchestrator).
///
/// All durations are stored in milliseconds so the struct round-trips cleanly
/// through serde and environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently executing engines.
    pub max_concurrent_engines: usize,
    /// Interval for the background health monitor.
    pub health_check_interval_ms: u64,
    /// Advisory hint for how long dependency chains are expected to take.
    /// Not enforced as a hard abort.
    pub dependency_timeout_ms: u64,
    /// When false, breakers always admit and never record outcomes.
    pub enable_circuit_breaker: bool,
    /// Consecutive failures before a breaker opens.
    pub circuit_breaker_threshold: u32,
    /// Cool-down before an open breaker admits a half-open probe.
    pub circuit_breaker_reset_timeout_ms: u64,
    /// Optional hard cap on a single `execute()` call. A timer win counts as
    /// a failure but cannot abort the underlying call.
    pub execution_timeout_ms: Option<u64>,
    /// When true, engines whose declared dependencies failed in an earlier
    /// phase are skipped instead of executed.
    pub skip_on_dependency_failure: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_engines: 8,
            health_check_interval_ms: 30_000,
            dependency_timeout_ms: 60_000,
            enable_circuit_breaker: true,
            circuit_breaker_threshold: 3,
            circuit_breaker_reset_timeout_ms: 60_000,
            execution_timeout_ms: None,
            skip_on_dependency_failure: false,
        }
    }
}

impl OrchestratorConfig {
    /// Build a config from `INSIGHT_*` environment variables, falling back to
    /// defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_engines: env_parse(
                "INSIGHT_MAX_CONCURRENT_ENGINES",
                defaults.max_concurrent_engines,
            ),
            health_check_interval_ms: env_parse(
                "INSIGHT_HEALTH_CHECK_INTERVAL_MS",
                defaults.health_check_interval_ms,
            ),
            dependency_timeout_ms: env_parse(
                "INSIGHT_DEPENDENCY_TIMEOUT_MS",
                defaults.dependency_timeout_ms,
            ),
            enable_circuit_breaker: env_parse(
                "INSIGHT_ENABLE_CIRCUIT_BREAKER",
                defaults.enable_circuit_breaker,
            ),
            circuit_breaker_threshold: env_parse(
                "INSIGHT_CIRCUIT_BREAKER_THRESHOLD",
                defaults.circuit_breaker_threshold,
            ),
            circuit_breaker_reset_timeout_ms: env_parse(
                "INSIGHT_CIRCUIT_BREAKER_RESET_TIMEOUT_MS",
                defaults.circuit_breaker_reset_timeout_ms,
            ),
            execution_timeout_ms: std::env::var("INSIGHT_EXECUTION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            skip_on_dependency_failure: env_parse(
                "INSIGHT_SKIP_ON_DEPENDENCY_FAILURE",
                defaults.skip_on_dependency_failure,
            ),
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn circuit_breaker_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_reset_timeout_ms)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key = key, value = %raw, "Unparsable config value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent_engines, 8);
        assert_eq!(config.health_check_interval_ms, 30_000);
        assert_eq!(config.circuit_breaker_threshold, 3);
        assert_eq!(config.circuit_breaker_reset_timeout_ms, 60_000);
        assert!(config.enable_circuit_breaker);
        assert!(config.execution_timeout_ms.is_none());
        assert!(!config.skip_on_dependency_failure);
    }

    #[test]
    fn duration_helpers_convert_millis() {
        let config = OrchestratorConfig {
            execution_timeout_ms: Some(250),
            ..Default::default()
        };
        assert_eq!(config.execution_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.health_check_interval(), Duration::from_secs(30));
    }
}
