//! Per-engine circuit breakers.
//!
//! Each registered engine gets an independent breaker. The open -> half-open
//! transition is lazy: it happens the next time the breaker is consulted
//! after the reset timeout has elapsed, admitting a single probe call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Breaker tuning, derived from the orchestrator config.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Snapshot of one breaker's state, for inspection and tests.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerState {
    pub failure_count: u32,
    pub is_open: bool,
    /// Milliseconds since the last recorded failure, if any.
    pub last_failure_age_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct BreakerEntry {
    failure_count: u32,
    last_failure_time: Option<Instant>,
    is_open: bool,
}

/// Table of breakers keyed by engine id. Entries are created at
/// registration and discarded on unregistration.
pub struct CircuitBreakerTable {
    config: BreakerConfig,
    states: RwLock<HashMap<String, BreakerEntry>>,
}

impl CircuitBreakerTable {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, id: &str) {
        self.states
            .write()
            .await
            .insert(id.to_string(), BreakerEntry::default());
    }

    pub async fn remove(&self, id: &str) {
        self.states.write().await.remove(id);
    }

    /// Whether an execution attempt may proceed. An open breaker admits one
    /// probe once the reset timeout has elapsed (half-open).
    pub async fn can_execute(&self, id: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let states = self.states.read().await;
        match states.get(id) {
            Some(entry) if entry.is_open => match entry.last_failure_time {
                Some(at) => {
                    let allowed = at.elapsed() >= self.config.reset_timeout;
                    if allowed {
                        debug!(engine_id = id, "Circuit breaker half-open, admitting probe");
                    }
                    allowed
                }
                None => true,
            },
            _ => true,
        }
    }

    /// Full reset: failure count to zero, breaker closed.
    pub async fn record_success(&self, id: &str) {
        if !self.config.enabled {
            return;
        }

        let mut states = self.states.write().await;
        if let Some(entry) = states.get_mut(id) {
            if entry.is_open {
                info!(engine_id = id, "Circuit breaker closed after successful probe");
            }
            entry.failure_count = 0;
            entry.last_failure_time = None;
            entry.is_open = false;
        }
    }

    /// Record a failure. Returns `Some(failure_count)` when this failure
    /// transitioned the breaker from closed to open.
    pub async fn record_failure(&self, id: &str) -> Option<u32> {
        if !self.config.enabled {
            return None;
        }

        let mut states = self.states.write().await;
        let entry = states.entry(id.to_string()).or_default();
        entry.failure_count += 1;
        entry.last_failure_time = Some(Instant::now());

        if entry.failure_count >= self.config.failure_threshold {
            let newly_opened = !entry.is_open;
            entry.is_open = true;
            warn!(
                engine_id = id,
                failure_count = entry.failure_count,
                "Circuit breaker open"
            );
            if newly_opened {
                return Some(entry.failure_count);
            }
        }
        None
    }

    pub async fn state(&self, id: &str) -> Option<BreakerState> {
        let states = self.states.read().await;
        states.get(id).map(|entry| BreakerState {
            failure_count: entry.failure_count,
            is_open: entry.is_open,
            last_failure_age_ms: entry
                .last_failure_time
                .map(|at| at.elapsed().as_millis() as u64),
        })
    }

    /// Ids whose breaker is currently open and still inside its cool-down.
    pub async fn open_count(&self) -> usize {
        let states = self.states.read().await;
        states
            .values()
            .filter(|entry| {
                entry.is_open
                    && entry
                        .last_failure_time
                        .map(|at| at.elapsed() < self.config.reset_timeout)
                        .unwrap_or(false)
            })
            .count()
    }
}
