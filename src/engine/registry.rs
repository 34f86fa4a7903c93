//! In-memory table of registered engines and their metadata.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::engine::contract::{Engine, EngineMetadata, ExecutionFilter};
use crate::error::{OrchestratorError, Result};

/// An engine paired with its registration metadata.
#[derive(Clone)]
pub struct RegisteredEngine {
    pub engine: Arc<dyn Engine>,
    pub metadata: EngineMetadata,
}

impl std::fmt::Debug for RegisteredEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredEngine")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Pure CRUD over the set of registered engines. All scheduling logic lives
/// in the orchestrator.
#[derive(Default)]
pub struct EngineRegistry {
    engines: RwLock<HashMap<String, RegisteredEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an engine keyed by its metadata id. Re-registering an id
    /// replaces the previous entry.
    pub async fn register(&self, engine: Arc<dyn Engine>, metadata: EngineMetadata) {
        let id = metadata.id.clone();
        let previous = self
            .engines
            .write()
            .await
            .insert(id.clone(), RegisteredEngine { engine, metadata });

        if previous.is_some() {
            warn!(engine_id = %id, "Replaced previously registered engine");
        } else {
            debug!(engine_id = %id, "Engine registered");
        }
    }

    /// Remove an engine and its metadata.
    pub async fn unregister(&self, id: &str) -> Result<RegisteredEngine> {
        self.engines
            .write()
            .await
            .remove(id)
            .ok_or_else(|| OrchestratorError::NotFound {
                engine: id.to_string(),
            })
    }

    pub async fn get(&self, id: &str) -> Result<RegisteredEngine> {
        self.engines
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound {
                engine: id.to_string(),
            })
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.engines.read().await.contains_key(id)
    }

    /// Metadata matching the optional filter, sorted by descending priority
    /// (id as a deterministic secondary key).
    pub async fn list(&self, filter: Option<&ExecutionFilter>) -> Vec<EngineMetadata> {
        let engines = self.engines.read().await;
        let mut selected: Vec<EngineMetadata> = engines
            .values()
            .map(|entry| entry.metadata.clone())
            .filter(|metadata| filter.map_or(true, |f| f.matches(metadata)))
            .collect();
        selected.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        selected
    }

    /// Snapshot of all registered entries, for the health monitor.
    pub async fn entries(&self) -> Vec<RegisteredEngine> {
        self.engines.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.engines.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.engines.read().await.is_empty()
    }
}
