//! The uniform contract every computation engine satisfies.
//!
//! The orchestration core never inspects what an engine computes; it only
//! relies on `execute()` settling and on the optional health capabilities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An independently registered computation unit.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Unique, stable identifier. Must match the id used at registration.
    fn id(&self) -> &str;

    /// Perform the engine's computation. Must resolve or fail; the core
    /// cannot abort a hung call without a configured execution timeout.
    async fn execute(&self) -> Result<EngineReport>;

    /// Optional health capability, used only by the health monitor. Engines
    /// that do not implement it are counted as healthy.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Optional metrics capability, used only by the health monitor. Engines
    /// returning `None` are excluded from the confidence average.
    fn metrics(&self) -> Option<EngineMetrics> {
        None
    }
}

/// Self-reported quality metrics, read by the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Confidence in the engine's latest output, in `[0.0, 1.0]`.
    pub confidence_score: f64,
}

/// The output of a single `execute()` call. Opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    pub engine_id: String,
    pub generated_at: DateTime<Utc>,
    /// Confidence in this particular result, if the engine reports one.
    pub confidence: Option<f64>,
    /// Engine-specific payload, rendered or persisted downstream.
    pub payload: serde_json::Value,
}

impl EngineReport {
    pub fn new(engine_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            engine_id: engine_id.into(),
            generated_at: Utc::now(),
            confidence: None,
            payload,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Registration-time description of an engine. Immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetadata {
    pub id: String,
    /// Ids of engines that must complete before this one in phase mode.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Higher priority runs earlier among dependency-order ties.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pillar: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Planning-display hint only; never enforced.
    #[serde(default)]
    pub estimated_duration_ms: u64,
}

impl EngineMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            priority: 0,
            category: None,
            pillar: None,
            tags: Vec::new(),
            estimated_duration_ms: 0,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_pillar(mut self, pillar: impl Into<String>) -> Self {
        self.pillar = Some(pillar.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_estimated_duration_ms(mut self, estimated_duration_ms: u64) -> Self {
        self.estimated_duration_ms = estimated_duration_ms;
        self
    }
}

/// Optional predicate over classification fields, used to narrow an
/// `execute_all` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionFilter {
    pub category: Option<String>,
    pub pillar: Option<String>,
    /// Metadata matches when it carries at least one of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ExecutionFilter {
    pub fn matches(&self, metadata: &EngineMetadata) -> bool {
        if let Some(category) = &self.category {
            if metadata.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(pillar) = &self.pillar {
            if metadata.pillar.as_deref() != Some(pillar.as_str()) {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| metadata.tags.contains(t)) {
            return false;
        }
        true
    }
}
