//! Event fan-out for orchestrator lifecycle notifications.
//!
//! Subscribers receive every published event over an unbounded channel and
//! can cancel their subscription at any time; a dropped receiver is pruned on
//! the next publish, so unregistering never leaks senders.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use uuid::Uuid;

use crate::engine::health::SystemHealth;

/// Identifier handed out by [`EventBus::subscribe`], used to cancel the
/// subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

/// A single lifecycle notification.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EventKind {
    #[serde(rename = "engine:registered")]
    EngineRegistered { engine_id: String },
    #[serde(rename = "engine:unregistered")]
    EngineUnregistered { engine_id: String },
    #[serde(rename = "engine:execution-start")]
    ExecutionStart { engine_id: String },
    #[serde(rename = "engine:execution-success")]
    ExecutionSuccess { engine_id: String, duration_ms: u64 },
    #[serde(rename = "engine:execution-error")]
    ExecutionError {
        engine_id: String,
        duration_ms: u64,
        error: String,
    },
    #[serde(rename = "circuit-breaker:opened")]
    CircuitBreakerOpened {
        engine_id: String,
        failure_count: u32,
    },
    #[serde(rename = "execution:plan-created")]
    PlanCreated {
        phases: usize,
        total_engines: usize,
    },
    #[serde(rename = "execution:phase-start")]
    PhaseStart {
        phase: usize,
        engine_ids: Vec<String>,
    },
    #[serde(rename = "execution:phase-complete")]
    PhaseComplete {
        phase: usize,
        succeeded: usize,
        failed: usize,
    },
    #[serde(rename = "system:health-update")]
    HealthUpdate { health: SystemHealth },
}

type SubscriberMap = Arc<RwLock<HashMap<SubscriptionId, mpsc::UnboundedSender<OrchestratorEvent>>>>;

/// Publish/subscribe hub for [`OrchestratorEvent`]s.
///
/// Cloning is cheap; all clones share the same subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: SubscriberMap,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. The returned receiver yields every event
    /// published after this call.
    pub async fn subscribe(
        &self,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let id = SubscriptionId(Uuid::new_v4());
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.insert(id, tx);
        debug!(subscription_id = %id.0, "Event subscriber registered");
        (id, rx)
    }

    /// Like [`subscribe`](Self::subscribe), but wraps the receiver in a
    /// `Stream` for use with stream combinators.
    pub async fn subscribe_stream(
        &self,
    ) -> (SubscriptionId, UnboundedReceiverStream<OrchestratorEvent>) {
        let (id, rx) = self.subscribe().await;
        (id, UnboundedReceiverStream::new(rx))
    }

    /// Cancel a subscription. Safe to call twice.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.write().await.remove(&id).is_some() {
            debug!(subscription_id = %id.0, "Event subscriber removed");
        }
    }

    /// Publish an event to all live subscribers. Subscribers whose receiver
    /// has been dropped are pruned. Never blocks on a slow subscriber.
    pub async fn publish(&self, kind: EventKind) {
        let event = OrchestratorEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        };

        let dead: Vec<SubscriptionId> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .filter(|(_, tx)| tx.send(event.clone()).is_err())
                .map(|(id, _)| *id)
                .collect()
        };

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in dead {
                subscribers.remove(&id);
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe().await;

        bus.publish(EventKind::EngineRegistered {
            engine_id: "momentum".to_string(),
        })
        .await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.kind,
            EventKind::EngineRegistered { ref engine_id } if engine_id == "momentum"
        ));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (id, mut rx) = bus.subscribe().await;
        bus.unsubscribe(id).await;

        bus.publish(EventKind::EngineUnregistered {
            engine_id: "momentum".to_string(),
        })
        .await;

        // Sender side is gone, so the channel closes without a message.
        assert!(rx.recv().await.is_none());
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_publish() {
        let bus = EventBus::new();
        let (_id, rx) = bus.subscribe().await;
        drop(rx);

        bus.publish(EventKind::EngineRegistered {
            engine_id: "volatility".to_string(),
        })
        .await;

        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[test]
    fn events_serialize_with_kebab_case_names() {
        let event = OrchestratorEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: EventKind::ExecutionSuccess {
                engine_id: "momentum".to_string(),
                duration_ms: 42,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "engine:execution-success");
        assert_eq!(json["duration_ms"], 42);
    }
}
