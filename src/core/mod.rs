//! Cross-cutting building blocks: event fan-out and admission control.

pub mod concurrency;
pub mod events;

pub use concurrency::ConcurrencyLimiter;
pub use events::{EventBus, EventKind, OrchestratorEvent, SubscriptionId};
