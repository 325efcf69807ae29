//! EventBus service for change-notification fan-out.
//!
//! Emits coarse "something changed about X" hints after commits. Emission
//! is best-effort and lock-free: a broadcast send with no subscribers, or
//! with lagging subscribers, is not an error. Subscribers re-read through
//! the repositories; events carry no data beyond the entity key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Kind of entity a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Campaign,
    Attack,
    Task,
    Agent,
    Crack,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Campaign => write!(f, "campaign"),
            Self::Attack => write!(f, "attack"),
            Self::Task => write!(f, "task"),
            Self::Agent => write!(f, "agent"),
            Self::Crack => write!(f, "crack"),
        }
    }
}

/// An opaque refresh hint: the entity changed, re-read it if you care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub entity_id: Uuid,
    /// Bus-assigned monotonic sequence; per-entity order follows commit order
    pub sequence: u64,
    pub at: DateTime<Utc>,
}

/// Broadcast-based change notification bus.
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, sequence: AtomicU64::new(0) }
    }

    /// Emit a change hint. Fired after the corresponding commit; dropped
    /// silently when nobody is listening.
    pub fn emit(&self, kind: EntityKind, entity_id: Uuid) {
        let event = ChangeEvent {
            kind,
            entity_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            at: Utc::now(),
        };
        let _ = self.tx.send(event);
    }

    /// Subscribe to all change hints.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let id = Uuid::new_v4();
        bus.emit(EntityKind::Task, id);
        bus.emit(EntityKind::Agent, id);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, EntityKind::Task);
        assert_eq!(second.kind, EntityKind::Agent);
        assert!(first.sequence < second.sequence);
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.emit(EntityKind::Crack, Uuid::new_v4());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
