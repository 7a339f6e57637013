//! Domain event system — observe the engine without coupling to it.
//!
//! The engine publishes an event for every rejection, release and retirement.
//! Subscribers (the CLI, tests, an embedding application) filter for what they
//! care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::admission::RejectReason;
use crate::item::{CorrelationKey, Destination};

/// Why a group buffer was retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireCause {
    /// The terminal position was released
    Completed,
    /// The lifecycle owner expired the group
    Expired,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResequencerEvent {
    /// An item was not admitted
    ItemRejected {
        correlation_key: CorrelationKey,
        position: u64,
        reason: RejectReason,
        timestamp: DateTime<Utc>,
    },

    /// A contiguous run was handed to the dispatcher
    RunReleased {
        correlation_key: CorrelationKey,
        destination: Destination,
        first_position: u64,
        last_position: u64,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A group buffer was removed from the engine
    GroupRetired {
        correlation_key: CorrelationKey,
        cause: RetireCause,
        leftover: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for engine events.
///
/// Uses `tokio::sync::broadcast`; publishing never blocks, so it is safe to
/// call under the per-key lock. Slow subscribers lag rather than stall the engine.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ResequencerEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ResequencerEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ResequencerEvent>> {
        self.sender.subscribe()
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
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ResequencerEvent::GroupRetired {
            correlation_key: "order-1".into(),
            cause: RetireCause::Completed,
            leftover: 0,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            ResequencerEvent::GroupRetired { correlation_key, cause, .. } => {
                assert_eq!(correlation_key.as_str(), "order-1");
                assert_eq!(*cause, RetireCause::Completed);
            }
            _ => panic!("Expected GroupRetired event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(ResequencerEvent::ItemRejected {
            correlation_key: "k".into(),
            position: 3,
            reason: RejectReason::Stale,
            timestamp: Utc::now(),
        });
    }
}
