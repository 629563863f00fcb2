use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, trace, warn};

/// A state update dispatched to the application's state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Name of the state event (e.g., "msg/synced").
    pub event: String,
    /// Full decoded envelope that produced the update.
    pub payload: serde_json::Value,
    /// Timestamp when the update was created.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Unique update ID.
    #[serde(default = "generate_uuid")]
    pub id: String,
}

/// Generate a UUID for updates
fn generate_uuid() -> String {
    use uuid::Uuid;
    Uuid::new_v4().to_string()
}

impl StateUpdate {
    /// Create a new state update.
    pub fn new(event: &str, payload: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            payload,
            timestamp: chrono::Utc::now(),
            id: generate_uuid(),
        }
    }

    /// Get the state event name
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Get the payload
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

/// Statistics about event bus activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Number of updates successfully published
    pub updates_published: u64,
    /// Number of updates dropped (no receivers)
    pub updates_dropped: u64,
    /// Count of updates by event name
    pub event_counts: HashMap<String, u64>,
}

/// Central bus distributing state updates from the event channel to subscribers.
pub struct EventBus {
    /// The broadcast channel sender
    sender: broadcast::Sender<StateUpdate>,
    /// Configured capacity of the channel
    capacity: usize,
    /// Statistics about bus activity
    pub(crate) stats: Arc<RwLock<EventBusStats>>,
}

impl EventBus {
    /// Create a new event bus with the specified capacity
    pub fn new(capacity: usize) -> Self {
        info!(capacity, "Creating new state update bus");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            stats: Arc::new(RwLock::new(EventBusStats::default())),
        }
    }

    /// Get a receiver to subscribe to updates
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        trace!("New subscriber registered to state update bus");
        self.sender.subscribe()
    }

    /// Publish an update to all subscribers, returning the receiver count.
    ///
    /// An update with no receivers is dropped and counted, not an error.
    pub async fn publish(&self, update: StateUpdate) -> usize {
        let event = update.event.clone();
        trace!(event = %event, "Publishing state update");

        match self.sender.send(update) {
            Ok(receivers) => {
                let mut stats_guard = self.stats.write().await;
                stats_guard.updates_published += 1;
                *stats_guard.event_counts.entry(event).or_insert(0) += 1;
                receivers
            }
            Err(_) => {
                let mut stats_guard = self.stats.write().await;
                stats_guard.updates_dropped += 1;

                warn!(event = %event, "No receivers for state update, message dropped");
                0
            }
        }
    }

    /// Get current bus statistics
    pub async fn get_stats(&self) -> EventBusStats {
        self.stats.read().await.clone()
    }

    /// Reset all statistics counters
    pub async fn reset_stats(&self) {
        info!("Resetting state update bus statistics");
        *self.stats.write().await = EventBusStats::default();
    }

    /// Get the configured capacity of the bus
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            capacity: self.capacity,
            stats: Arc::clone(&self.stats),
        }
    }
}
