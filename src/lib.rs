//! Client-side server-push event channel with reconnect supervision.
//!
//! The [`ConnectionSupervisor`] keeps one logical event stream alive per
//! identity, detects staleness through server heartbeats, reconnects through a
//! leading-edge throttle, and routes decoded envelopes to a state update bus
//! and a notification sink.

// Export modules
pub mod auth;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod notify;
pub mod router;
pub mod supervisor;
pub mod throttle;
pub mod transport;

#[cfg(test)]
mod tests;

pub use auth::{CredentialWitness, TokenStore};
pub use config::ChannelConfig;
pub use error::{ChannelError, ChannelResult};
pub use event_bus::{EventBus, EventBusStats, StateUpdate};
pub use notify::{Notification, NotificationChannel, NotificationKind, NotificationSink};
pub use router::MessageRouter;
pub use supervisor::{ConnectionSupervisor, HEARTBEAT_TOKEN};
pub use transport::{EventTransport, FrameStream, SseTransport};
