use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Kind of a transient user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

/// A transient UI notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Short headline, e.g. "move succeeded".
    pub title: String,
    /// Body text; may be empty.
    pub message: String,
    pub kind: NotificationKind,
    /// Whether the message may contain markup the UI is allowed to render.
    pub allow_markup: bool,
}

impl Notification {
    /// Create a success notification with plain text.
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Success,
            allow_markup: false,
        }
    }

    /// Create an error notification with plain text.
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Error,
            allow_markup: false,
        }
    }

    /// Mark the message as renderable markup.
    pub fn with_markup(mut self) -> Self {
        self.allow_markup = true;
        self
    }
}

/// Sink rendering transient notifications; implemented by the UI layer.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Broadcast-backed notification sink for composing with a UI event loop.
pub struct NotificationChannel {
    sender: broadcast::Sender<Notification>,
}

impl NotificationChannel {
    /// Create a new notification channel with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Get a receiver to consume notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl NotificationSink for NotificationChannel {
    fn notify(&self, notification: Notification) {
        trace!(title = %notification.title, "Forwarding notification");
        if self.sender.send(notification).is_err() {
            trace!("No notification subscribers, notification dropped");
        }
    }
}
