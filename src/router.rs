use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::{malformed_payload, ChannelResult};
use crate::event_bus::{EventBus, StateUpdate};
use crate::notify::{Notification, NotificationSink};

/// State event for a completed sync.
pub const EVENT_SYNCED: &str = "msg/synced";
/// State event for background task progress.
pub const EVENT_TASK_PROGRESS: &str = "msg/taskProgress";
/// State event for transcode status changes.
pub const EVENT_TRANSCODE_STATUS: &str = "msg/transcodeStatus";
/// State event carrying the uploader chunk size.
pub const EVENT_UPLOADER_CHUNK_SIZE: &str = "uploaderChunkSize";
/// State event for any file tree change.
pub const EVENT_FILE_CHANGE: &str = "msg/file/change";
/// State event for a failed file operation.
pub const EVENT_FILE_OPERATION_FAULT: &str = "msg/file/operation/fault";

/// Body of an `operationFile` envelope.
///
/// Fields the server omits fall back to defaults, matching the loose shape of
/// the wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationFileBody {
    pub operation: String,
    pub from: String,
    pub to: String,
    pub code: i64,
    pub msg: String,
}

/// Body of an `operationTips` envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTipsBody {
    pub operation: String,
    pub success: bool,
    pub msg: Option<String>,
}

/// Routes decoded envelopes to state updates and user notifications.
///
/// The routing key is the envelope's `url` field, matched case-sensitively.
/// Every dispatch carries the full decoded envelope as payload, not just the
/// body.
pub struct MessageRouter {
    bus: Arc<EventBus>,
    notifier: Arc<dyn NotificationSink>,
}

impl MessageRouter {
    pub fn new(bus: Arc<EventBus>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { bus, notifier }
    }

    /// Decode one raw payload and route it by its `url` field.
    ///
    /// A payload that is not valid JSON aborts only this message, never the
    /// connection.
    pub async fn route(&self, raw: &str) -> ChannelResult<()> {
        let envelope: Value = serde_json::from_str(raw).map_err(malformed_payload)?;
        let url = envelope
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        trace!(url = %url, "routing message");

        match url.as_str() {
            "synced" => self.dispatch(EVENT_SYNCED, &envelope).await,
            "taskProgress" => self.dispatch(EVENT_TASK_PROGRESS, &envelope).await,
            "transcodeStatus" => self.dispatch(EVENT_TRANSCODE_STATUS, &envelope).await,
            "uploaderChunkSize" => self.dispatch(EVENT_UPLOADER_CHUNK_SIZE, &envelope).await,
            other => self.route_file_change(other, &envelope).await,
        }
        Ok(())
    }

    async fn dispatch(&self, event: &str, envelope: &Value) {
        self.bus
            .publish(StateUpdate::new(event, envelope.clone()))
            .await;
    }

    /// Everything outside the plain state-sync mappings is a file-change
    /// signal; operation results are additionally surfaced as notifications.
    async fn route_file_change(&self, url: &str, envelope: &Value) {
        self.dispatch(EVENT_FILE_CHANGE, envelope).await;

        let body = envelope.get("body").cloned().unwrap_or(Value::Null);
        match url {
            "operationFile" => {
                let body: OperationFileBody = serde_json::from_value(body).unwrap_or_default();
                if body.code == 0 {
                    self.notifier.notify(
                        Notification::success(
                            format!("{} succeeded", body.operation),
                            format!("from: {}\nto: {}", body.from, body.to),
                        )
                        .with_markup(),
                    );
                } else {
                    self.notifier.notify(
                        Notification::error(format!("{} failed", body.operation), body.msg)
                            .with_markup(),
                    );
                    self.dispatch(EVENT_FILE_OPERATION_FAULT, envelope).await;
                }
            }
            "operationTips" => {
                let body: OperationTipsBody = serde_json::from_value(body).unwrap_or_default();
                if body.success {
                    self.notifier.notify(
                        Notification::success(format!("{} succeeded", body.operation), "")
                            .with_markup(),
                    );
                } else {
                    self.notifier.notify(
                        Notification::error(
                            format!("{} failed", body.operation),
                            body.msg.unwrap_or_default(),
                        )
                        .with_markup(),
                    );
                }
            }
            _ => {}
        }
    }
}
