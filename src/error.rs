use std::fmt;

use thiserror::Error;

/// Error types for the event channel, using thiserror.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    #[error("failed to connect event stream: {reason}")]
    ConnectFailed { reason: String },

    #[error("event stream interrupted: {reason}")]
    StreamInterrupted { reason: String },

    #[error("event stream transport unavailable: {reason}")]
    TransportUnavailable { reason: String },

    #[error("malformed message payload: {reason}")]
    MalformedPayload { reason: String },
}

/// Result type for event channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Create a connect failed error
pub fn connect_failed(reason: impl fmt::Display) -> ChannelError {
    ChannelError::ConnectFailed {
        reason: reason.to_string(),
    }
}

/// Create a stream interrupted error
pub fn stream_interrupted(reason: impl fmt::Display) -> ChannelError {
    ChannelError::StreamInterrupted {
        reason: reason.to_string(),
    }
}

/// Create a transport unavailable error
pub fn transport_unavailable(reason: impl fmt::Display) -> ChannelError {
    ChannelError::TransportUnavailable {
        reason: reason.to_string(),
    }
}

/// Create a malformed payload error
pub fn malformed_payload(reason: impl fmt::Display) -> ChannelError {
    ChannelError::MalformedPayload {
        reason: reason.to_string(),
    }
}
