use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tracing::{debug, trace};

use crate::config::ChannelConfig;
use crate::error::{connect_failed, stream_interrupted, transport_unavailable, ChannelResult};

/// Stream of decoded payload frames from the server-push channel.
///
/// Each item is the `data` payload of one event: either the heartbeat token or
/// a JSON document. Dropping the stream detaches the connection.
pub type FrameStream = BoxStream<'static, ChannelResult<String>>;

/// Transport opening a server-push payload stream for an identity.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn open(&self, identity: &str, session_id: &str) -> ChannelResult<FrameStream>;
}

/// Server-sent-events transport over HTTP.
pub struct SseTransport {
    client: reqwest::Client,
    events_url: String,
}

impl SseTransport {
    /// Build the transport for the configured endpoint.
    pub fn new(config: &ChannelConfig) -> ChannelResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(transport_unavailable)?;
        Ok(Self {
            client,
            events_url: config.events_url(),
        })
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn open(&self, identity: &str, session_id: &str) -> ChannelResult<FrameStream> {
        debug!(url = %self.events_url, identity, "opening event stream");
        let response = self
            .client
            .get(&self.events_url)
            .query(&[("username", identity), ("uuid", session_id)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(connect_failed)?;

        if !response.status().is_success() {
            return Err(connect_failed(format!("HTTP {}", response.status())));
        }

        Ok(Box::pin(decode_frames(response.bytes_stream())))
    }
}

/// Decode an SSE byte stream into the `data` payload of each event.
///
/// Multi-line `data:` fields are joined with newlines; comment and `event:`
/// lines carry nothing we consume. A transport error ends the stream.
pub(crate) fn decode_frames<S>(bytes: S) -> impl Stream<Item = ChannelResult<String>> + Send
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer = String::new();
        let mut data = String::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(stream_interrupted(err));
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete lines (terminated by \n)
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                if line.is_empty() {
                    // Blank line terminates one event.
                    if !data.is_empty() {
                        trace!(len = data.len(), "decoded event frame");
                        yield Ok(std::mem::take(&mut data));
                    }
                } else if let Some(rest) = line.strip_prefix("data:") {
                    if !data.is_empty() {
                        data.push('\n');
                    }
                    data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
                }
            }
        }
    }
}
