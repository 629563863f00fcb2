use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::CredentialWitness;
use crate::config::ChannelConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::event_bus::EventBus;
use crate::notify::NotificationSink;
use crate::router::MessageRouter;
use crate::throttle::LeadingEdgeThrottle;
use crate::transport::{EventTransport, FrameStream, SseTransport};

/// Payload the server sends to signal liveness without carrying a message.
pub const HEARTBEAT_TOKEN: &str = "h";

const COMMAND_CHANNEL_SIZE: usize = 16;

/// Commands accepted by the supervision loop.
enum Command {
    Initiate(String),
    Shutdown,
}

/// Logical state of the supervised channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    /// Never connected since the supervisor started.
    NoConnection,
    /// A handle exists and is assumed open.
    Open,
    /// The last handle was dropped; a reconnect is pending.
    Closed,
}

/// Keeps exactly one logical event stream alive per identity.
///
/// The supervisor owns one connection handle, one liveness timer and a
/// last-heartbeat timestamp, all inside a single spawned task. It detects
/// staleness or failure and reconnects through a leading-edge throttle so a
/// flapping server is never hammered. It runs until `shutdown` is called or
/// the supervisor is dropped.
pub struct ConnectionSupervisor {
    commands: mpsc::Sender<Command>,
    session_id: String,
}

impl ConnectionSupervisor {
    /// Create a supervisor and spawn its supervision loop.
    ///
    /// Must be called within a Tokio runtime. The loop starts idle; nothing
    /// is connected until `initiate` supplies an identity.
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn EventTransport>,
        auth: Arc<dyn CredentialWitness>,
        bus: Arc<EventBus>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        // One session id per supervisor instance, sent on every (re)connect so
        // the server can correlate attempts to the same logical client.
        let session_id = Uuid::new_v4().to_string();
        info!(session_id = %session_id, "Creating connection supervisor");

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let ctx = SupervisorContext {
            config,
            transport,
            auth,
            router: MessageRouter::new(bus, notifier),
            session_id: session_id.clone(),
        };
        tokio::spawn(run(ctx, commands_rx));

        Self {
            commands: commands_tx,
            session_id,
        }
    }

    /// Create a supervisor over the real SSE transport.
    ///
    /// A transport that cannot be constructed is reported once and returned
    /// as an error; no retries are attempted for this case.
    pub fn with_sse_transport(
        config: ChannelConfig,
        auth: Arc<dyn CredentialWitness>,
        bus: Arc<EventBus>,
        notifier: Arc<dyn NotificationSink>,
    ) -> ChannelResult<Self> {
        let transport = SseTransport::new(&config).map_err(|err| {
            error!(error = %err, "event stream transport unavailable");
            err
        })?;
        Ok(Self::new(config, Arc::new(transport), auth, bus, notifier))
    }

    /// Request a (rate-limited) connection attempt for the given identity.
    ///
    /// Safe to call repeatedly; overlapping calls within the throttle window
    /// collapse into a single executed attempt. The identity is passed through
    /// unvalidated and retained for reconnects.
    pub async fn initiate(&self, identity: impl Into<String>) {
        if self
            .commands
            .send(Command::Initiate(identity.into()))
            .await
            .is_err()
        {
            warn!("connection supervisor is no longer running");
        }
    }

    /// Stop the supervision loop and drop any live connection.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// The per-supervisor session identifier, stable across reconnects.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Shared collaborators of the supervision loop.
struct SupervisorContext {
    config: ChannelConfig,
    transport: Arc<dyn EventTransport>,
    auth: Arc<dyn CredentialWitness>,
    router: MessageRouter,
    session_id: String,
}

/// Mutable channel state owned by the supervision loop. No locks: every
/// callback (frame, command, tick) is serviced by the one `select!` loop.
struct ChannelLink {
    identity: Option<String>,
    gate: LeadingEdgeThrottle,
    connection: Option<FrameStream>,
    state: ChannelState,
    last_heartbeat: Instant,
}

impl ChannelLink {
    fn new(config: &ChannelConfig) -> Self {
        Self {
            identity: None,
            gate: LeadingEdgeThrottle::new(config.connect_throttle()),
            connection: None,
            state: ChannelState::NoConnection,
            last_heartbeat: Instant::now(),
        }
    }

    /// Rate-limited connect gate. Returns true when a fresh connection was
    /// established (the caller must then restart the liveness timer).
    async fn request_connect(&mut self, ctx: &SupervisorContext) -> bool {
        let Some(identity) = self.identity.clone() else {
            debug!("connect requested before any identity was supplied");
            return false;
        };
        if !self.gate.try_fire() {
            debug!("connect attempt dropped by throttle");
            return false;
        }
        if !ctx.auth.credential_present() {
            debug!("no credential present, skipping connect attempt");
            return false;
        }
        self.connect(ctx, &identity).await
    }

    async fn connect(&mut self, ctx: &SupervisorContext, identity: &str) -> bool {
        // Drop the previous handle before replacement so a superseded stream
        // can never feed frames into current state.
        self.connection = None;

        match ctx.transport.open(identity, &ctx.session_id).await {
            Ok(stream) => {
                info!(identity, session_id = %ctx.session_id, "event channel connected");
                self.connection = Some(stream);
                self.state = ChannelState::Open;
                // Grace period: one full stale threshold from connect.
                self.last_heartbeat = Instant::now();
                true
            }
            Err(err) => {
                warn!(error = %err, "event channel connect failed");
                self.state = ChannelState::Closed;
                false
            }
        }
    }

    fn close(&mut self) {
        self.connection = None;
        self.state = ChannelState::Closed;
    }

    async fn handle_payload(&mut self, ctx: &SupervisorContext, payload: String) {
        if payload == HEARTBEAT_TOKEN {
            self.last_heartbeat = Instant::now();
            return;
        }
        if let Err(err) = ctx.router.route(&payload).await {
            // A bad message aborts only itself, never the connection.
            warn!(error = %err, "dropping undeliverable message");
        }
    }

    /// Liveness check. Returns true when the tick ended with a fresh
    /// connection.
    async fn liveness_tick(&mut self, ctx: &SupervisorContext) -> bool {
        if self.state == ChannelState::Open
            && self.last_heartbeat.elapsed() > ctx.config.stale_after()
        {
            warn!(
                stale_after_ms = ctx.config.stale_after_ms,
                "heartbeat overdue, closing event channel"
            );
            self.close();
        }
        // The closed branch also covers a closure performed just above, so a
        // stale connection is replaced within the same tick when the gate
        // allows it.
        if self.state == ChannelState::Closed {
            return self.request_connect(ctx).await;
        }
        false
    }
}

/// Signal produced by the live frame stream.
enum StreamSignal {
    Payload(String),
    Failed(ChannelError),
    Ended,
}

async fn next_signal(connection: Option<&mut FrameStream>) -> StreamSignal {
    match connection {
        Some(stream) => match stream.next().await {
            Some(Ok(payload)) => StreamSignal::Payload(payload),
            Some(Err(err)) => StreamSignal::Failed(err),
            None => StreamSignal::Ended,
        },
        None => std::future::pending().await,
    }
}

fn restart_liveness(config: &ChannelConfig) -> Interval {
    let period = config.liveness_interval();
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// The supervision loop: connect -> listen -> (heartbeat-check | error) ->
/// reconnect, forever, until shutdown.
async fn run(ctx: SupervisorContext, mut commands: mpsc::Receiver<Command>) {
    let mut link = ChannelLink::new(&ctx.config);
    let mut liveness = restart_liveness(&ctx.config);

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Initiate(identity)) => {
                    debug!(identity = %identity, "initiate requested");
                    link.identity = Some(identity);
                    if link.request_connect(&ctx).await {
                        liveness = restart_liveness(&ctx.config);
                    }
                }
                Some(Command::Shutdown) | None => {
                    info!("connection supervisor shutting down");
                    link.close();
                    break;
                }
            },

            signal = next_signal(link.connection.as_mut()) => match signal {
                StreamSignal::Payload(payload) => {
                    link.handle_payload(&ctx, payload).await;
                }
                StreamSignal::Failed(err) => {
                    warn!(error = %err, "event channel failed");
                    link.close();
                    if link.request_connect(&ctx).await {
                        liveness = restart_liveness(&ctx.config);
                    }
                }
                StreamSignal::Ended => {
                    info!("event channel ended by server");
                    link.close();
                    if link.request_connect(&ctx).await {
                        liveness = restart_liveness(&ctx.config);
                    }
                }
            },

            _ = liveness.tick() => {
                if link.liveness_tick(&ctx).await {
                    liveness = restart_liveness(&ctx.config);
                }
            }
        }
    }
}
