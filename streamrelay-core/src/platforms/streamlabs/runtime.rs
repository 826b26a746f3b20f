// File: streamrelay-core/src/platforms/streamlabs/runtime.rs

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

use streamrelay_common::models::{ConnectionState, Credential, EventEnvelope, SocketEvent};

use crate::Error;
use super::protocol::{self, EngineIoVersion, EnginePacket, SocketPacket};
use super::reconnect::ReconnectPolicy;

/// Socket.IO event name carrying alerts and chat.
pub const EVENT_CHANNEL: &str = "event";

/// Used when a server completes the namespace handshake without ever sending
/// an Engine.IO `open` packet.
const FALLBACK_HEARTBEAT_WINDOW: Duration = Duration::from_secs(45);

#[derive(Debug, Clone)]
pub struct StreamlabsConfig {
    pub base_url: Url,
    pub engine_io: EngineIoVersion,
    pub reconnect: ReconnectPolicy,
    pub channel_capacity: usize,
    /// Upper bound for TCP/WebSocket connect plus the namespace handshake.
    pub handshake_timeout: Duration,
}

impl StreamlabsConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            engine_io: EngineIoVersion::default(),
            reconnect: ReconnectPolicy::default(),
            channel_capacity: 1024,
            handshake_timeout: Duration::from_secs(20),
        }
    }
}

/// Cloneable stop signal for a running connection.
#[derive(Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// Returned by [`ConnectionManager::start`]. Reconnection is driven by the
/// transport; the handle only observes state and stops it.
pub struct ConnectionHandle {
    state_rx: watch::Receiver<ConnectionState>,
    shutdown: ShutdownTrigger,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    /// Closes the socket and stops reconnecting. The event channel closes
    /// once the transport task has exited.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Owns the socket to the Streamlabs event API.
pub struct ConnectionManager {
    config: StreamlabsConfig,
}

impl ConnectionManager {
    pub fn new(config: StreamlabsConfig) -> Self {
        Self { config }
    }

    /// Spawns the transport task and returns immediately.
    ///
    /// Lifecycle transitions and inbound envelopes arrive, in wire order, on
    /// the returned receiver. Must be called from inside a Tokio runtime.
    pub fn start(
        &self,
        credential: &Credential,
    ) -> Result<(ConnectionHandle, mpsc::Receiver<SocketEvent>), Error> {
        let url = protocol::connect_url(&self.config.base_url, credential, self.config.engine_io)?;

        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let transport = Transport {
            url,
            engine_io: self.config.engine_io,
            reconnect: self.config.reconnect.clone(),
            handshake_timeout: self.config.handshake_timeout,
            state_tx,
            events_tx,
            shutdown_rx,
        };
        let task = tokio::spawn(transport.run());

        let handle = ConnectionHandle {
            state_rx,
            shutdown: ShutdownTrigger(Arc::new(shutdown_tx)),
            task,
        };
        Ok((handle, events_rx))
    }
}

enum SessionEnd {
    /// Local shutdown, or nobody is listening for events any more.
    Stopped,
    /// The connection failed or dropped; carries a human-readable reason.
    Lost(String),
}

struct Transport {
    url: Url,
    engine_io: EngineIoVersion,
    reconnect: ReconnectPolicy,
    handshake_timeout: Duration,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::Sender<SocketEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Transport {
    /// Entrypoint: connect, read until the session ends, then reconnect per
    /// policy until shut down or out of attempts.
    async fn run(self) {
        let mut attempt: u32 = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            debug!("[Streamlabs] connecting → {}", protocol::redacted(&self.url));

            let mut connected = false;
            match self.run_session(&mut connected).await {
                SessionEnd::Stopped => break,
                SessionEnd::Lost(reason) if connected => {
                    attempt = 0;
                    self.set_state(ConnectionState::Disconnected);
                    if !self.emit(SocketEvent::Disconnected(reason)).await {
                        break;
                    }
                }
                SessionEnd::Lost(reason) => {
                    self.set_state(ConnectionState::Error);
                    if !self.emit(SocketEvent::ConnectError(reason)).await {
                        break;
                    }
                }
            }

            attempt = attempt.saturating_add(1);
            if !self.reconnect.allows(attempt) {
                warn!("[Streamlabs] not reconnecting (attempt={}, policy={:?})", attempt, self.reconnect);
                self.set_state(ConnectionState::Error);
                return;
            }

            let delay = self.reconnect.delay_for(attempt);
            info!("[Streamlabs] reconnecting in {:?} (attempt={})", delay, attempt);
            if self.wait_or_shutdown(delay).await {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("[Streamlabs] transport loop ended");
    }

    /// One WebSocket connection, from connect to close.
    /// `connected` flips to true once the namespace handshake completes.
    async fn run_session(&self, connected: &mut bool) -> SessionEnd {
        let mut shutdown = self.shutdown_rx.clone();

        let attempt = tokio::select! {
            res = timeout(self.handshake_timeout, connect_async(self.url.as_str())) => res,
            _ = shutdown.changed() => return SessionEnd::Stopped,
        };
        let ws = match attempt {
            Ok(Ok((ws, _resp))) => ws,
            Ok(Err(e)) => return SessionEnd::Lost(format!("websocket error: {}", e)),
            Err(_) => return SessionEnd::Lost("timeout".into()),
        };
        debug!("[Streamlabs] websocket open, waiting for Engine.IO handshake");

        let (mut write, mut read) = ws.split();

        let handshake_deadline = Instant::now() + self.handshake_timeout;
        let mut heartbeat_window: Option<Duration> = None;
        let mut ping_interval: Option<Duration> = None;
        let mut last_seen = Instant::now();
        let mut next_ping = Instant::now();

        loop {
            let deadline = if *connected {
                last_seen + heartbeat_window.unwrap_or(FALLBACK_HEARTBEAT_WINDOW)
            } else {
                handshake_deadline
            };
            let client_pings = self.engine_io.client_pings() && ping_interval.is_some();

            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Stopped;
                }
                _ = sleep_until(deadline) => {
                    let _ = write.send(Message::Close(None)).await;
                    let reason = if *connected { "ping timeout" } else { "handshake timeout" };
                    return SessionEnd::Lost(reason.into());
                }
                _ = sleep_until(next_ping), if client_pings => {
                    trace!("[Streamlabs] → ping");
                    if let Err(e) = write.send(Message::text(protocol::PING.to_string())).await {
                        return SessionEnd::Lost(format!("websocket error: {}", e));
                    }
                    next_ping = Instant::now() + ping_interval.unwrap_or(FALLBACK_HEARTBEAT_WINDOW);
                }
                frame = read.next() => {
                    let msg = match frame {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => return SessionEnd::Lost(format!("websocket error: {}", e)),
                        None => return SessionEnd::Lost("transport close".into()),
                    };
                    last_seen = Instant::now();

                    let txt = match msg {
                        Message::Text(txt) => txt,
                        Message::Close(_) => return SessionEnd::Lost("transport close".into()),
                        // binary / ws-level ping / pong: tungstenite answers pings itself
                        _ => continue,
                    };

                    let packet = match protocol::decode(txt.as_str()) {
                        Ok(packet) => packet,
                        Err(e) => {
                            warn!("[Streamlabs] dropping malformed frame: {}", e);
                            continue;
                        }
                    };

                    match packet {
                        EnginePacket::Open(handshake) => {
                            debug!(
                                "[Streamlabs] Engine.IO open sid={} pingInterval={}ms pingTimeout={}ms",
                                handshake.sid, handshake.ping_interval, handshake.ping_timeout
                            );
                            heartbeat_window = Some(handshake.heartbeat_window());
                            ping_interval = Some(handshake.ping_interval());
                            next_ping = Instant::now() + handshake.ping_interval();

                            if !self.engine_io.client_pings() {
                                let join = Message::text(protocol::CONNECT_DEFAULT_NAMESPACE.to_string());
                                if let Err(e) = write.send(join).await {
                                    return SessionEnd::Lost(format!("websocket error: {}", e));
                                }
                            }
                        }
                        EnginePacket::Ping(payload) => {
                            trace!("[Streamlabs] ← ping");
                            let pong = Message::text(protocol::encode_pong(&payload));
                            if let Err(e) = write.send(pong).await {
                                return SessionEnd::Lost(format!("websocket error: {}", e));
                            }
                        }
                        EnginePacket::Pong(_) => trace!("[Streamlabs] ← pong"),
                        EnginePacket::Close => return SessionEnd::Lost("server close".into()),
                        EnginePacket::Upgrade | EnginePacket::Noop => {}
                        EnginePacket::Message(SocketPacket::Connect(_)) => {
                            if !*connected {
                                *connected = true;
                                self.set_state(ConnectionState::Connected);
                                if !self.emit(SocketEvent::Connected).await {
                                    return SessionEnd::Stopped;
                                }
                            }
                        }
                        EnginePacket::Message(SocketPacket::ConnectError(reason)) => {
                            let _ = write.send(Message::Close(None)).await;
                            return SessionEnd::Lost(reason);
                        }
                        EnginePacket::Message(SocketPacket::Disconnect) => {
                            return SessionEnd::Lost("io server disconnect".into());
                        }
                        EnginePacket::Message(SocketPacket::Event { name, args }) => {
                            if let Some(envelope) = decode_event(&name, args) {
                                if !self.emit(SocketEvent::Event(envelope)).await {
                                    return SessionEnd::Stopped;
                                }
                            }
                        }
                        EnginePacket::Message(SocketPacket::Ack) => {}
                    }
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// `false` once the consumer has dropped its receiver.
    async fn emit(&self, event: SocketEvent) -> bool {
        self.events_tx.send(event).await.is_ok()
    }

    /// Returns `true` if shutdown was requested while waiting.
    async fn wait_or_shutdown(&self, delay: Duration) -> bool {
        let mut shutdown = self.shutdown_rx.clone();
        if *shutdown.borrow() {
            return true;
        }
        tokio::select! {
            _ = sleep(delay) => false,
            _ = shutdown.changed() => true,
        }
    }
}

/// Only the `event` channel is relayed, and only object payloads make sense
/// as envelopes.
fn decode_event(name: &str, args: Vec<Value>) -> Option<EventEnvelope> {
    if name != EVENT_CHANNEL {
        debug!("[Streamlabs] ignoring socket event '{}'", name);
        return None;
    }
    let data = args.into_iter().next()?;
    match serde_json::from_value::<EventEnvelope>(data) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            debug!("[Streamlabs] undecodable event payload: {}", e);
            None
        }
    }
}
