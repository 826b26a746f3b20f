// File: streamrelay-core/src/relay.rs
//
// Wires ConnectionManager -> EventFilter -> Notifier.

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use streamrelay_common::models::{
    ConnectionState, DeliveryOutcome, EventEnvelope, NotificationTarget, SocketEvent,
};

use crate::Error;
use crate::config::RelayConfig;
use crate::filter::EventFilter;
use crate::http::HttpClient;
use crate::notifier::Notifier;
use crate::platforms::streamlabs::{ConnectionHandle, ConnectionManager, ShutdownTrigger};

pub struct Relay {
    filter: EventFilter,
    notifier: Arc<Notifier>,
    topic: NotificationTarget,
}

impl Relay {
    pub fn new(filter: EventFilter, notifier: Arc<Notifier>, topic: NotificationTarget) -> Self {
        Self { filter, notifier, topic }
    }

    pub fn from_config(config: &RelayConfig, client: Arc<dyn HttpClient>) -> Self {
        let notifier = Notifier::new(client, config.notify_base_url.clone());
        Self::new(
            EventFilter::new(config.strict_origin_filter),
            Arc::new(notifier),
            config.topic.clone(),
        )
    }

    /// Reacts to one notification from the connection manager.
    ///
    /// Lifecycle notifications are logged only. A relevant chat event starts
    /// a delivery and returns its task; the caller may await it or drop it.
    pub fn handle(&self, event: SocketEvent) -> Option<JoinHandle<DeliveryOutcome>> {
        match event {
            SocketEvent::Connected => {
                info!("[Relay] connected to Streamlabs socket");
                None
            }
            SocketEvent::Disconnected(reason) => {
                warn!("[Relay] disconnected from Streamlabs socket: {}", reason);
                None
            }
            SocketEvent::ConnectError(reason) => {
                error!("[Relay] connection error: {}", reason);
                None
            }
            SocketEvent::Event(envelope) => self.forward(envelope),
        }
    }

    fn forward(&self, envelope: EventEnvelope) -> Option<JoinHandle<DeliveryOutcome>> {
        if !self.filter.is_relevant(&envelope) {
            debug!(
                "[Relay] skipping event type='{}' for={:?}",
                envelope.event_type, envelope.origin
            );
            return None;
        }

        let payload = self.filter.extract_payload(envelope);
        info!("[Relay] new chat message: {}", payload_text(&payload));
        Some(self.notifier.dispatch(self.topic.clone(), payload))
    }

    /// Drains the event stream in arrival order until the sender side closes.
    /// Deliveries run detached, so a slow or failing POST never blocks the
    /// next event.
    pub async fn run(&self, mut events: mpsc::Receiver<SocketEvent>) {
        while let Some(event) = events.recv().await {
            let _ = self.handle(event);
        }
        info!("[Relay] event stream closed");
    }
}

/// Plain-text payloads are logged as-is, anything else as JSON.
fn payload_text(payload: &Value) -> Cow<'_, str> {
    match payload.as_str() {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(payload.to_string()),
    }
}

/// A relay wired to a live connection.
pub struct RunningRelay {
    connection: ConnectionHandle,
    pipeline: JoinHandle<()>,
}

impl RunningRelay {
    /// Opens the event-source connection and starts forwarding.
    /// Must be called from inside a Tokio runtime.
    pub fn spawn(config: &RelayConfig, client: Arc<dyn HttpClient>) -> Result<Self, Error> {
        let relay = Relay::from_config(config, client);
        let manager = ConnectionManager::new(config.streamlabs());
        let (connection, events) = manager.start(&config.credential)?;

        info!(
            "[Relay] forwarding '{}' events to topic '{}'{}",
            crate::filter::CHAT_MESSAGE_TYPE,
            config.topic,
            if config.strict_origin_filter { " (twitch only)" } else { "" }
        );
        let pipeline = tokio::spawn(async move { relay.run(events).await });

        Ok(Self { connection, pipeline })
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.connection.shutdown_trigger()
    }

    pub fn shutdown(&self) {
        self.connection.shutdown();
    }

    /// Resolves once the connection has stopped for good and every queued
    /// event has been handed to the pipeline.
    pub async fn wait(self) {
        if let Err(e) = self.pipeline.await {
            error!("[Relay] pipeline task failed: {:?}", e);
        }
        self.connection.join().await;
    }
}
