//! Engine.IO / Socket.IO framing for the Streamlabs socket API.
//!
//! Only the WebSocket transport is spoken, so every text frame carries exactly
//! one Engine.IO packet:
//!
//! ```text
//! 0{"sid":..,"pingInterval":..,"pingTimeout":..}   open
//! 1                                                close
//! 2 / 3                                            ping / pong
//! 4<socket.io packet>                              message
//! 6                                                noop
//! ```
//!
//! and a Socket.IO packet is `<type>[/namespace,][ack id][json]`. Binary
//! attachments are never used by the event API and are rejected.

use std::str::FromStr;
use std::time::Duration;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use streamrelay_common::models::Credential;
use crate::Error;

pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Joins the default namespace (required on Engine.IO v4 only).
pub const CONNECT_DEFAULT_NAMESPACE: &str = "40";
pub const PING: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineIoVersion {
    /// Socket.IO 2.x servers: the client pings, the namespace is joined implicitly.
    V3,
    /// Socket.IO 3+/4 servers: the server pings, the client sends `40`.
    #[default]
    V4,
}

impl EngineIoVersion {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            EngineIoVersion::V3 => "3",
            EngineIoVersion::V4 => "4",
        }
    }

    pub fn client_pings(&self) -> bool {
        matches!(self, EngineIoVersion::V3)
    }
}

impl FromStr for EngineIoVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "3" | "v3" => Ok(EngineIoVersion::V3),
            "4" | "v4" => Ok(EngineIoVersion::V4),
            other => Err(format!("unsupported Engine.IO version '{}'", other)),
        }
    }
}

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    /// Milliseconds.
    pub ping_interval: u64,
    /// Milliseconds.
    pub ping_timeout: u64,
}

impl Handshake {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    /// How long the connection may stay silent before it counts as dead.
    pub fn heartbeat_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    Ack,
    ConnectError(String),
}

pub fn decode(text: &str) -> Result<EnginePacket, Error> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty frame".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => Ok(EnginePacket::Message(decode_socket_packet(rest)?)),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(Error::Protocol(format!("unknown Engine.IO packet type '{}'", other))),
    }
}

fn decode_socket_packet(text: &str) -> Result<SocketPacket, Error> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty Socket.IO packet".into()))?;
    let mut rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(Error::Protocol("binary Socket.IO packets are not supported".into()));
    }

    // Only the default namespace is used; a "/nsp," prefix is skipped.
    if rest.starts_with('/') {
        rest = match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        };
    }

    let ack_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    rest = &rest[ack_len..];

    match kind {
        '0' if rest.is_empty() => Ok(SocketPacket::Connect(None)),
        '0' => Ok(SocketPacket::Connect(Some(serde_json::from_str(rest)?))),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let mut items: Vec<Value> = serde_json::from_str(rest)?;
            if items.is_empty() {
                return Err(Error::Protocol("event packet without a name".into()));
            }
            match items.remove(0) {
                Value::String(name) => Ok(SocketPacket::Event { name, args: items }),
                other => Err(Error::Protocol(format!("event name must be a string, got {}", other))),
            }
        }
        '3' => Ok(SocketPacket::Ack),
        '4' => Ok(SocketPacket::ConnectError(connect_error_reason(rest))),
        other => Err(Error::Protocol(format!("unknown Socket.IO packet type '{}'", other))),
    }
}

/// Socket.IO 2 sends the reason as a bare JSON string, 3+ as `{"message": ..}`.
fn connect_error_reason(raw: &str) -> String {
    let reason = match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(s)) => s,
        Ok(v) => v
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        Err(_) => raw.to_string(),
    };
    if reason.is_empty() {
        "connect error".to_string()
    } else {
        reason
    }
}

pub fn encode_pong(payload: &str) -> String {
    format!("3{}", payload)
}

/// `https://host?token=..` becomes
/// `wss://host/socket.io/?EIO=4&transport=websocket&token=..`.
pub fn connect_url(base: &Url, credential: &Credential, version: EngineIoVersion) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(Error::InvalidUrl(format!("unsupported scheme '{}' in {}", other, base))),
    };

    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|_| Error::InvalidUrl(format!("cannot switch {} to {}", base, scheme)))?;
    url.set_path(SOCKET_IO_PATH);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", version.as_query_value())
        .append_pair("transport", "websocket")
        .append_pair("token", credential.expose());
    Ok(url)
}

/// Loggable form of a connect URL: no query string, so no token.
pub fn redacted(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}
