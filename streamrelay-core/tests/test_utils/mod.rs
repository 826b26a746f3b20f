// tests/test_utils/mod.rs
//
// In-process Socket.IO server and a recording HTTP client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use url::Url;

use streamrelay_core::{Error, HttpClient, HttpResponse};

pub type ServerWs = WebSocketStream<TcpStream>;

pub const OPEN_V4: &str =
    r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// Handshake with a short heartbeat window: silence for 300ms kills the session.
pub const OPEN_SHORT_HEARTBEAT: &str =
    r#"0{"sid":"s2","upgrades":[],"pingInterval":200,"pingTimeout":100}"#;

pub const OPEN_V3_FAST_PING: &str =
    r#"0{"sid":"s3","upgrades":[],"pingInterval":100,"pingTimeout":5000}"#;

pub fn chat_frame(message: &str) -> String {
    format!(r#"42["event",{{"type":"chat_message","for":"twitch_account","message":"{}"}}]"#, message)
}

pub fn follow_frame(name: &str) -> String {
    format!(r#"42["event",{{"type":"follow","for":"twitch_account","message":[{{"name":"{}"}}]}}]"#, name)
}

/// Binds an ephemeral port and runs `session(n, ws)` for the n-th accepted
/// connection (0-based). Returns the http base URL and the request URIs seen.
pub async fn spawn_socket_server<F, Fut>(session: F) -> (Url, mpsc::UnboundedReceiver<String>)
where
    F: Fn(usize, ServerWs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut n = 0;
        while let Ok((stream, _)) = listener.accept().await {
            let uri_tx = uri_tx.clone();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let _ = uri_tx.send(req.uri().to_string());
                Ok(resp)
            };
            let Ok(ws) = accept_hdr_async(stream, callback).await else {
                continue;
            };
            tokio::spawn(session(n, ws));
            n += 1;
        }
    });

    (Url::parse(&format!("http://{}", addr)).unwrap(), uri_rx)
}

pub async fn send_text(ws: &mut ServerWs, text: &str) {
    let _ = ws.send(Message::text(text.to_string())).await;
}

/// Next text frame from the client, or `None` once it closes.
pub async fn next_text(ws: &mut ServerWs) -> Option<String> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(txt)) => return Some(txt.as_str().to_string()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Engine.IO v4 open followed by the client's `40` and our namespace ack.
pub async fn handshake_v4(ws: &mut ServerWs) -> bool {
    send_text(ws, OPEN_V4).await;
    if next_text(ws).await.as_deref() != Some("40") {
        return false;
    }
    send_text(ws, r#"40{"sid":"n1"}"#).await;
    true
}

/// Keeps reading (and answering nothing) until the client goes away.
pub async fn hold_open(ws: &mut ServerWs) {
    while next_text(ws).await.is_some() {}
}

/// Records every POST and answers with scripted statuses (200 once the
/// script runs out).
#[derive(Clone, Default)]
pub struct RecordingHttpClient {
    calls: Arc<Mutex<Vec<(String, String)>>>,
    statuses: Arc<Mutex<VecDeque<u16>>>,
}

impl RecordingHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: &[u16]) -> Self {
        let client = Self::default();
        client.statuses.lock().unwrap().extend(statuses.iter().copied());
        client
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn wait_for_calls(&self, n: usize, limit: Duration) -> Vec<(String, String)> {
        let _ = tokio::time::timeout(limit, async {
            while self.calls.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        self.calls()
    }
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn post(
        &self,
        url: String,
        body: String,
        _content_type: Option<&'static str>,
    ) -> Result<HttpResponse, Error> {
        self.calls.lock().unwrap().push((url, body));
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
        Ok(HttpResponse { status, body: String::new() })
    }
}
