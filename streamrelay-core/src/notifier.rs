// File: streamrelay-core/src/notifier.rs

use std::sync::Arc;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use streamrelay_common::models::{DeliveryOutcome, NotificationTarget};

use crate::Error;
use crate::http::HttpClient;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Posts chat payloads to `<base>/<topic>` on the ntfy service.
///
/// One POST per call, no retry, no batching. Outcomes are logged here and
/// returned to whoever awaits them.
pub struct Notifier {
    client: Arc<dyn HttpClient>,
    base_url: Url,
}

impl Notifier {
    pub fn new(client: Arc<dyn HttpClient>, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn topic_url(&self, topic: &NotificationTarget) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("cannot append topic to {}", self.base_url)))?
            .pop_if_empty()
            .push(topic.as_str());
        Ok(url)
    }

    /// Delivers one payload and reports the outcome. Never returns an error:
    /// every failure is folded into `DeliveryOutcome::Failed`.
    pub async fn send(&self, topic: &NotificationTarget, payload: Value) -> DeliveryOutcome {
        let url = match self.topic_url(topic) {
            Ok(url) => url,
            Err(e) => return Self::failed(e.to_string()),
        };
        let (body, content_type) = encode_payload(payload);
        debug!("[Notifier] POST {} ({} bytes)", url, body.len());

        match self.client.post(url.to_string(), body, content_type).await {
            Ok(resp) if resp.is_success() => {
                info!("[Notifier] message sent to ntfy topic '{}' (HTTP {})", topic, resp.status);
                DeliveryOutcome::Delivered { status: resp.status }
            }
            Ok(resp) => {
                let detail = resp.body.trim();
                if detail.is_empty() {
                    Self::failed(format!("HTTP {}", resp.status))
                } else {
                    Self::failed(format!("HTTP {}: {}", resp.status, detail))
                }
            }
            Err(e) => Self::failed(e.to_string()),
        }
    }

    /// Fire-and-forget variant: the delivery runs on its own task so the caller
    /// can move on to the next event immediately.
    pub fn dispatch(
        self: &Arc<Self>,
        topic: NotificationTarget,
        payload: Value,
    ) -> JoinHandle<DeliveryOutcome> {
        let notifier = Arc::clone(self);
        tokio::spawn(async move { notifier.send(&topic, payload).await })
    }

    fn failed(reason: String) -> DeliveryOutcome {
        error!("[Notifier] error sending to ntfy: {}", reason);
        DeliveryOutcome::Failed { reason }
    }
}

/// Turns a payload into a request body.
///
/// Strings go out verbatim, `null` becomes an empty body, anything structured
/// is sent as JSON text with a JSON content type.
pub fn encode_payload(payload: Value) -> (String, Option<&'static str>) {
    match payload {
        Value::String(text) => (text, None),
        Value::Null => (String::new(), None),
        other => (other.to_string(), Some(JSON_CONTENT_TYPE)),
    }
}
