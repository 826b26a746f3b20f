// tests/notifier_tests.rs
//
// DefaultHttpClient against a real local HTTP server.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

use streamrelay_common::models::{DeliveryOutcome, NotificationTarget};
use streamrelay_core::DefaultHttpClient;
use streamrelay_core::notifier::Notifier;

#[derive(Debug, Clone)]
struct Received {
    topic: String,
    content_type: Option<String>,
    body: String,
}

type Inbox = Arc<Mutex<Vec<Received>>>;

async fn publish(
    State(inbox): State<Inbox>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    if topic == "forbidden" {
        return (StatusCode::FORBIDDEN, "topic reserved");
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    inbox.lock().unwrap().push(Received { topic, content_type, body });
    (StatusCode::OK, "{}")
}

async fn fake_ntfy() -> (Url, Inbox) {
    let inbox: Inbox = Arc::default();
    let app = Router::new()
        .route("/{topic}", post(publish))
        .with_state(inbox.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (Url::parse(&format!("http://{}", addr)).unwrap(), inbox)
}

#[tokio::test]
async fn test_plain_text_post() {
    let (base, inbox) = fake_ntfy().await;
    let notifier = Notifier::new(Arc::new(DefaultHttpClient::new()), base);

    let outcome = notifier.send(&NotificationTarget::new("mytopic"), json!("hello")).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered { status: 200 });

    let received = inbox.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].topic, "mytopic");
    assert_eq!(received[0].body, "hello");
    assert_ne!(received[0].content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_structured_payload_is_json() {
    let (base, inbox) = fake_ntfy().await;
    let notifier = Notifier::new(Arc::new(DefaultHttpClient::new()), base);

    let payload = json!([{ "from": "viewer", "body": "hi" }]);
    let outcome = notifier.send(&NotificationTarget::new("mytopic"), payload.clone()).await;
    assert!(outcome.is_success());

    let received = inbox.lock().unwrap().clone();
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
    let echoed: serde_json::Value = serde_json::from_str(&received[0].body).unwrap();
    assert_eq!(echoed, payload);
}

#[tokio::test]
async fn test_rejection_is_reported() {
    let (base, inbox) = fake_ntfy().await;
    let notifier = Notifier::new(Arc::new(DefaultHttpClient::new()), base);

    let outcome = notifier.send(&NotificationTarget::new("forbidden"), json!("hello")).await;
    assert_eq!(
        outcome,
        DeliveryOutcome::Failed { reason: "HTTP 403: topic reserved".into() }
    );
    assert!(inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_reported() {
    let notifier = Notifier::new(
        Arc::new(DefaultHttpClient::new()),
        Url::parse("http://127.0.0.1:1").unwrap(),
    );
    let outcome = notifier.send(&NotificationTarget::new("mytopic"), json!("hello")).await;
    match outcome {
        DeliveryOutcome::Failed { reason } => assert!(reason.starts_with("HTTP error"), "{}", reason),
        other => panic!("expected failure, got {:?}", other),
    }
}
