// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge transport against an in-process fake sidecar.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use herald_bridge::BridgeTransport;
use herald_core::types::MessageRef;
use herald_core::{
    Address, AuthState, HealthStatus, HeraldError, KeyStore, MessageId, PluginAdapter, Presence,
    TransportAdapter, TransportEvent, TransportLink,
};
use herald_test_utils::MemoryKeyStore;

/// Raw frame that makes the fake sidecar drop the connection.
const DROP: &str = "__drop__";

struct Sidecar {
    url: String,
    seen: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<String>,
}

impl Sidecar {
    /// Next frame of the given type received from Herald.
    async fn next_of_type(&mut self, kind: &str) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.seen.recv())
                .await
                .expect("sidecar saw nothing")
                .expect("sidecar gone");
            if frame["type"] == kind {
                return frame;
            }
        }
    }

    fn push(&self, frame: Value) {
        self.push.send(frame.to_string()).unwrap();
    }
}

/// Canned answers: `hello` opens the session, requests succeed except
/// `mark_read` (error) and probes of `999` (never answered).
fn auto_reply(frame: &Value) -> Option<Value> {
    match frame["type"].as_str()? {
        "hello" => Some(json!({"type": "event", "event": "opened"})),
        "request" => {
            let id = frame["id"].as_u64()?;
            match frame["op"].as_str()? {
                "send_text" => Some(json!({
                    "type": "response", "id": id, "result": {"message_id": format!("srv-{id}")}
                })),
                "probe_exists" => match frame["address"].as_str()? {
                    "999" => None,
                    address => Some(json!({
                        "type": "response", "id": id, "result": {"exists": address != "000"}
                    })),
                },
                "mark_read" => Some(json!({"type": "response", "id": id, "error": "unsupported"})),
                _ => Some(json!({"type": "response", "id": id})),
            }
        }
        _ => None,
    }
}

async fn sidecar() -> Sidecar {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let (push, mut push_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let socket = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let (mut tx, mut rx) = socket.split();
        loop {
            tokio::select! {
                Some(raw) = push_rx.recv() => {
                    if raw == DROP {
                        let _ = tx.close().await;
                        break;
                    }
                    if tx.send(Message::Text(raw.into())).await.is_err() {
                        break;
                    }
                }
                message = rx.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                        if let Some(reply) = auto_reply(&frame) {
                            let _ = tx.send(Message::Text(reply.to_string().into())).await;
                        }
                        let _ = seen_tx.send(frame);
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    });

    Sidecar { url, seen, push }
}

async fn open(
    sidecar: &Sidecar,
    keys: MemoryKeyStore,
    timeout: Duration,
) -> TransportLink {
    let transport = BridgeTransport::new(sidecar.url.clone(), timeout);
    let mut link = transport
        .open(AuthState {
            credentials: json!({"token": "t-1"}),
            keys: Arc::new(keys),
        })
        .await
        .unwrap();
    assert_eq!(next_event(&mut link).await, Some(TransportEvent::Opened));
    link
}

async fn next_event(link: &mut TransportLink) -> Option<TransportEvent> {
    tokio::time::timeout(Duration::from_secs(5), link.events.recv())
        .await
        .expect("no event in time")
}

fn address(phone: &str) -> Address {
    Address::from_phone(phone).unwrap()
}

#[tokio::test]
async fn open_sends_hello_with_credentials() {
    let mut sidecar = sidecar().await;
    let _link = open(&sidecar, MemoryKeyStore::new(), Duration::from_secs(5)).await;

    let hello = sidecar.next_of_type("hello").await;
    assert_eq!(hello["credentials"], json!({"token": "t-1"}));
}

#[tokio::test]
async fn requests_round_trip() {
    let mut sidecar = sidecar().await;
    let link = open(&sidecar, MemoryKeyStore::new(), Duration::from_secs(5)).await;
    let session = link.session;

    let id = session.send_text(&address("33600000001"), "Hi").await.unwrap();
    assert_eq!(id, MessageId("srv-1".into()));
    assert!(!session.probe_exists(&address("000")).await.unwrap());
    assert!(session.probe_exists(&address("33600000001")).await.unwrap());
    session
        .set_presence(Presence::Composing, Some(&address("33600000001")))
        .await
        .unwrap();

    let sent = sidecar.next_of_type("request").await;
    assert_eq!(sent["op"], "send_text");
    assert_eq!(sent["to"], "33600000001");
    assert_eq!(sent["text"], "Hi");
    let mut presence = sidecar.next_of_type("request").await;
    while presence["op"] != "set_presence" {
        presence = sidecar.next_of_type("request").await;
    }
    assert_eq!(presence["presence"], "composing");
}

#[tokio::test]
async fn error_response_is_a_transport_error() {
    let sidecar = sidecar().await;
    let link = open(&sidecar, MemoryKeyStore::new(), Duration::from_secs(5)).await;

    let err = link
        .session
        .mark_read(&MessageRef {
            id: "m1".into(),
            remote: "33600000001@s.chat".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HeraldError::Transport { ref message, .. } if message == "unsupported"));
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let sidecar = sidecar().await;
    let link = open(&sidecar, MemoryKeyStore::new(), Duration::from_millis(200)).await;

    let err = link.session.probe_exists(&address("999")).await.unwrap_err();
    assert!(matches!(err, HeraldError::Timeout { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn key_lookups_are_served_from_the_store() {
    let keys = MemoryKeyStore::new();
    keys.write_key("pre-key-1", "secret").await.unwrap();
    let mut sidecar = sidecar().await;
    let _link = open(&sidecar, keys, Duration::from_secs(5)).await;

    sidecar.push(json!({"type": "key_get", "id": "k1", "key": "pre-key-1"}));
    sidecar.push(json!({"type": "key_get", "id": "k2", "key": "missing"}));

    let first = sidecar.next_of_type("key_value").await;
    let second = sidecar.next_of_type("key_value").await;
    let mut answers = [first, second];
    answers.sort_by_key(|f| f["id"].as_str().unwrap_or_default().to_string());
    assert_eq!(answers[0], json!({"type": "key_value", "id": "k1", "value": "secret"}));
    assert_eq!(answers[1], json!({"type": "key_value", "id": "k2", "value": null}));
}

#[tokio::test]
async fn lifecycle_events_are_forwarded() {
    let sidecar = sidecar().await;
    let mut link = open(&sidecar, MemoryKeyStore::new(), Duration::from_secs(5)).await;

    sidecar.push(json!({"type": "event", "event": "credentials_updated", "credentials": {"token": "t-2"}}));
    sidecar.push(json!({
        "type": "event", "event": "message",
        "message_ref": {"id": "m1", "remote": "33600000001@s.chat"},
        "text": "hello"
    }));

    assert_eq!(
        next_event(&mut link).await,
        Some(TransportEvent::CredentialsUpdated(json!({"token": "t-2"})))
    );
    match next_event(&mut link).await {
        Some(TransportEvent::Message(message)) => {
            assert_eq!(message.sender_phone(), "33600000001");
            assert!(!message.is_own);
        }
        other => panic!("expected message, got {other:?}"),
    }
}

#[tokio::test]
async fn sidecar_close_event_ends_the_session() {
    let sidecar = sidecar().await;
    let mut link = open(&sidecar, MemoryKeyStore::new(), Duration::from_secs(5)).await;

    sidecar.push(json!({"type": "event", "event": "closed", "status_code": 440, "message": "replaced"}));

    match next_event(&mut link).await {
        Some(TransportEvent::Closed(reason)) => {
            assert_eq!(reason.status_code, Some(440));
            assert_eq!(reason.message, "replaced");
        }
        other => panic!("expected close, got {other:?}"),
    }
    assert!(link.session.send_text(&address("1"), "x").await.is_err());
}

#[tokio::test]
async fn dropped_connection_is_a_transient_close() {
    let sidecar = sidecar().await;
    let mut link = open(&sidecar, MemoryKeyStore::new(), Duration::from_secs(5)).await;

    sidecar.push.send(DROP.to_string()).unwrap();

    match next_event(&mut link).await {
        Some(TransportEvent::Closed(reason)) => assert_eq!(reason.status_code, None),
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn local_end_is_not_reported_as_a_close() {
    let sidecar = sidecar().await;
    let mut link = open(&sidecar, MemoryKeyStore::new(), Duration::from_secs(5)).await;

    link.session.end().await;

    assert_eq!(next_event(&mut link).await, None);
}

#[tokio::test]
async fn unreachable_sidecar_fails_to_open() {
    let transport = BridgeTransport::new("ws://127.0.0.1:1", Duration::from_secs(2));
    let result = transport
        .open(AuthState {
            credentials: transport.fresh_credentials(),
            keys: Arc::new(MemoryKeyStore::new()),
        })
        .await;
    assert!(result.is_err());
    assert!(matches!(
        transport.health_check().await.unwrap(),
        HealthStatus::Unhealthy(_)
    ));
}
