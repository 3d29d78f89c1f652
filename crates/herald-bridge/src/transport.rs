// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`TransportAdapter`] backed by a WebSocket connection to the sidecar.
//!
//! Each `open()` dials a fresh connection, sends `hello` with the credential
//! set, and splits the socket into a writer task fed from an mpsc channel and
//! a reader task that routes responses, answers key lookups, and forwards
//! events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use herald_config::model::TransportConfig;
use herald_core::types::CloseReason;
use herald_core::{
    AdapterType, AuthState, HealthStatus, HeraldError, KeyStore, PluginAdapter, TransportAdapter,
    TransportEvent, TransportLink,
};

use crate::protocol::{ClientFrame, ServerFrame};
use crate::session::{BridgeSession, Pending};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the outbound frame and inbound event channels.
const CHANNEL_CAPACITY: usize = 64;

/// Transport adapter that drives an external sidecar over WebSocket.
pub struct BridgeTransport {
    url: String,
    request_timeout: Duration,
}

impl BridgeTransport {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            config.bridge_url.clone(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn dial(&self) -> Result<Socket, HeraldError> {
        let connect = connect_async(self.url.as_str());
        match tokio::time::timeout(self.request_timeout, connect).await {
            Ok(Ok((socket, _response))) => Ok(socket),
            Ok(Err(e)) => Err(HeraldError::Transport {
                message: format!("bridge connect to {} failed: {e}", self.url),
                source: Some(Box::new(e)),
            }),
            Err(_) => Err(HeraldError::Timeout {
                duration: self.request_timeout,
            }),
        }
    }
}

#[async_trait]
impl PluginAdapter for BridgeTransport {
    fn name(&self) -> &str {
        "bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        match self.dial().await {
            Ok(mut socket) => {
                let _ = socket.close(None).await;
                Ok(HealthStatus::Healthy)
            }
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for BridgeTransport {
    fn fresh_credentials(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    async fn open(&self, auth: AuthState) -> Result<TransportLink, HeraldError> {
        let socket = self.dial().await?;
        let (mut sink, stream) = socket.split();

        let hello = encode(&ClientFrame::Hello {
            credentials: auth.credentials,
        })?;
        sink.send(WsMessage::Text(hello.into()))
            .await
            .map_err(|e| HeraldError::Transport {
                message: "bridge handshake failed".into(),
                source: Some(Box::new(e)),
            })?;
        info!(url = %self.url, "bridge connection open");

        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pending = Arc::new(Pending::default());
        let ended = CancellationToken::new();

        tokio::spawn(write_frames(sink, outbound_rx, ended.clone()));
        tokio::spawn(
            ReadLoop {
                stream,
                events: events_tx,
                outbound: outbound_tx.clone(),
                pending: pending.clone(),
                keys: auth.keys,
                ended: ended.clone(),
            }
            .run(),
        );

        Ok(TransportLink {
            session: Arc::new(BridgeSession::new(
                outbound_tx,
                pending,
                self.request_timeout,
                ended,
            )),
            events: events_rx,
        })
    }
}

fn encode(frame: &ClientFrame) -> Result<String, HeraldError> {
    serde_json::to_string(frame).map_err(|e| HeraldError::Internal(format!("encode frame: {e}")))
}

async fn write_frames(
    mut sink: SplitSink<Socket, WsMessage>,
    mut frames: mpsc::Receiver<ClientFrame>,
    ended: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            frame = frames.recv() => frame,
            _ = ended.cancelled() => None,
        };
        let Some(frame) = frame else { break };
        let text = match encode(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "dropping unencodable frame");
                continue;
            }
        };
        // A broken socket also ends the reader, which reports the close.
        if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
            debug!(error = %e, "bridge write failed");
            break;
        }
    }
    let _ = sink.close().await;
}

struct ReadLoop {
    stream: SplitStream<Socket>,
    events: mpsc::Sender<TransportEvent>,
    outbound: mpsc::Sender<ClientFrame>,
    pending: Arc<Pending>,
    keys: Arc<dyn KeyStore>,
    /// Cancelled by a local `end()`, or by this loop once the connection is gone.
    ended: CancellationToken,
}

impl ReadLoop {
    async fn run(mut self) {
        let reason = loop {
            let message = tokio::select! {
                message = self.stream.next() => message,
                _ = self.ended.cancelled() => break None,
            };
            match message {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(reason) = self.on_text(text.as_str()).await {
                        break Some(reason);
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let message = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "bridge closed the connection".to_string());
                    break Some(CloseReason {
                        status_code: None,
                        message,
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    break Some(CloseReason {
                        status_code: None,
                        message: format!("bridge connection error: {e}"),
                    });
                }
                None => {
                    break Some(CloseReason {
                        status_code: None,
                        message: "bridge connection ended".to_string(),
                    });
                }
            }
        };

        self.ended.cancel();
        self.pending.fail_all().await;
        // `None` means a local `end()`, which is not reported back as a close.
        if let Some(reason) = reason {
            info!(reason = %reason.message, "bridge session closed");
            let _ = self.events.send(TransportEvent::Closed(reason)).await;
        }
    }

    /// Handle one text frame. Returns a close reason once the sidecar reports
    /// the session closed.
    async fn on_text(&mut self, text: &str) -> Option<CloseReason> {
        let frame: ServerFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "unparseable bridge frame");
                return None;
            }
        };

        match frame {
            ServerFrame::Response { id, result, error } => {
                let reply = match error {
                    Some(message) => Err(message),
                    None => Ok(result),
                };
                self.pending.resolve(id, reply).await;
                None
            }
            ServerFrame::KeyGet { id, key } => {
                self.answer_key(id, key);
                None
            }
            ServerFrame::Event { event } => match TransportEvent::from(event) {
                TransportEvent::Closed(reason) => Some(reason),
                event => {
                    if self.events.send(event).await.is_err() {
                        debug!("event receiver dropped");
                    }
                    None
                }
            },
        }
    }

    fn answer_key(&self, id: String, key: String) {
        let keys = self.keys.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let value = match keys.read_key(&key).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, key = %key, "key lookup for bridge failed");
                    None
                }
            };
            let _ = outbound.send(ClientFrame::KeyValue { id, value }).await;
        });
    }
}
