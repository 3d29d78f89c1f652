// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One live sidecar connection seen as a [`TransportSession`].
//!
//! Requests carry a numeric id; the reader task routes each `response` frame
//! to the waiting caller through a oneshot channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use herald_core::types::MessageRef;
use herald_core::{Address, HeraldError, MessageId, Presence, TransportSession};

use crate::protocol::{ClientFrame, ProbeResult, Request, SendResult};

/// Outcome of one request as reported by the sidecar.
pub(crate) type Reply = Result<Option<serde_json::Value>, String>;

/// Requests awaiting a `response` frame, keyed by request id.
#[derive(Default)]
pub(crate) struct Pending {
    waiters: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
}

impl Pending {
    async fn register(&self, id: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(id, tx);
        rx
    }

    async fn forget(&self, id: u64) {
        self.waiters.lock().await.remove(&id);
    }

    /// Hand a reply to its waiter. Unknown ids are late answers to timed-out
    /// requests.
    pub(crate) async fn resolve(&self, id: u64, reply: Reply) {
        match self.waiters.lock().await.remove(&id) {
            Some(waiter) => {
                let _ = waiter.send(reply);
            }
            None => debug!(id, "response for an unknown request"),
        }
    }

    /// Drop every waiter; their callers see the connection as closed.
    pub(crate) async fn fail_all(&self) {
        self.waiters.lock().await.clear();
    }
}

pub struct BridgeSession {
    outbound: mpsc::Sender<ClientFrame>,
    pending: Arc<Pending>,
    next_id: AtomicU64,
    request_timeout: Duration,
    closed: CancellationToken,
}

impl BridgeSession {
    pub(crate) fn new(
        outbound: mpsc::Sender<ClientFrame>,
        pending: Arc<Pending>,
        request_timeout: Duration,
        closed: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            closed,
        }
    }

    async fn request(&self, op: Request) -> Result<Option<serde_json::Value>, HeraldError> {
        if self.closed.is_cancelled() {
            return Err(HeraldError::transport("bridge session ended"));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let reply = self.pending.register(id).await;
        if self
            .outbound
            .send(ClientFrame::Request { id, op })
            .await
            .is_err()
        {
            self.pending.forget(id).await;
            return Err(HeraldError::transport("bridge connection closed"));
        }

        match tokio::time::timeout(self.request_timeout, reply).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(HeraldError::transport(message)),
            Ok(Err(_)) => Err(HeraldError::transport("bridge connection closed")),
            Err(_) => {
                self.pending.forget(id).await;
                Err(HeraldError::Timeout {
                    duration: self.request_timeout,
                })
            }
        }
    }

    async fn request_as<T: DeserializeOwned>(&self, op: Request) -> Result<T, HeraldError> {
        let result = self.request(op).await?.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(|e| HeraldError::Transport {
            message: format!("malformed bridge response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl TransportSession for BridgeSession {
    async fn send_text(&self, to: &Address, text: &str) -> Result<MessageId, HeraldError> {
        let sent: SendResult = self
            .request_as(Request::SendText {
                to: to.to_string(),
                text: text.to_string(),
            })
            .await?;
        Ok(MessageId(sent.message_id))
    }

    async fn set_presence(
        &self,
        presence: Presence,
        to: Option<&Address>,
    ) -> Result<(), HeraldError> {
        self.request(Request::SetPresence {
            presence,
            to: to.map(Address::to_string),
        })
        .await
        .map(|_| ())
    }

    async fn probe_exists(&self, address: &Address) -> Result<bool, HeraldError> {
        let probe: ProbeResult = self
            .request_as(Request::ProbeExists {
                address: address.to_string(),
            })
            .await?;
        Ok(probe.exists)
    }

    async fn mark_read(&self, message: &MessageRef) -> Result<(), HeraldError> {
        self.request(Request::MarkRead {
            message: message.clone(),
        })
        .await
        .map(|_| ())
    }

    async fn logout(&self) -> Result<(), HeraldError> {
        self.request(Request::Logout).await.map(|_| ())
    }

    async fn end(&self) {
        self.closed.cancel();
        self.pending.fail_all().await;
    }
}
