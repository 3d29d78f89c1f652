// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` implements `TransportAdapter` with scripted lifecycle
//! events per open, configurable unknown numbers and failures, and captured
//! sends, presence updates, and read receipts.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::time::Instant;

use herald_core::types::{CloseReason, MessageRef};
use herald_core::{
    AdapterType, Address, AuthState, HealthStatus, HeraldError, MessageId, PluginAdapter,
    Presence, TransportAdapter, TransportEvent, TransportLink, TransportSession,
};

/// A message accepted by a mock session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub text: String,
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<VecDeque<Vec<TransportEvent>>>,
    open_failures: AtomicUsize,
    opens: AtomicUsize,
    ends: AtomicUsize,
    logouts: AtomicUsize,
    credentials: Mutex<Vec<serde_json::Value>>,
    current: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    unknown: Mutex<HashSet<String>>,
    probe_errors: Mutex<HashSet<String>>,
    send_failures: Mutex<HashSet<String>>,
    sent: Mutex<Vec<SentMessage>>,
    sent_at: Mutex<Vec<Instant>>,
    presence: Mutex<Vec<(Presence, Option<String>)>>,
    reads: Mutex<Vec<MessageRef>>,
    sent_notify: Notify,
}

/// A scriptable transport.
///
/// Each `open()` emits the next queued script, or just `Opened` when the
/// queue is empty.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the events emitted by the next `open()`.
    pub async fn push_script(&self, events: Vec<TransportEvent>) {
        self.state.scripts.lock().await.push_back(events);
    }

    /// Make the next `n` calls to `open()` fail.
    pub fn fail_next_opens(&self, n: usize) {
        self.state.open_failures.store(n, Ordering::Release);
    }

    /// Inject an event into the most recently opened session.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        let sender = self.state.current.lock().await.clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Close the current session with a status code.
    pub async fn close_with(&self, status_code: Option<u16>) -> bool {
        self.emit(TransportEvent::Closed(close_reason(status_code)))
            .await
    }

    /// Numbers whose existence probe answers `false`.
    pub async fn set_unknown(&self, phone: &str) {
        self.state.unknown.lock().await.insert(digits(phone));
    }

    /// Numbers whose existence probe errors.
    pub async fn set_probe_error(&self, phone: &str) {
        self.state.probe_errors.lock().await.insert(digits(phone));
    }

    pub async fn clear_probe_error(&self, phone: &str) {
        self.state.probe_errors.lock().await.remove(&digits(phone));
    }

    /// Numbers whose sends fail.
    pub async fn set_send_failure(&self, phone: &str) {
        self.state.send_failures.lock().await.insert(digits(phone));
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::Acquire)
    }

    pub fn end_count(&self) -> usize {
        self.state.ends.load(Ordering::Acquire)
    }

    pub fn logout_count(&self) -> usize {
        self.state.logouts.load(Ordering::Acquire)
    }

    /// Credentials passed to each `open()`, in order.
    pub async fn credentials_seen(&self) -> Vec<serde_json::Value> {
        self.state.credentials.lock().await.clone()
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.state.sent.lock().await.len()
    }

    /// Tokio instants at which each message was accepted, in send order.
    pub async fn send_times(&self) -> Vec<Instant> {
        self.state.sent_at.lock().await.clone()
    }

    pub async fn presence_updates(&self) -> Vec<(Presence, Option<String>)> {
        self.state.presence.lock().await.clone()
    }

    pub async fn reads(&self) -> Vec<MessageRef> {
        self.state.reads.lock().await.clone()
    }

    /// Wait until at least `n` messages were sent.
    pub async fn wait_for_sent(&self, n: usize) {
        loop {
            let notified = self.state.sent_notify.notified();
            if self.sent_count().await >= n {
                return;
            }
            notified.await;
        }
    }
}

/// A close reason with a fixed message.
pub fn close_reason(status_code: Option<u16>) -> CloseReason {
    CloseReason {
        status_code,
        message: "mock close".to_string(),
    }
}

fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    fn fresh_credentials(&self) -> serde_json::Value {
        serde_json::json!({ "fresh": true })
    }

    async fn open(&self, auth: AuthState) -> Result<TransportLink, HeraldError> {
        let failing = self
            .state
            .open_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(HeraldError::transport("scripted open failure"));
        }

        self.state.opens.fetch_add(1, Ordering::AcqRel);
        self.state.credentials.lock().await.push(auth.credentials);

        let script = self
            .state
            .scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| vec![TransportEvent::Opened]);
        let (tx, rx) = mpsc::channel(64);
        for event in script {
            tx.send(event)
                .await
                .map_err(|_| HeraldError::transport("mock event channel closed"))?;
        }
        *self.state.current.lock().await = Some(tx.clone());

        Ok(TransportLink {
            session: Arc::new(MockSession {
                state: self.state.clone(),
                events: tx,
            }),
            events: rx,
        })
    }
}

struct MockSession {
    state: Arc<MockState>,
    events: mpsc::Sender<TransportEvent>,
}

#[async_trait]
impl TransportSession for MockSession {
    async fn send_text(&self, to: &Address, text: &str) -> Result<MessageId, HeraldError> {
        if self.state.send_failures.lock().await.contains(to.as_str()) {
            return Err(HeraldError::transport("scripted send failure"));
        }
        let mut sent = self.state.sent.lock().await;
        sent.push(SentMessage {
            to: to.to_string(),
            text: text.to_string(),
        });
        self.state.sent_at.lock().await.push(Instant::now());
        let id = MessageId(format!("mock-msg-{}", sent.len()));
        drop(sent);
        self.state.sent_notify.notify_waiters();
        Ok(id)
    }

    async fn set_presence(
        &self,
        presence: Presence,
        to: Option<&Address>,
    ) -> Result<(), HeraldError> {
        self.state
            .presence
            .lock()
            .await
            .push((presence, to.map(Address::to_string)));
        Ok(())
    }

    async fn probe_exists(&self, address: &Address) -> Result<bool, HeraldError> {
        if self.state.probe_errors.lock().await.contains(address.as_str()) {
            return Err(HeraldError::transport("scripted probe failure"));
        }
        Ok(!self.state.unknown.lock().await.contains(address.as_str()))
    }

    async fn mark_read(&self, message: &MessageRef) -> Result<(), HeraldError> {
        self.state.reads.lock().await.push(message.clone());
        Ok(())
    }

    async fn logout(&self) -> Result<(), HeraldError> {
        self.state.logouts.fetch_add(1, Ordering::AcqRel);
        self.events
            .send(TransportEvent::Closed(close_reason(Some(401))))
            .await
            .map_err(|_| HeraldError::transport("session already closed"))
    }

    async fn end(&self) {
        self.state.ends.fetch_add(1, Ordering::AcqRel);
    }
}
