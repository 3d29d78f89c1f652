// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The connection manager: one transport session per process.
//!
//! Transport lifecycle events arrive on a bounded channel and are consumed by
//! a pump task owned by the manager. Every reconnect path goes back through
//! [`ConnectionManager::connect`], whose in-flight guard prevents duplicate
//! sessions. Cross-process exclusivity is an advisory ownership marker in the
//! key store, checked on a fixed interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use herald_core::types::{CloseReason, InboundText, KeyUpdate, MessageRef};
use herald_core::{
    AuthState, ConnectionState, HeraldError, KeyStore, TransportAdapter, TransportEvent,
    TransportSession,
};
use rand::Rng;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::close::{CloseKind, classify_close};
use crate::fatal::{FatalReason, FatalSignal};
use crate::pairing::PairingCode;
use crate::settings::{CREDENTIALS_KEY, ConnectionSettings, OWNER_KEY, PAIRING_KEY};

/// Events the manager fans out to the rest of the process.
#[derive(Debug, Clone)]
pub enum ConnectionNotice {
    /// A session reached `connected`.
    Connected,
    /// A message from someone else arrived.
    Inbound(InboundText),
}

struct LiveSession {
    session: Arc<dyn TransportSession>,
    pump: JoinHandle<()>,
    generation: u64,
}

struct Inner {
    transport: Arc<dyn TransportAdapter>,
    keys: Arc<dyn KeyStore>,
    settings: ConnectionSettings,
    instance_id: String,
    state: watch::Sender<ConnectionState>,
    pairing: watch::Sender<Option<PairingCode>>,
    /// Set from the start of an attempt until the session opens or closes.
    connecting: AtomicBool,
    conflicts: AtomicU32,
    generation: AtomicU64,
    live: Mutex<Option<LiveSession>>,
    notices: broadcast::Sender<ConnectionNotice>,
    fatal: FatalSignal,
    shutdown: CancellationToken,
}

/// Cheaply cloneable handle to the process-wide connection manager.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn TransportAdapter>,
        keys: Arc<dyn KeyStore>,
        settings: ConnectionSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (pairing, _) = watch::channel(None);
        let (notices, _) = broadcast::channel(settings.event_buffer);
        Self {
            inner: Arc::new(Inner {
                transport,
                keys,
                settings,
                instance_id: uuid::Uuid::new_v4().to_string(),
                state,
                pairing,
                connecting: AtomicBool::new(false),
                conflicts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                live: Mutex::new(None),
                notices,
                fatal: FatalSignal::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Unique id written into the ownership marker.
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn pairing_code(&self) -> Option<PairingCode> {
        self.inner.pairing.borrow().clone()
    }

    /// Changes to the current pairing code, including refreshes while pairing.
    pub fn watch_pairing(&self) -> watch::Receiver<Option<PairingCode>> {
        self.inner.pairing.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionNotice> {
        self.inner.notices.subscribe()
    }

    pub fn fatal(&self) -> &FatalSignal {
        &self.inner.fatal
    }

    pub fn conflict_count(&self) -> u32 {
        self.inner.conflicts.load(Ordering::Acquire)
    }

    /// Open a session unless one is open or an attempt is already in flight.
    ///
    /// A failed attempt schedules its own retry after the transient delay.
    pub async fn connect(&self) -> Result<(), HeraldError> {
        let inner = &self.inner;
        if inner.fatal.is_raised() || inner.shutdown.is_cancelled() {
            debug!("connect ignored after shutdown");
            return Ok(());
        }
        if self.state() == ConnectionState::Connected {
            debug!("session already connected");
            return Ok(());
        }
        if inner.connecting.swap(true, Ordering::AcqRel) {
            debug!("connection attempt already in flight");
            return Ok(());
        }

        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) => {
                inner.connecting.store(false, Ordering::Release);
                warn!(
                    error = %e,
                    retry_ms = inner.settings.transient_delay.as_millis() as u64,
                    "connection attempt failed"
                );
                self.reconnect_after(inner.settings.transient_delay);
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<(), HeraldError> {
        let inner = &self.inner;
        self.write_owner_marker().await;
        self.teardown().await;

        let credentials = self.load_credentials().await?;
        let link = inner
            .transport
            .open(AuthState {
                credentials,
                keys: inner.keys.clone(),
            })
            .await?;

        let generation = inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut live = inner.live.lock().await;
        let pump = tokio::spawn(self.clone().pump(generation, link.events));
        *live = Some(LiveSession {
            session: link.session,
            pump,
            generation,
        });
        debug!(generation, "transport session started");
        Ok(())
    }

    async fn load_credentials(&self) -> Result<serde_json::Value, HeraldError> {
        let stored = self.inner.keys.read_key(CREDENTIALS_KEY).await?;
        Ok(match stored {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(creds) => creds,
                Err(e) => {
                    warn!(error = %e, "stored credentials are unreadable; starting fresh");
                    self.inner.transport.fresh_credentials()
                }
            },
            None => {
                info!("no stored credentials; a new pairing will be required");
                self.inner.transport.fresh_credentials()
            }
        })
    }

    async fn write_owner_marker(&self) {
        let inner = &self.inner;
        if let Err(e) = inner.keys.write_key(OWNER_KEY, &inner.instance_id).await {
            warn!(error = %e, "failed to write ownership marker");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::Acquire) == generation
    }

    async fn pump(self, generation: u64, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            if !self.is_current(generation) {
                debug!(generation, "dropping event from a replaced session");
                return;
            }
            match event {
                TransportEvent::PairingCode(payload) => self.on_pairing(payload).await,
                TransportEvent::Opened => self.on_opened().await,
                TransportEvent::Closed(reason) => {
                    self.on_closed(generation, reason).await;
                    return;
                }
                TransportEvent::CredentialsUpdated(creds) => self.persist_credentials(&creds).await,
                TransportEvent::KeysUpdated(updates) => self.persist_keys(updates).await,
                TransportEvent::Message(inbound) => self.on_inbound(inbound),
            }
        }

        if self.is_current(generation) {
            let reason = CloseReason {
                status_code: None,
                message: "event stream ended".to_string(),
            };
            self.on_closed(generation, reason).await;
        }
    }

    async fn on_pairing(&self, payload: String) {
        let code = PairingCode::new(payload);
        if let Err(e) = self.inner.keys.write_key(PAIRING_KEY, &code.payload).await {
            debug!(error = %e, "failed to expose pairing code");
        }
        self.inner.pairing.send_replace(Some(code));
        self.inner.state.send_replace(ConnectionState::Pairing);
        info!("pairing code issued; scan it to link this instance");
    }

    async fn on_opened(&self) {
        let inner = &self.inner;
        inner.conflicts.store(0, Ordering::Release);
        inner.connecting.store(false, Ordering::Release);
        self.clear_pairing().await;
        self.write_owner_marker().await;
        inner.state.send_replace(ConnectionState::Connected);
        info!(instance_id = %inner.instance_id, "transport connected");
        let _ = inner.notices.send(ConnectionNotice::Connected);
    }

    async fn on_closed(&self, generation: u64, reason: CloseReason) {
        let inner = &self.inner;
        let kind = classify_close(&reason);
        inner.connecting.store(false, Ordering::Release);
        self.clear_session(generation).await;
        self.clear_pairing().await;

        if inner.fatal.is_raised() || inner.shutdown.is_cancelled() {
            inner.state.send_if_modified(|state| {
                let changed = *state == ConnectionState::Connected;
                if changed {
                    *state = ConnectionState::Disconnected;
                }
                changed
            });
            return;
        }

        match kind {
            CloseKind::LoggedOut => {
                warn!(
                    status = ?reason.status_code,
                    kind = %kind,
                    "session logged out; wiping credentials"
                );
                self.wipe_credentials().await;
                inner.state.send_replace(ConnectionState::Disconnected);
                self.reconnect_after(inner.settings.logged_out_delay);
            }
            CloseKind::Conflict => {
                let count = inner.conflicts.fetch_add(1, Ordering::AcqRel) + 1;
                if count >= inner.settings.max_conflicts {
                    error!(conflicts = count, "session conflict limit reached; terminating");
                    inner.state.send_replace(ConnectionState::Fatal);
                    inner.fatal.raise(FatalReason::RepeatedConflict);
                    return;
                }
                let delay = inner.settings.conflict_delay(&mut rand::thread_rng());
                warn!(
                    conflicts = count,
                    retry_ms = delay.as_millis() as u64,
                    "session replaced by another connection"
                );
                inner.state.send_replace(ConnectionState::Disconnected);
                self.reconnect_after(delay);
            }
            CloseKind::Transient => {
                info!(
                    status = ?reason.status_code,
                    reason = %reason.message,
                    retry_ms = inner.settings.transient_delay.as_millis() as u64,
                    "session closed"
                );
                inner.state.send_replace(ConnectionState::Disconnected);
                self.reconnect_after(inner.settings.transient_delay);
            }
        }
    }

    fn on_inbound(&self, inbound: InboundText) {
        if inbound.is_own {
            return;
        }
        self.maybe_mark_read(inbound.message_ref.clone());
        let _ = self.inner.notices.send(ConnectionNotice::Inbound(inbound));
    }

    fn maybe_mark_read(&self, message: MessageRef) {
        let settings = &self.inner.settings;
        let delay = {
            let mut rng = rand::thread_rng();
            if !rng.gen_bool(settings.read_receipt_probability) {
                return;
            }
            settings.read_receipt_delay(&mut rng)
        };

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = manager.session().await else {
                debug!("session gone before read receipt");
                return;
            };
            if let Err(e) = session.mark_read(&message).await {
                debug!(error = %e, message_id = %message.id, "read receipt failed");
            }
        });
    }

    async fn persist_credentials(&self, creds: &serde_json::Value) {
        if let Err(e) = self
            .inner
            .keys
            .write_key(CREDENTIALS_KEY, &creds.to_string())
            .await
        {
            warn!(error = %e, "failed to persist credentials");
        }
    }

    async fn persist_keys(&self, updates: Vec<KeyUpdate>) {
        for update in updates {
            let result = match &update.value {
                Some(value) => self.inner.keys.write_key(&update.key, &value.to_string()).await,
                None => self.inner.keys.delete_key(&update.key).await,
            };
            if let Err(e) = result {
                warn!(error = %e, key = %update.key, "failed to persist key update");
            }
        }
    }

    async fn wipe_credentials(&self) {
        match self
            .inner
            .keys
            .delete_keys_except(&self.inner.settings.preserve_keys)
            .await
        {
            Ok(removed) => info!(removed, "credential keys wiped"),
            Err(e) => warn!(error = %e, "failed to wipe credential keys"),
        }
    }

    async fn clear_pairing(&self) {
        if self.inner.pairing.send_replace(None).is_some() {
            if let Err(e) = self.inner.keys.delete_key(PAIRING_KEY).await {
                debug!(error = %e, "failed to clear exposed pairing code");
            }
        }
    }

    /// Drop the live session if it still belongs to `generation`.
    ///
    /// Called from the session's own pump, so the pump task is detached rather
    /// than aborted.
    async fn clear_session(&self, generation: u64) {
        let previous = {
            let mut live = self.inner.live.lock().await;
            if live.as_ref().is_some_and(|l| l.generation == generation) {
                live.take()
            } else {
                None
            }
        };
        if let Some(live) = previous {
            live.session.end().await;
        }
    }

    /// End whatever session is live and stop its pump.
    async fn teardown(&self) {
        let previous = self.inner.live.lock().await.take();
        if let Some(live) = previous {
            live.pump.abort();
            live.session.end().await;
            debug!(generation = live.generation, "previous session torn down");
        }
    }

    fn reconnect_after(&self, delay: Duration) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = manager.inner.shutdown.cancelled() => return,
                _ = manager.inner.fatal.token().cancelled() => return,
            }
            if let Err(e) = manager.connect().await {
                debug!(error = %e, "reconnect attempt failed");
            }
        });
    }

    /// The live session object, whatever the state.
    pub async fn session(&self) -> Option<Arc<dyn TransportSession>> {
        self.inner
            .live
            .lock()
            .await
            .as_ref()
            .map(|l| l.session.clone())
    }

    /// The live session, only while `connected`.
    pub async fn connected_session(&self) -> Result<Arc<dyn TransportSession>, HeraldError> {
        if self.state() != ConnectionState::Connected {
            return Err(HeraldError::NotConnected);
        }
        self.session().await.ok_or(HeraldError::NotConnected)
    }

    /// Log the session out at the transport. The resulting logged-out close
    /// wipes credentials and starts a new pairing.
    pub async fn logout(&self) -> Result<(), HeraldError> {
        let session = self.session().await.ok_or(HeraldError::NotConnected)?;
        info!("logging out transport session");
        session.logout().await
    }

    /// End the session, wipe credentials except the keep-list, and reconnect
    /// after a short pause.
    pub async fn reset(&self) {
        let inner = &self.inner;
        info!("resetting transport session");
        inner.generation.fetch_add(1, Ordering::AcqRel);
        self.teardown().await;
        inner.connecting.store(false, Ordering::Release);
        self.clear_pairing().await;
        self.wipe_credentials().await;
        inner.state.send_replace(ConnectionState::Disconnected);
        self.reconnect_after(inner.settings.reset_delay);
    }

    /// Stop reconnecting and end the live session.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.teardown().await;
        self.inner.state.send_if_modified(|state| {
            let changed = *state != ConnectionState::Fatal && *state != ConnectionState::Disconnected;
            if changed {
                *state = ConnectionState::Disconnected;
            }
            changed
        });
        debug!("connection manager shut down");
    }

    /// Run the ownership check every `integrity_check` until shutdown or a
    /// fatal condition.
    pub fn spawn_integrity_check(&self) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.inner.settings.integrity_check);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if manager.check_ownership().await {
                            break;
                        }
                    }
                    _ = manager.inner.shutdown.cancelled() => break,
                    _ = manager.inner.fatal.token().cancelled() => break,
                }
            }
        })
    }

    /// Compare the ownership marker with this instance.
    ///
    /// Returns `true` when another instance owns the session, after raising
    /// the fatal signal. A missing marker or a read error is not a takeover.
    pub async fn check_ownership(&self) -> bool {
        let inner = &self.inner;
        match inner.keys.read_key(OWNER_KEY).await {
            Ok(Some(owner)) if owner != inner.instance_id => {
                error!(
                    owner = %owner,
                    instance_id = %inner.instance_id,
                    "another instance took over the session; terminating"
                );
                inner.state.send_replace(ConnectionState::Fatal);
                inner.fatal.raise(FatalReason::OwnershipLost);
                inner.generation.fetch_add(1, Ordering::AcqRel);
                self.teardown().await;
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(error = %e, "ownership check failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("instance_id", &self.inner.instance_id)
            .field("state", &self.state())
            .finish()
    }
}
