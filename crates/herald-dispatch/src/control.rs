// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The control surface: session control, campaign lifecycle, status.
//!
//! [`Engine`] ties the scheduler, the connection manager, and the store
//! together and is what the binary drives.

use std::sync::Arc;
use std::time::Duration;

use herald_config::model::HeraldConfig;
use herald_connection::{ConnectionManager, ConnectionNotice};
use herald_core::types::InboundText;
use herald_core::{
    Address, Campaign, CampaignStatus, Clock, ConnectionState, HeraldError, KeyStore, MessageId,
    Presence, StorageAdapter,
};
use herald_pacing::{Pacer, PacingPolicy, strategy_from_config};
use herald_template::Renderer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::admin::{
    FORCE_CONTINUE_KEY, RESET_SESSION_KEY, TEST_MESSAGE_KEY, TestMessageRequest, insert_campaign,
};
use crate::import::{ColumnMapping, ImportRow};
use crate::inbound::{InboundAction, InboundHandler};
use crate::report::{self, CampaignSummary, HISTORY_LIMIT, LogLine, Progress};
use crate::scheduler::{Scheduler, SchedulerSettings};
use crate::state::{Activity, SchedulerMode};

/// Pause between the typing indicator and a test message.
const TEST_MESSAGE_TYPING: Duration = Duration::from_secs(1);

/// Live status of this process plus store-derived progress.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub connection: ConnectionState,
    /// Printable pairing code while pairing.
    pub pairing_code: Option<String>,
    pub mode: SchedulerMode,
    pub activity: Activity,
    pub reply_pause_active: bool,
    #[serde(flatten)]
    pub progress: Progress,
}

struct EngineInner {
    scheduler: Arc<Scheduler>,
    connection: ConnectionManager,
    storage: Arc<dyn StorageAdapter>,
    keys: Arc<dyn KeyStore>,
    inbound: InboundHandler,
    renderer: Renderer,
    clock: Arc<dyn Clock>,
    idle_poll: Duration,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(
        config: &HeraldConfig,
        storage: Arc<dyn StorageAdapter>,
        keys: Arc<dyn KeyStore>,
        connection: ConnectionManager,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let renderer = Renderer::from_config(&config.template);
        let pacer = Pacer::new(PacingPolicy::from_config(&config.pacing));
        let initial_burst = pacer.next_burst_target(&mut rand::thread_rng());
        let scheduler = Arc::new(Scheduler::new(
            storage.clone(),
            connection.clone(),
            renderer,
            pacer,
            Arc::from(strategy_from_config(&config.pacing)),
            SchedulerSettings::from_config(&config.scheduler),
            clock.clone(),
            initial_burst,
        ));
        let inbound = InboundHandler::new(
            storage.clone(),
            clock.clone(),
            &config.scheduler.stop_keywords,
        );
        Self {
            inner: Arc::new(EngineInner {
                scheduler,
                connection,
                storage,
                keys,
                inbound,
                renderer,
                clock,
                idle_poll: Duration::from_secs(config.scheduler.idle_poll_secs.max(1)),
            }),
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.inner.scheduler
    }

    // --- session control ---

    pub async fn start_session(&self) -> Result<(), HeraldError> {
        self.inner.connection.connect().await
    }

    /// Log out at the transport. Credentials are wiped when the close arrives.
    pub async fn logout_session(&self) -> Result<(), HeraldError> {
        self.inner.connection.logout().await
    }

    /// Idle the scheduler, wipe credentials, and reconnect for a new pairing.
    pub async fn reset_session(&self) {
        self.go_idle().await;
        self.inner.connection.reset().await;
    }

    // --- campaign lifecycle ---

    /// Spawn the dispatch loop if none is active.
    pub async fn start(&self) -> bool {
        self.inner.scheduler.start(StdRng::from_entropy()).await
    }

    /// Create a running campaign from imported rows and start dispatching it.
    pub async fn create_campaign(
        &self,
        name: &str,
        template: &str,
        rows: &[ImportRow],
        mapping: Option<&ColumnMapping>,
    ) -> Result<Campaign, HeraldError> {
        let campaign = insert_campaign(
            self.inner.storage.as_ref(),
            self.inner.clock.now(),
            name,
            template,
            rows,
            mapping,
        )
        .await?;
        self.inner.scheduler.state().await.bind(campaign.id.clone());
        self.start().await;
        Ok(campaign)
    }

    async fn bound_campaign_id(&self) -> Option<String> {
        self.inner
            .scheduler
            .state()
            .await
            .campaign_id()
            .map(str::to_string)
    }

    /// Pause the bound campaign.
    pub async fn pause(&self) -> Result<(), HeraldError> {
        let id = self
            .bound_campaign_id()
            .await
            .ok_or(HeraldError::NoActiveCampaign)?;
        self.inner
            .storage
            .set_campaign_status(&id, CampaignStatus::Paused, self.inner.clock.now())
            .await?;
        self.inner.scheduler.pause().await;
        info!(campaign_id = %id, "campaign paused");
        Ok(())
    }

    /// Resume the bound campaign, or the latest unfinished one.
    pub async fn resume(&self) -> Result<(), HeraldError> {
        let id = match self.bound_campaign_id().await {
            Some(id) => id,
            None => match self.inner.storage.latest_campaign().await? {
                Some(c) if !c.status.is_finished() => c.id,
                _ => return Err(HeraldError::NoActiveCampaign),
            },
        };
        self.inner
            .storage
            .set_campaign_status(&id, CampaignStatus::Running, self.inner.clock.now())
            .await?;
        self.inner.scheduler.state().await.bind(id.clone());
        info!(campaign_id = %id, "campaign resumed");
        self.start().await;
        Ok(())
    }

    /// Pause when running, resume otherwise. Returns the resulting mode.
    pub async fn toggle(&self) -> Result<SchedulerMode, HeraldError> {
        let mode = self.inner.scheduler.state().await.mode();
        if mode == SchedulerMode::Running {
            self.pause().await?;
        } else {
            self.resume().await?;
        }
        Ok(self.inner.scheduler.state().await.mode())
    }

    /// Stop the bound campaign, or every running campaign when none is bound.
    pub async fn stop(&self) -> Result<u64, HeraldError> {
        let now = self.inner.clock.now();
        let ids = match self.bound_campaign_id().await {
            Some(id) => vec![id],
            None => self.inner.storage.running_campaign_ids().await?,
        };
        for id in &ids {
            self.inner
                .storage
                .set_campaign_status(id, CampaignStatus::Stopped, now)
                .await?;
            info!(campaign_id = %id, "campaign stopped");
        }
        self.go_idle().await;
        Ok(ids.len() as u64)
    }

    /// Remove a campaign and its contacts, unbinding it if bound.
    pub async fn delete_campaign(&self, id: &str) -> Result<bool, HeraldError> {
        let deleted = self.inner.storage.delete_campaign(id).await?;
        if self.bound_campaign_id().await.as_deref() == Some(id) {
            self.go_idle().await;
        }
        if deleted {
            info!(campaign_id = %id, "campaign deleted");
        }
        Ok(deleted)
    }

    /// Leave standby now and ignore the daily cap for the rest of the UTC
    /// day.
    pub async fn force_continue(&self) {
        let day = self.inner.clock.now().date_naive();
        self.inner.scheduler.force_continue(day).await;
        info!(%day, "force continue: daily cap lifted for today");
    }

    async fn go_idle(&self) {
        self.inner.scheduler.go_idle().await;
    }

    // --- one-off sends and inbound ---

    /// Send a watermarked text to `phone` with a short typing indicator.
    pub async fn send_test_message(&self, phone: &str, text: &str) -> Result<MessageId, HeraldError> {
        let session = self.inner.connection.connected_session().await?;
        let address = Address::from_phone(phone)?;
        if let Err(e) = session.set_presence(Presence::Composing, Some(&address)).await {
            debug!(error = %e, "presence update failed");
        }
        tokio::time::sleep(TEST_MESSAGE_TYPING).await;
        let id = session
            .send_text(&address, &self.inner.renderer.watermark_only(text))
            .await?;
        info!(phone = %address, "test message sent");
        Ok(id)
    }

    /// Apply an inbound message: opt-outs blacklist the sender, replies pause
    /// dispatch.
    pub async fn handle_inbound(&self, message: &InboundText) -> Result<InboundAction, HeraldError> {
        let action = self.inner.inbound.handle(message).await?;
        if matches!(action, InboundAction::Reply { .. }) {
            self.inner.scheduler.record_reply().await;
        }
        Ok(action)
    }

    // --- reporting ---

    pub async fn status(&self) -> Result<StatusReport, HeraldError> {
        let scheduler = &self.inner.scheduler;
        let mut progress = report::progress(
            self.inner.storage.as_ref(),
            scheduler.queue(),
            scheduler.cap_strategy(),
            self.inner.clock.now(),
        )
        .await?;

        let reply_pause_active = scheduler.reply_pause_active().await;
        if reply_pause_active {
            progress
                .logs
                .insert(0, LogLine::reply_pause(self.inner.clock.now()));
        }

        let (mut mode, activity) = {
            let state = scheduler.state().await;
            (state.mode(), state.activity())
        };
        if progress
            .campaign
            .as_ref()
            .is_some_and(|s| s.campaign.status == CampaignStatus::Completed)
        {
            mode = SchedulerMode::Idle;
        }

        Ok(StatusReport {
            connection: self.inner.connection.state(),
            pairing_code: self.inner.connection.pairing_code().map(|p| p.rendered),
            mode,
            activity,
            reply_pause_active,
            progress,
        })
    }

    pub async fn history(&self) -> Result<Vec<CampaignSummary>, HeraldError> {
        report::history(self.inner.storage.as_ref(), HISTORY_LIMIT).await
    }

    // --- background tasks ---

    /// Consume connection notices: restart dispatch on connect, apply inbound
    /// messages.
    pub fn spawn_notice_listener(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let engine = self.clone();
        let mut notices = self.inner.connection.subscribe();
        tokio::spawn(async move {
            loop {
                let notice = tokio::select! {
                    notice = notices.recv() => notice,
                    _ = cancel.cancelled() => break,
                };
                match notice {
                    Ok(ConnectionNotice::Connected) => engine.resume_if_running().await,
                    Ok(ConnectionNotice::Inbound(message)) => {
                        if let Err(e) = engine.handle_inbound(&message).await {
                            warn!(error = %e, "failed to handle inbound message");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "connection notices dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Poll for cross-process requests every `idle_poll_secs`.
    pub fn spawn_idle_watcher(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.inner.idle_poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.idle_check().await,
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }

    /// Apply pending control requests written by other processes, follow
    /// status changes of the bound campaign, then restart an idle scheduler
    /// when a running campaign exists.
    pub async fn idle_check(&self) {
        if self.take_request(FORCE_CONTINUE_KEY).await.is_some() {
            self.force_continue().await;
        }
        if self.take_request(RESET_SESSION_KEY).await.is_some() {
            info!("session reset requested");
            self.reset_session().await;
        }
        if let Some(raw) = self.take_request(TEST_MESSAGE_KEY).await {
            match serde_json::from_str::<TestMessageRequest>(&raw) {
                Ok(request) => {
                    if let Err(e) = self.send_test_message(&request.phone, &request.text).await {
                        warn!(error = %e, phone = %request.phone, "test message failed");
                    }
                }
                Err(e) => warn!(error = %e, "malformed test message request"),
            }
        }

        self.follow_bound_campaign().await;
        if !self.inner.scheduler.is_loop_active() {
            self.resume_if_running().await;
        }
    }

    /// Go idle when another process moved the bound campaign out of
    /// `running`, so the loop stops within one sleep increment.
    async fn follow_bound_campaign(&self) {
        let bound = {
            let state = self.inner.scheduler.state().await;
            match (state.mode(), state.campaign_id()) {
                (SchedulerMode::Running, Some(id)) => Some(id.to_string()),
                _ => None,
            }
        };
        let Some(id) = bound else {
            return;
        };
        match self.inner.storage.get_campaign(&id).await {
            Ok(Some(campaign)) if campaign.status == CampaignStatus::Running => {}
            Ok(other) => {
                info!(
                    campaign_id = %id,
                    status = ?other.map(|c| c.status),
                    "bound campaign changed by another process; going idle"
                );
                self.go_idle().await;
            }
            Err(e) => warn!(error = %e, campaign_id = %id, "failed to re-read bound campaign"),
        }
    }

    /// Read and clear one request key.
    async fn take_request(&self, key: &str) -> Option<String> {
        let value = match self.inner.keys.read_key(key).await {
            Ok(value) => value?,
            Err(e) => {
                debug!(error = %e, key, "failed to read control request");
                return None;
            }
        };
        if let Err(e) = self.inner.keys.delete_key(key).await {
            warn!(error = %e, key, "failed to clear control request");
        }
        Some(value)
    }

    async fn resume_if_running(&self) {
        match self.inner.storage.latest_running_campaign().await {
            Ok(Some(campaign)) => {
                if self.start().await {
                    info!(campaign_id = %campaign.id, "running campaign found; dispatch restarted");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to look up running campaigns"),
        }
    }

    /// Stop dispatching and end the transport session.
    pub async fn shutdown(&self) {
        self.go_idle().await;
        self.inner.connection.shutdown().await;
    }
}
