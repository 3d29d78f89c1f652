// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch loop.
//!
//! One loop runs per process. Each tick walks a fixed priority order: reply
//! pause, daily cap, burst cooldown, campaign resolution, connectivity, fetch,
//! safety checks, existence probe, then render and send. Every wait goes
//! through [`Interrupt::sleep`]. Leaving `running` halts any wait within one
//! sleep increment; force-continue releases only the daily-cap standby.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use herald_config::model::SchedulerConfig;
use herald_connection::ConnectionManager;
use herald_core::{
    Address, Campaign, CampaignStatus, Clock, ConnectionState, Contact, ContactStatus,
    HeraldError, MessageId, Presence, StorageAdapter, TransportSession,
};
use herald_pacing::{DailyCapStrategy, Pacer, TypingPlan, is_over_daily_cap};
use herald_template::Renderer;
use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::interrupt::{Interrupt, SleepOutcome, Wait};
use crate::queue::ContactQueue;
use crate::state::{Activity, SchedulerMode, SchedulerState};

/// Error text stored on contacts the transport does not know.
pub const NOT_ON_PLATFORM: &str = "Not on platform";

/// Error text stored on contacts skipped because of the blacklist.
pub const BLACKLISTED: &str = "Blacklisted";

/// Timings and switches for the dispatch loop, from `[scheduler]`.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub reply_pause: Duration,
    pub reply_poll: Duration,
    pub standby_recheck: Duration,
    pub sleep_increment: Duration,
    pub connectivity_poll: Duration,
    pub probe_backoff: Duration,
    pub invalid_backoff: Duration,
    pub failure_backoff: Duration,
    pub failure_threshold: u32,
    pub simulate_typing: bool,
    pub cooldown_presence: bool,
}

impl SchedulerSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            reply_pause: Duration::from_secs(config.reply_pause_secs),
            reply_poll: Duration::from_secs(config.reply_poll_secs),
            standby_recheck: Duration::from_secs(config.standby_recheck_secs),
            sleep_increment: Duration::from_millis(config.sleep_increment_ms.max(1)),
            connectivity_poll: Duration::from_secs(config.connectivity_poll_secs),
            probe_backoff: Duration::from_secs(config.probe_backoff_secs),
            invalid_backoff: Duration::from_secs(config.invalid_backoff_secs),
            failure_backoff: Duration::from_secs(config.failure_backoff_secs),
            failure_threshold: config.failure_threshold.max(1),
            simulate_typing: config.simulate_typing,
            cooldown_presence: config.cooldown_presence,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Continue,
    Exit,
}

pub struct Scheduler {
    storage: Arc<dyn StorageAdapter>,
    queue: ContactQueue,
    connection: ConnectionManager,
    renderer: Renderer,
    pacer: Pacer,
    cap: Arc<dyn DailyCapStrategy>,
    settings: SchedulerSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
    interrupt: Interrupt,
    loop_active: AtomicBool,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        connection: ConnectionManager,
        renderer: Renderer,
        pacer: Pacer,
        cap: Arc<dyn DailyCapStrategy>,
        settings: SchedulerSettings,
        clock: Arc<dyn Clock>,
        initial_burst: u32,
    ) -> Self {
        let interrupt = Interrupt::new(settings.sleep_increment);
        Self {
            queue: ContactQueue::new(storage.clone()),
            storage,
            connection,
            renderer,
            pacer,
            cap,
            settings,
            clock,
            state: Mutex::new(SchedulerState::new(initial_burst)),
            interrupt,
            loop_active: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &ContactQueue {
        &self.queue
    }

    pub fn cap_strategy(&self) -> &dyn DailyCapStrategy {
        self.cap.as_ref()
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub async fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().await
    }

    pub fn is_loop_active(&self) -> bool {
        self.loop_active.load(Ordering::Acquire)
    }

    /// Enter `paused` and halt whatever the loop is waiting on.
    pub async fn pause(&self) {
        let mut state = self.state().await;
        state.pause();
        self.interrupt.halt();
    }

    /// Enter `idle`, unbind, and halt whatever the loop is waiting on.
    pub async fn go_idle(&self) {
        let mut state = self.state().await;
        state.go_idle();
        self.interrupt.halt();
    }

    /// Ignore the daily cap for `day` and end a standby in progress.
    ///
    /// Inter-message delays, cooldowns, and the burst count are untouched.
    pub async fn force_continue(&self, day: NaiveDate) {
        self.state().await.override_cap(day);
        self.interrupt.release_standby();
    }

    /// Enter `running` and spawn the loop unless one is already active.
    ///
    /// A loop that is already active keeps its current wait. Returns whether
    /// a new loop task was spawned.
    pub async fn start(self: &Arc<Self>, rng: StdRng) -> bool {
        {
            let mut state = self.state().await;
            if state.start() {
                info!("scheduler running");
            }
            self.interrupt.clear_halt();
        }
        if self
            .loop_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        tokio::spawn(self.clone().run(rng));
        true
    }

    async fn run(self: Arc<Self>, mut rng: StdRng) {
        info!("dispatch loop started");
        loop {
            self.drive(&mut rng).await;
            self.loop_active.store(false, Ordering::Release);

            // A start request that raced the exit finds the flag still set and
            // leaves the restart to this task.
            let resume = self.state().await.mode() == SchedulerMode::Running;
            if !resume
                || self
                    .loop_active
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                break;
            }
        }
        info!("dispatch loop stopped");
    }

    async fn drive(&self, rng: &mut StdRng) {
        loop {
            match self.tick(rng).await {
                Ok(Tick::Continue) => {}
                Ok(Tick::Exit) => return,
                Err(e) => {
                    warn!(error = %e, "dispatch tick failed");
                    self.interrupt
                        .sleep(self.settings.failure_backoff, Wait::Pacing)
                        .await;
                }
            }
        }
    }

    async fn tick(&self, rng: &mut StdRng) -> Result<Tick, HeraldError> {
        if self.state().await.mode() != SchedulerMode::Running {
            self.enter(Activity::Idle).await;
            return Ok(Tick::Exit);
        }

        if self.reply_pause_active().await {
            if self.enter(Activity::ReplyPause).await {
                info!("recent reply detected; pausing dispatch");
            }
            self.interrupt.sleep(self.settings.reply_poll, Wait::Pacing).await;
            return Ok(Tick::Continue);
        }

        if self.standby_if_capped().await? {
            return Ok(Tick::Continue);
        }

        if self.state().await.burst_reached() {
            self.cooldown(rng).await;
            return Ok(Tick::Continue);
        }

        let Some(campaign) = self.resolve_campaign().await? else {
            return Ok(Tick::Exit);
        };

        let session = match self.connection.connected_session().await {
            Ok(session) => session,
            Err(_) => {
                if self.enter(Activity::AwaitingConnection).await {
                    info!(state = %self.connection.state(), "waiting for transport connectivity");
                }
                self.interrupt
                    .sleep(self.settings.connectivity_poll, Wait::Pacing)
                    .await;
                return Ok(Tick::Continue);
            }
        };
        if self.enter(Activity::Dispatching).await {
            info!(campaign_id = %campaign.id, "dispatching");
        }

        let Some(contact) = self.queue.next_pending(&campaign.id).await? else {
            self.complete_campaign(&campaign).await?;
            return Ok(Tick::Continue);
        };

        let Some(address) = self.safety_checks(&contact).await? else {
            return Ok(Tick::Continue);
        };

        match session.probe_exists(&address).await {
            Ok(true) => {}
            Ok(false) => {
                self.mark(&contact, ContactStatus::Invalid, Some(NOT_ON_PLATFORM))
                    .await?;
                self.interrupt
                    .sleep(self.settings.invalid_backoff, Wait::Pacing)
                    .await;
                return Ok(Tick::Continue);
            }
            Err(e) => {
                warn!(error = %e, contact_id = contact.id, "existence probe failed; contact left pending");
                self.interrupt
                    .sleep(self.settings.probe_backoff, Wait::Pacing)
                    .await;
                return Ok(Tick::Continue);
            }
        }

        self.render_and_send(session.as_ref(), &campaign, &contact, &address, rng)
            .await?;
        Ok(Tick::Continue)
    }

    async fn enter(&self, activity: Activity) -> bool {
        self.state().await.set_activity(activity)
    }

    pub async fn reply_pause_active(&self) -> bool {
        self.state()
            .await
            .reply_pause_active(Instant::now(), self.settings.reply_pause)
    }

    /// Note an inbound reply; dispatch pauses for the reply window.
    pub async fn record_reply(&self) {
        self.state().await.record_reply(Instant::now());
    }

    /// Today's terminal count and cap. The cap is computed once per UTC day.
    pub async fn daily_usage(&self) -> Result<(u64, u64), HeraldError> {
        let now = self.clock.now();
        let day = now.date_naive();
        let today = self.queue.today_count(now).await?;
        let cached = self.state().await.cached_cap(day);
        let cap = match cached {
            Some(cap) => cap,
            None => {
                let cap = self.queue.daily_cap(self.cap.as_ref(), now).await?;
                self.state().await.cache_cap(day, cap);
                info!(cap, "daily cap set");
                cap
            }
        };
        Ok((today, cap))
    }

    async fn standby_if_capped(&self) -> Result<bool, HeraldError> {
        let day = self.clock.now().date_naive();
        if self.state().await.cap_overridden(day) {
            self.interrupt.clear_release();
            return Ok(false);
        }
        let (today, cap) = self.daily_usage().await?;
        if !is_over_daily_cap(today, cap) {
            return Ok(false);
        }
        if self.enter(Activity::Standby).await {
            info!(today, cap, "daily cap reached; standing by");
        }
        let outcome = self
            .interrupt
            .sleep(self.settings.standby_recheck, Wait::Standby)
            .await;
        if outcome == SleepOutcome::Interrupted {
            debug!("standby interrupted");
        }
        Ok(true)
    }

    async fn cooldown(&self, rng: &mut StdRng) {
        let duration = self.pacer.cooldown_duration(rng);
        let sent = self.state().await.sent_in_burst();
        self.enter(Activity::Cooldown).await;
        info!(sent, cooldown_secs = duration.as_secs(), "burst complete; cooling down");

        if self.settings.cooldown_presence {
            if let Ok(session) = self.connection.connected_session().await {
                let presence = if rng.gen_bool(0.5) {
                    Presence::Unavailable
                } else {
                    Presence::Available
                };
                self.presence(session.as_ref(), presence, None).await;
            }
        }

        if self.interrupt.sleep(duration, Wait::Pacing).await == SleepOutcome::Interrupted {
            // The burst stays complete, so a resumed loop cools down again.
            debug!("cooldown halted");
            return;
        }
        let next = self.pacer.next_burst_target(rng);
        self.state().await.reset_burst(next);
        info!(next_burst = next, "cooldown over");
    }

    async fn resolve_campaign(&self) -> Result<Option<Campaign>, HeraldError> {
        let bound = self.state().await.campaign_id().map(str::to_string);
        match bound {
            Some(id) => {
                let campaign = self.storage.get_campaign(&id).await?;
                match campaign {
                    Some(c) if c.status == CampaignStatus::Running => Ok(Some(c)),
                    other => {
                        info!(
                            campaign_id = %id,
                            status = ?other.map(|c| c.status),
                            "bound campaign no longer running; going idle"
                        );
                        self.go_idle().await;
                        Ok(None)
                    }
                }
            }
            None => match self.storage.latest_running_campaign().await? {
                Some(c) => {
                    info!(campaign_id = %c.id, name = %c.name, "campaign bound");
                    self.state().await.bind(c.id.clone());
                    Ok(Some(c))
                }
                None => {
                    info!("no running campaign; going idle");
                    self.go_idle().await;
                    Ok(None)
                }
            },
        }
    }

    async fn complete_campaign(&self, campaign: &Campaign) -> Result<(), HeraldError> {
        self.storage
            .set_campaign_status(&campaign.id, CampaignStatus::Completed, self.clock.now())
            .await?;
        self.state().await.unbind();
        info!(campaign_id = %campaign.id, "campaign completed");
        Ok(())
    }

    /// Blacklist and phone normalization. `None` means the contact was
    /// settled here and must not be sent to.
    async fn safety_checks(&self, contact: &Contact) -> Result<Option<Address>, HeraldError> {
        if self.queue.is_blacklisted(&contact.phone).await? {
            self.mark(contact, ContactStatus::Blacklisted, Some(BLACKLISTED))
                .await?;
            return Ok(None);
        }
        match Address::from_phone(&contact.phone) {
            Ok(address) => Ok(Some(address)),
            Err(e) => {
                self.mark(contact, ContactStatus::Failed, Some(&e.to_string()))
                    .await?;
                Ok(None)
            }
        }
    }

    async fn render_and_send(
        &self,
        session: &dyn TransportSession,
        campaign: &Campaign,
        contact: &Contact,
        address: &Address,
        rng: &mut StdRng,
    ) -> Result<(), HeraldError> {
        let text = self
            .renderer
            .render_with(&campaign.template, &contact.variables, rng);
        let plan = self
            .settings
            .simulate_typing
            .then(|| self.pacer.typing_plan(text.chars().count(), rng));

        let sent = match &plan {
            Some(plan) => match self.type_and_send(session, address, &text, plan).await {
                Some(sent) => sent,
                None => {
                    debug!(contact_id = contact.id, "halted while typing; contact left pending");
                    return Ok(());
                }
            },
            None => session.send_text(address, &text).await,
        };

        match sent {
            Ok(message_id) => {
                self.mark(contact, ContactStatus::Sent, None).await?;
                let (in_burst, target) = {
                    let mut state = self.state().await;
                    state.record_sent();
                    (state.sent_in_burst(), state.burst_target())
                };
                debug!(message_id = %message_id.0, in_burst, target, "delivery accepted");

                if let Some(plan) = plan {
                    self.interrupt.sleep(plan.linger, Wait::Pacing).await;
                    self.presence(session, Presence::Unavailable, Some(address))
                        .await;
                }
                let delay = self.pacer.next_inter_message_delay(rng);
                debug!(delay_secs = delay.as_secs(), "waiting before next message");
                self.interrupt.sleep(delay, Wait::Pacing).await;
            }
            Err(e) => {
                self.mark(contact, ContactStatus::Failed, Some(&e.to_string()))
                    .await?;
                let escalate = self
                    .state()
                    .await
                    .record_failure(self.settings.failure_threshold);
                if escalate {
                    let pause = self.pacer.cooldown_duration(rng);
                    warn!(
                        pause_secs = pause.as_secs(),
                        "repeated send failures; extended pause"
                    );
                    self.enter(Activity::Cooldown).await;
                    self.interrupt.sleep(pause, Wait::Pacing).await;
                } else {
                    self.interrupt
                        .sleep(self.settings.failure_backoff, Wait::Pacing)
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Walk the typing sequence, then send. `None` when a halt arrived
    /// before the send.
    async fn type_and_send(
        &self,
        session: &dyn TransportSession,
        to: &Address,
        text: &str,
        plan: &TypingPlan,
    ) -> Option<Result<MessageId, HeraldError>> {
        let steps = [
            (Presence::Available, plan.online),
            (Presence::Composing, plan.first_burst),
            (Presence::Paused, plan.hesitation),
            (Presence::Composing, plan.typing),
        ];
        for (presence, wait) in steps {
            self.presence(session, presence, Some(to)).await;
            if self.interrupt.sleep(wait, Wait::Pacing).await == SleepOutcome::Interrupted {
                self.presence(session, Presence::Paused, Some(to)).await;
                return None;
            }
        }
        Some(session.send_text(to, text).await)
    }

    async fn presence(&self, session: &dyn TransportSession, presence: Presence, to: Option<&Address>) {
        if let Err(e) = session.set_presence(presence, to).await {
            debug!(error = %e, presence = %presence, "presence update failed");
        }
    }

    async fn mark(
        &self,
        contact: &Contact,
        status: ContactStatus,
        error_message: Option<&str>,
    ) -> Result<bool, HeraldError> {
        self.queue
            .mark_outcome(contact, status, error_message, self.clock.now())
            .await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }
}
