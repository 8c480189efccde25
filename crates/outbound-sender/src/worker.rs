// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The send worker loop.
//!
//! Each tick checks the calendar and the session plan, occasionally takes a
//! simulated break, sweeps stale claims, claims the best `ready` draft,
//! leases an identity and hands the message to the transport. Outcomes are
//! written back to the draft, the send records, the campaign counters and
//! the pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use outbound_config::OutboundConfig;
use outbound_core::OutboundError;
use outbound_core::traits::OutboundTransport;
use outbound_core::types::{
    CampaignCounter, Draft, OutgoingMessage, POLICY_BLOCK_CODE, SendOutcome, SendStatus,
};
use outbound_pool::{AccountPool, IdentityLease, WaitHint};
use outbound_storage::NewSendRecord;
use outbound_storage::queries::{campaigns, drafts, send_records};
use outbound_timing::{Clock, LocalClock, SendingCalendar, SessionPlan, should_skip};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Added to cooldown waits so the identity is surely free on wake-up.
const WAIT_SLACK: Duration = Duration::from_secs(5);

/// Worker tunables, resolved from the `sending` and `queue` sections.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub calendar: SendingCalendar,
    pub session_count: u32,
    pub window_start_hour: u32,
    pub window_end_hour: u32,
    pub skip_probability: f64,
    pub send_timeout: Duration,
    pub stale_claim: chrono::Duration,
    pub sweep_interval: Duration,
    pub holiday_sleep: Duration,
    pub skip_sleep: Duration,
    pub exhausted_sleep: Duration,
    pub no_draft_sleep: Duration,
    pub max_wait: Duration,
    pub error_sleep: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &OutboundConfig) -> Self {
        let sending = &config.sending;
        let queue = &config.queue;
        Self {
            calendar: SendingCalendar {
                skip_weekends: sending.skip_weekends,
                skip_holidays: sending.skip_holidays,
            },
            session_count: sending.session_count,
            window_start_hour: sending.window_start_hour,
            window_end_hour: sending.window_end_hour,
            skip_probability: sending.skip_probability,
            send_timeout: Duration::from_secs(queue.send_timeout_secs),
            stale_claim: chrono::Duration::minutes(i64::from(queue.stale_claim_mins)),
            sweep_interval: Duration::from_secs(queue.sweep_interval_secs),
            holiday_sleep: Duration::from_secs(queue.holiday_sleep_secs),
            skip_sleep: Duration::from_secs(queue.skip_sleep_secs),
            exhausted_sleep: Duration::from_secs(queue.exhausted_sleep_secs),
            no_draft_sleep: Duration::from_secs(queue.no_draft_sleep_secs),
            max_wait: Duration::from_secs(queue.max_wait_secs),
            error_sleep: Duration::from_secs(queue.error_sleep_secs),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&OutboundConfig::default())
    }
}

/// Why a tick did not send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleReason {
    /// Weekend or holiday.
    Closed(String),
    /// Before, between or after the day's sessions.
    OutsideWindow,
    /// Inside a session whose allocation is used up.
    SessionPaced,
    /// Simulated break.
    RandomSkip,
    /// No identity has quota left today.
    NoCapacity,
    /// Nothing claimable; the pool's hint decided the sleep.
    NoDraft(WaitHint),
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Idle { reason: IdleReason, sleep: Duration },
    Sent { draft_id: String, identity: String },
    Failed { draft_id: String, error: String },
    Blocked { draft_id: String, identity: String },
    /// Claimed, but no identity could take it; back to `ready`.
    Released { draft_id: String, sleep: Duration },
    /// Shutdown arrived between claim and send; back to `ready`.
    Cancelled { draft_id: String },
}

impl Tick {
    /// How long the loop should wait before the next tick.
    pub fn sleep(&self) -> Duration {
        match self {
            Tick::Idle { sleep, .. } | Tick::Released { sleep, .. } => *sleep,
            _ => Duration::ZERO,
        }
    }
}

/// Running counters since the worker started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    pub blocked: u64,
}

fn is_block_text(text: &str) -> bool {
    text.contains(&POLICY_BLOCK_CODE.to_string())
}

pub struct SendWorker {
    name: String,
    db: outbound_storage::Database,
    clock: Arc<dyn Clock>,
    local: LocalClock,
    pool: Arc<AccountPool>,
    transport: Arc<dyn OutboundTransport>,
    settings: WorkerSettings,
    stats: Mutex<SendStats>,
    last_sweep: Mutex<Option<DateTime<Utc>>>,
}

impl SendWorker {
    pub fn new(
        name: impl Into<String>,
        db: outbound_storage::Database,
        clock: Arc<dyn Clock>,
        local: LocalClock,
        pool: Arc<AccountPool>,
        transport: Arc<dyn OutboundTransport>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            db,
            clock,
            local,
            pool,
            transport,
            settings,
            stats: Mutex::new(SendStats::default()),
            last_sweep: Mutex::new(None),
        }
    }

    pub async fn stats(&self) -> SendStats {
        *self.stats.lock().await
    }

    /// Send until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(worker = %self.name, "send worker started");
        while !cancel.is_cancelled() {
            let sleep = match self.tick(&cancel).await {
                Ok(tick) => {
                    if let Tick::Idle { reason, sleep } = &tick {
                        debug!(worker = %self.name, ?reason, sleep_secs = sleep.as_secs(), "worker idle");
                    }
                    tick.sleep()
                }
                Err(e) => {
                    error!(worker = %self.name, error = %e, "send tick failed");
                    self.settings.error_sleep
                }
            };
            if sleep.is_zero() {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep) => {}
            }
        }
        let stats = self.stats().await;
        info!(
            worker = %self.name,
            sent = stats.sent,
            failed = stats.failed,
            blocked = stats.blocked,
            "send worker stopped"
        );
    }

    /// One pass of the send loop.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<Tick, OutboundError> {
        let now = self.clock.now();
        if let Some(idle) = self.check_schedule(now).await? {
            return Ok(idle);
        }

        let skip = {
            let mut rng = rand::thread_rng();
            should_skip(self.settings.skip_probability, &mut rng)
        };
        if skip {
            self.stats.lock().await.skipped += 1;
            return Ok(Tick::Idle {
                reason: IdleReason::RandomSkip,
                sleep: self.settings.skip_sleep,
            });
        }

        self.maybe_sweep(now).await?;

        let excluded = self.pool.tracker().saturated_domains().await?;
        let Some(draft) = drafts::claim_next(&self.db, None, &excluded, now).await? else {
            let hint = self.pool.wait_hint().await?;
            return Ok(Tick::Idle {
                reason: IdleReason::NoDraft(hint),
                sleep: self.sleep_for(hint),
            });
        };
        debug!(
            worker = %self.name,
            draft_id = %draft.id,
            recipient = %draft.recipient_email,
            followup = draft.followup_number,
            "draft claimed"
        );
        self.deliver(draft, cancel).await
    }

    /// Return stale claims to `ready`.
    pub async fn sweep_stale(&self) -> Result<usize, OutboundError> {
        let now = self.clock.now();
        let moved = drafts::cleanup_stale_claimed(&self.db, self.settings.stale_claim, now).await?;
        *self.last_sweep.lock().await = Some(now);
        if moved > 0 {
            warn!(worker = %self.name, moved, "stale claims returned to ready");
        }
        Ok(moved)
    }

    async fn maybe_sweep(&self, now: DateTime<Utc>) -> Result<(), OutboundError> {
        let due = {
            let last = self.last_sweep.lock().await;
            last.is_none_or(|at| {
                (now - at).to_std().unwrap_or(Duration::ZERO) >= self.settings.sweep_interval
            })
        };
        if due {
            self.sweep_stale().await?;
        }
        Ok(())
    }

    fn sleep_for(&self, hint: WaitHint) -> Duration {
        match hint {
            WaitHint::Ready => self.settings.no_draft_sleep,
            WaitHint::Wait(d) => (d + WAIT_SLACK).min(self.settings.max_wait),
            WaitHint::Exhausted => self.settings.exhausted_sleep,
        }
    }

    /// Calendar and session gate. `None` means sending may proceed.
    async fn check_schedule(&self, now: DateTime<Utc>) -> Result<Option<Tick>, OutboundError> {
        let local_now = self.local.to_local(now);
        if let Some(reason) = self.settings.calendar.closed_reason(local_now.date()) {
            return Ok(Some(Tick::Idle {
                reason: IdleReason::Closed(reason),
                sleep: self.settings.holiday_sleep,
            }));
        }

        let statuses = self.pool.status().await?;
        let quota: u32 = statuses.iter().map(|s| s.quota).sum();
        if quota == 0 {
            return Ok(Some(Tick::Idle {
                reason: IdleReason::NoCapacity,
                sleep: self.settings.exhausted_sleep,
            }));
        }
        let sent_today: u32 = statuses.iter().map(|s| s.sent_today).sum();
        let plan = SessionPlan::new(
            self.settings.session_count,
            quota,
            self.settings.window_start_hour,
            self.settings.window_end_hour,
        );

        let time = local_now.time();
        if plan.allows(time, sent_today) {
            return Ok(None);
        }
        let reason = if plan.current(time).is_some() {
            IdleReason::SessionPaced
        } else {
            IdleReason::OutsideWindow
        };
        let sleep = plan
            .next_start(time)
            .map(|start| self.local.at_local(local_now.date(), start) - now)
            .and_then(|d| d.to_std().ok())
            .filter(|d| !d.is_zero())
            .map_or(self.settings.holiday_sleep, |d| d.min(self.settings.holiday_sleep));
        Ok(Some(Tick::Idle { reason, sleep }))
    }

    async fn deliver(&self, draft: Draft, cancel: &CancellationToken) -> Result<Tick, OutboundError> {
        let mut lease = match self
            .pool
            .acquire(draft.identity.as_deref(), &draft.recipient_email)
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                drafts::release_claimed(&self.db, &draft.id).await?;
                let hint = self.pool.wait_hint().await?;
                debug!(draft_id = %draft.id, ?hint, "no identity available, claim released");
                return Ok(Tick::Released {
                    draft_id: draft.id,
                    sleep: self.sleep_for(hint),
                });
            }
            Err(e) => {
                if let Err(release) = drafts::release_claimed(&self.db, &draft.id).await {
                    warn!(draft_id = %draft.id, error = %release, "cannot release claim");
                }
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            self.pool.release(lease).await;
            drafts::release_claimed(&self.db, &draft.id).await?;
            info!(draft_id = %draft.id, "shutdown before send, claim released");
            return Ok(Tick::Cancelled { draft_id: draft.id });
        }

        let message = OutgoingMessage::from_draft(&draft);
        let result = tokio::time::timeout(
            self.settings.send_timeout,
            self.transport.send(lease.identity(), &message),
        )
        .await;

        let tick = match result {
            Ok(Ok(outcome)) if outcome.success => self.on_delivered(&draft, &mut lease, outcome).await,
            Ok(Ok(outcome)) => {
                let error = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "send failed".to_string());
                if outcome.is_policy_block() {
                    self.on_blocked(&draft, &lease, &error).await
                } else {
                    self.on_failed(&draft, &lease, &error).await
                }
            }
            Ok(Err(e)) => {
                let error = e.to_string();
                if is_block_text(&error) {
                    self.on_blocked(&draft, &lease, &error).await
                } else {
                    self.on_failed(&draft, &lease, &error).await
                }
            }
            Err(_) => {
                let error = OutboundError::Timeout {
                    duration: self.settings.send_timeout,
                }
                .to_string();
                self.on_failed(&draft, &lease, &error).await
            }
        };
        self.pool.release(lease).await;
        tick
    }

    fn record(
        &self,
        draft: &Draft,
        identity: &str,
        status: SendStatus,
        message_id: Option<String>,
        error: Option<String>,
    ) -> NewSendRecord {
        NewSendRecord {
            draft: draft.clone(),
            identity: identity.to_string(),
            status,
            message_id,
            error,
            sent_at: self.clock.now(),
        }
    }

    /// The message is out, so the pool is charged before anything that can
    /// fail. Later bookkeeping errors are logged rather than returned.
    async fn on_delivered(
        &self,
        draft: &Draft,
        lease: &mut IdentityLease,
        outcome: SendOutcome,
    ) -> Result<Tick, OutboundError> {
        let cooldown = self.pool.record_send(lease, &draft.recipient_email);
        let identity = lease.address();
        let now = self.clock.now();
        if let Err(e) =
            drafts::mark_sent(&self.db, &draft.id, outcome.message_id.as_deref(), identity, now).await
        {
            error!(draft_id = %draft.id, identity = %identity, error = %e, "delivered draft not marked sent");
        }
        if let Err(e) = send_records::insert(
            &self.db,
            self.record(draft, identity, SendStatus::Sent, outcome.message_id.clone(), None),
        )
        .await
        {
            error!(draft_id = %draft.id, identity = %identity, error = %e, "send record not written");
        }
        if let Err(e) =
            campaigns::increment_counter(&self.db, &draft.campaign_id, CampaignCounter::Sent, 1, now)
                .await
        {
            warn!(campaign = %draft.campaign_id, error = %e, "sent counter not updated");
        }
        self.stats.lock().await.sent += 1;
        info!(
            worker = %self.name,
            draft_id = %draft.id,
            identity = %identity,
            recipient = %draft.recipient_email,
            followup = draft.followup_number,
            next_in_mins = cooldown.as_secs() / 60,
            "draft sent"
        );
        Ok(Tick::Sent {
            draft_id: draft.id.clone(),
            identity: identity.to_string(),
        })
    }

    async fn on_blocked(
        &self,
        draft: &Draft,
        lease: &IdentityLease,
        error: &str,
    ) -> Result<Tick, OutboundError> {
        let identity = lease.address();
        error!(draft_id = %draft.id, identity = %identity, error, "identity rejected by provider");
        self.pool.mark_blocked(identity, error).await?;
        drafts::mark_failed(&self.db, &draft.id, Some(identity), error).await?;
        send_records::insert(
            &self.db,
            self.record(draft, identity, SendStatus::Failed, None, Some(error.to_string())),
        )
        .await?;
        campaigns::increment_counter(
            &self.db,
            &draft.campaign_id,
            CampaignCounter::Failed,
            1,
            self.clock.now(),
        )
        .await?;
        self.stats.lock().await.blocked += 1;
        Ok(Tick::Blocked {
            draft_id: draft.id.clone(),
            identity: identity.to_string(),
        })
    }

    async fn on_failed(
        &self,
        draft: &Draft,
        lease: &IdentityLease,
        error: &str,
    ) -> Result<Tick, OutboundError> {
        let identity = lease.address();
        warn!(draft_id = %draft.id, identity = %identity, error, "send failed");
        drafts::mark_failed(&self.db, &draft.id, Some(identity), error).await?;
        send_records::insert(
            &self.db,
            self.record(draft, identity, SendStatus::Failed, None, Some(error.to_string())),
        )
        .await?;
        campaigns::increment_counter(
            &self.db,
            &draft.campaign_id,
            CampaignCounter::Failed,
            1,
            self.clock.now(),
        )
        .await?;
        self.stats.lock().await.failed += 1;
        Ok(Tick::Failed {
            draft_id: draft.id.clone(),
            error: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_detection_matches_the_policy_code() {
        assert!(is_block_text("transport error: 554 5.7.1 sender rejected"));
        assert!(!is_block_text("connection reset"));
    }

    #[test]
    fn tick_sleep_only_for_waiting_ticks() {
        let idle = Tick::Idle {
            reason: IdleReason::RandomSkip,
            sleep: Duration::from_secs(120),
        };
        assert_eq!(idle.sleep(), Duration::from_secs(120));
        let sent = Tick::Sent {
            draft_id: "d".into(),
            identity: "a@b.com".into(),
        };
        assert_eq!(sent.sleep(), Duration::ZERO);
    }

    #[test]
    fn settings_follow_config() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.send_timeout, Duration::from_secs(60));
        assert_eq!(settings.stale_claim, chrono::Duration::minutes(30));
        assert_eq!(settings.holiday_sleep, Duration::from_secs(3600));
        assert!((settings.skip_probability - 0.04).abs() < f64::EPSILON);
    }
}
