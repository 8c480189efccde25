// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooperative tick loop driving scans, reputation refreshes, scheduled
//! campaign runs, the daily summary and the liveness heartbeat.
//!
//! A tick only decides what is due. The work itself runs in spawned tasks
//! holding a child of the shutdown token, so a long scan never delays the
//! next evaluation.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use outbound_config::OutboundConfig;
use outbound_config::validation::parse_hhmm;
use outbound_core::types::AlertSeverity;
use outbound_core::{Alerter, DraftStatus, OutboundError};
use outbound_generator::{DraftProducer, ProducerStats};
use outbound_mailbox::MailboxScanner;
use outbound_pool::AccountPool;
use outbound_storage::Database;
use outbound_storage::queries::{drafts, processed, scheduler};
use outbound_timing::{Clock, LocalClock};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::shutdown::drain;
use crate::summary::DailySummary;
use crate::trigger::{CampaignSchedule, DailyTrigger, FiredToday, IntervalTrigger, Trigger};

/// Heartbeat component name in the `heartbeats` table.
pub const HEARTBEAT_COMPONENT: &str = "orchestrator";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub tick: Duration,
    pub scan_enabled: bool,
    pub scan_interval: chrono::Duration,
    pub startup_scan_timeout: Duration,
    pub retention_days: u32,
    pub heartbeat: chrono::Duration,
    pub reputation_at: NaiveTime,
    pub summary_at: NaiveTime,
    pub campaigns: Vec<CampaignSchedule>,
    pub grace_period: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &OutboundConfig) -> Result<Self, OutboundError> {
        let scheduler = &config.scheduler;
        let time = |field: &str, value: &str| {
            parse_hhmm(value).ok_or_else(|| {
                OutboundError::Config(format!("scheduler.{field}: invalid time '{value}'"))
            })
        };
        Ok(Self {
            tick: Duration::from_secs(scheduler.tick_secs.max(1)),
            scan_enabled: config.mailbox.enabled,
            scan_interval: chrono::Duration::minutes(i64::from(config.mailbox.scan_interval_mins)),
            startup_scan_timeout: Duration::from_secs(config.mailbox.startup_scan_timeout_secs),
            retention_days: config.mailbox.retention_days,
            heartbeat: chrono::Duration::minutes(i64::from(scheduler.heartbeat_mins)),
            reputation_at: time("reputation_time", &scheduler.reputation_time)?,
            summary_at: time("summary_time", &scheduler.summary_time)?,
            campaigns: scheduler
                .campaigns
                .iter()
                .map(CampaignSchedule::from_config)
                .collect::<Result<_, _>>()?,
            grace_period: Duration::from_secs(scheduler.grace_period_secs),
        })
    }
}

struct TriggerState {
    scan: IntervalTrigger,
    heartbeat: IntervalTrigger,
    reputation: DailyTrigger,
    summary: DailyTrigger,
    campaign_runs: FiredToday,
}

pub struct Orchestrator {
    db: Database,
    clock: Arc<dyn Clock>,
    local: LocalClock,
    settings: OrchestratorSettings,
    pool: Arc<AccountPool>,
    producer: Arc<DraftProducer>,
    scanner: Arc<MailboxScanner>,
    alerter: Arc<dyn Alerter>,
    campaign_lock: Arc<Mutex<()>>,
    scan_lock: Arc<Mutex<()>>,
    state: Mutex<TriggerState>,
    tasks: Mutex<JoinSet<()>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        local: LocalClock,
        settings: OrchestratorSettings,
        pool: Arc<AccountPool>,
        producer: Arc<DraftProducer>,
        scanner: Arc<MailboxScanner>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        let state = TriggerState {
            scan: IntervalTrigger::new(settings.scan_interval),
            heartbeat: IntervalTrigger::new(settings.heartbeat),
            reputation: DailyTrigger::new("reputation", settings.reputation_at),
            summary: DailyTrigger::new("summary", settings.summary_at),
            campaign_runs: FiredToday::default(),
        };
        Self {
            db,
            clock,
            local,
            settings,
            pool,
            producer,
            scanner,
            alerter,
            campaign_lock: Arc::new(Mutex::new(())),
            scan_lock: Arc::new(Mutex::new(())),
            state: Mutex::new(state),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Held for the duration of a campaign run.
    pub fn campaign_lock(&self) -> &Arc<Mutex<()>> {
        &self.campaign_lock
    }

    /// Scan once at startup, then tick until cancelled. Spawned work gets
    /// the grace period to finish before it is aborted.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            tick_secs = self.settings.tick.as_secs(),
            scheduled_runs = self.settings.campaigns.len(),
            "orchestrator started"
        );
        if self.settings.scan_enabled && !cancel.is_cancelled() {
            self.startup_scan(&cancel).await;
        }

        while !cancel.is_cancelled() {
            match self.tick(&cancel).await {
                Ok(fired) if !fired.is_empty() => debug!(?fired, "triggers fired"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "orchestrator tick failed"),
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.tick) => {}
            }
        }

        let stragglers = drain(&mut *self.tasks.lock().await, self.settings.grace_period).await;
        info!(stragglers, "orchestrator stopped");
    }

    async fn startup_scan(&self, cancel: &CancellationToken) {
        let now = self.clock.now();
        let timeout = self.settings.startup_scan_timeout;
        tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio::time::timeout(timeout, self.scanner.scan_all()) => match result {
                Ok(report) => info!(replies = report.replies(), bounces = report.bounces(), "startup scan complete"),
                Err(_) => warn!(timeout_secs = timeout.as_secs(), "startup scan timed out"),
            },
        }
        self.state.lock().await.scan.mark(now);
    }

    /// Evaluate every trigger once and spawn whatever is due.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<Vec<Trigger>, OutboundError> {
        self.reap().await;

        let now = self.clock.now();
        let local_now = self.local.to_local(now);
        let today = local_now.date();
        let mut fired = Vec::new();
        let mut state = self.state.lock().await;

        if self.settings.scan_enabled && state.scan.due(now) {
            state.scan.mark(now);
            self.spawn_scan(cancel).await;
            fired.push(Trigger::Scan);
        }

        if state.reputation.due(local_now) {
            if scheduler::try_record_run(&self.db, &state.reputation.run_key(today), now).await? {
                self.spawn_reputation(cancel).await;
                fired.push(Trigger::Reputation);
            }
            state.reputation.mark(today);
        }

        for schedule in &self.settings.campaigns {
            if !schedule.due(local_now) {
                continue;
            }
            let run_key = schedule.run_key(today);
            if state.campaign_runs.contains(today, &run_key) {
                continue;
            }
            if scheduler::try_record_run(&self.db, &run_key, now).await? {
                info!(campaign = %schedule.campaign, %run_key, "scheduled campaign run");
                self.spawn_campaign(&schedule.campaign, cancel).await;
                fired.push(Trigger::Campaign {
                    campaign: schedule.campaign.clone(),
                    run_key: run_key.clone(),
                });
            }
            state.campaign_runs.insert(today, run_key);
        }

        if state.summary.due(local_now) {
            if scheduler::try_record_run(&self.db, &state.summary.run_key(today), now).await? {
                self.spawn_summary(cancel).await;
                fired.push(Trigger::Summary);
            }
            state.summary.mark(today);
        }

        if state.heartbeat.due(now) {
            let ready = drafts::count_with_status(&self.db, DraftStatus::Ready).await?;
            scheduler::beat(&self.db, HEARTBEAT_COMPONENT, Some(&format!("ready={ready}")), now)
                .await?;
            state.heartbeat.mark(now);
            debug!(ready, "heartbeat");
            fired.push(Trigger::Heartbeat);
        }

        Ok(fired)
    }

    /// One producer pass for `campaign`, unless another run holds the
    /// campaign lock, in which case `None` is returned.
    pub async fn run_campaign(
        &self,
        campaign: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ProducerStats>, OutboundError> {
        locked_campaign_run(&self.producer, &self.campaign_lock, campaign, cancel).await
    }

    /// Wait for every spawned task to finish.
    pub async fn wait_idle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            log_join(result);
        }
    }

    async fn reap(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            log_join(result);
        }
    }

    async fn spawn_scan(&self, cancel: &CancellationToken) {
        let scanner = self.scanner.clone();
        let lock = self.scan_lock.clone();
        let cancel = cancel.child_token();
        self.tasks.lock().await.spawn(async move {
            let Ok(_guard) = lock.try_lock_owned() else {
                warn!("previous mailbox scan still running, skipped");
                return;
            };
            tokio::select! {
                _ = cancel.cancelled() => {}
                report = scanner.scan_all() => {
                    debug!(replies = report.replies(), bounces = report.bounces(), "periodic scan done");
                }
            }
        });
    }

    async fn spawn_reputation(&self, cancel: &CancellationToken) {
        let pool = self.pool.clone();
        let db = self.db.clone();
        let cutoff = self.clock.now() - chrono::Duration::days(i64::from(self.settings.retention_days));
        let cancel = cancel.child_token();
        self.tasks.lock().await.spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            match pool.refresh_reputation().await {
                Ok(snapshots) => info!(identities = snapshots.len(), "daily reputation refresh done"),
                Err(e) => error!(error = %e, "reputation refresh failed"),
            }
            match processed::purge_older_than(&db, cutoff).await {
                Ok(purged) => debug!(purged, "old processed message ids purged"),
                Err(e) => warn!(error = %e, "processed id purge failed"),
            }
        });
    }

    async fn spawn_campaign(&self, campaign: &str, cancel: &CancellationToken) {
        let producer = self.producer.clone();
        let lock = self.campaign_lock.clone();
        let campaign = campaign.to_string();
        let cancel = cancel.child_token();
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = locked_campaign_run(&producer, &lock, &campaign, &cancel).await {
                error!(%campaign, error = %e, "scheduled campaign run failed");
            }
        });
    }

    async fn spawn_summary(&self, cancel: &CancellationToken) {
        let db = self.db.clone();
        let local = self.local;
        let now = self.clock.now();
        let alerter = self.alerter.clone();
        let cancel = cancel.child_token();
        self.tasks.lock().await.spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            match DailySummary::collect(&db, &local, now).await {
                Ok(summary) => {
                    info!(sent = summary.totals.sent, replies = summary.totals.replied, "daily summary");
                    alerter.notify(&summary.render(), AlertSeverity::Info).await;
                }
                Err(e) => error!(error = %e, "daily summary failed"),
            }
        });
    }
}

async fn locked_campaign_run(
    producer: &DraftProducer,
    lock: &Mutex<()>,
    campaign: &str,
    cancel: &CancellationToken,
) -> Result<Option<ProducerStats>, OutboundError> {
    let Ok(_guard) = lock.try_lock() else {
        warn!(%campaign, "another campaign run is in progress, skipped");
        return Ok(None);
    };
    let stats = producer.run_campaign(campaign, cancel).await?;
    info!(
        %campaign,
        created = stats.created,
        ready = stats.ready,
        followups = stats.followups,
        "campaign run complete"
    );
    Ok(Some(stats))
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "orchestrator task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let mut config = OutboundConfig::default();
        config.scheduler.campaigns.push(outbound_config::model::CampaignScheduleConfig {
            campaign: "spring".into(),
            days: vec!["mon".into()],
            time: "09:00".into(),
        });
        let settings = OrchestratorSettings::from_config(&config).unwrap();
        assert_eq!(settings.tick, Duration::from_secs(60));
        assert_eq!(settings.scan_interval, chrono::Duration::minutes(30));
        assert_eq!(settings.startup_scan_timeout, Duration::from_secs(60));
        assert_eq!(settings.heartbeat, chrono::Duration::minutes(5));
        assert_eq!(settings.reputation_at, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(settings.summary_at, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(settings.grace_period, Duration::from_secs(15));
        assert_eq!(settings.campaigns.len(), 1);
    }

    #[test]
    fn invalid_summary_time_is_rejected() {
        let mut config = OutboundConfig::default();
        config.scheduler.summary_time = "25:99".into();
        assert!(matches!(
            OrchestratorSettings::from_config(&config),
            Err(OutboundError::Config(_))
        ));
    }
}
