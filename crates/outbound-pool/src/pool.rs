// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The account pool: sole arbiter of which identity may send right now.
//!
//! Exclusivity is an in-process `tokio::sync::Mutex` per identity, handed out
//! as an owned guard inside [`IdentityLease`]. Quota, blocks and reputation are
//! derived from storage; only the cooldown timestamp and the cached
//! reputation live in memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use dashmap::DashMap;
use outbound_config::model::OutboundConfig;
use outbound_core::types::{AlertSeverity, SendingIdentity};
use outbound_core::{Alerter, OutboundError};
use outbound_storage::Database;
use outbound_storage::models::{IdentityBlock, ReputationSnapshot};
use outbound_storage::queries::{identities, send_records};
use outbound_timing::{Clock, HUMAN_COOLDOWN_FLOOR, LocalClock, human_cooldown};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::domains::{DomainSlot, DomainTracker};
use crate::quota::{BlockState, QuotaPolicy};
use crate::reputation::{self, Reputation};

/// Tunables for the pool, taken from `[sending]`, `[warmup]` and `[reputation]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    pub min_delay_mins: u32,
    pub max_delay_mins: u32,
    pub jitter_pct: f64,
    pub block_hours: u32,
    pub pause_threshold: u32,
    pub warning_threshold: u32,
    pub window_days: u32,
    pub alert_bounce_rate: f64,
    pub quota: QuotaPolicy,
}

impl PoolSettings {
    pub fn from_config(config: &OutboundConfig) -> Self {
        Self {
            min_delay_mins: config.sending.min_delay_mins,
            max_delay_mins: config.sending.max_delay_mins,
            jitter_pct: config.sending.jitter_pct,
            block_hours: config.sending.block_hours,
            pause_threshold: config.reputation.pause_threshold,
            warning_threshold: config.reputation.warning_threshold,
            window_days: config.reputation.window_days,
            alert_bounce_rate: config.reputation.alert_bounce_rate,
            quota: QuotaPolicy::from(&config.warmup),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&OutboundConfig::default())
    }
}

/// What a caller with nothing to do should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitHint {
    /// Some identity is eligible now.
    Ready,
    /// The soonest identity frees up after this long.
    Wait(Duration),
    /// Nothing frees up before the end of the local day.
    Exhausted,
}

/// Why an identity can or cannot send right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible { remaining: u32 },
    Blocked { until: DateTime<Utc> },
    Paused { score: u32 },
    QuotaReached { quota: u32 },
    CoolingDown { until: DateTime<Utc> },
}

/// Point-in-time view of one identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityStatus {
    pub address: String,
    pub sent_today: u32,
    pub quota: u32,
    pub remaining: u32,
    pub score: u32,
    pub bounce_rate: f64,
    pub in_flight: bool,
    pub next_eligible: Option<DateTime<Utc>>,
    pub eligibility: Eligibility,
}

/// Exclusive right to send from one identity, plus the recipient-domain slot
/// reserved for the send. Dropping it releases the lock; a slot that was
/// never committed by [`AccountPool::record_send`] is handed back.
pub struct IdentityLease {
    identity: SendingIdentity,
    slot: Option<DomainSlot>,
    tracker: DomainTracker,
    _guard: OwnedMutexGuard<()>,
}

impl IdentityLease {
    pub fn identity(&self) -> &SendingIdentity {
        &self.identity
    }

    pub fn address(&self) -> &str {
        &self.identity.address
    }

    /// Whether the domain slot is still pending a send.
    pub fn holds_domain_slot(&self) -> bool {
        self.slot.is_some()
    }
}

impl std::fmt::Debug for IdentityLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityLease")
            .field("identity", &self.identity.address)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl Drop for IdentityLease {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        let identity = self.identity.address.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let tracker = self.tracker.clone();
                handle.spawn(async move {
                    if let Err(e) = tracker.unreserve(slot).await {
                        warn!(%identity, error = %e, "failed to return domain slot");
                    }
                });
            }
            Err(_) => {
                warn!(%identity, domain = %slot.domain(), "lease dropped outside a runtime, domain slot kept");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IdentityState {
    first_seen: Option<DateTime<Utc>>,
    next_eligible: Option<DateTime<Utc>>,
    reputation: Option<Reputation>,
}

enum LeaseAttempt {
    Leased(IdentityLease),
    Busy,
    Ineligible,
    DomainFull,
}

struct Evaluation {
    index: usize,
    sent_today: u32,
    quota: u32,
    state: IdentityState,
    eligibility: Eligibility,
}

/// Allocates sending identities under quota, cooldown, block, reputation
/// and recipient-domain constraints.
pub struct AccountPool {
    db: Database,
    clock: Arc<dyn Clock>,
    local: LocalClock,
    tracker: DomainTracker,
    alerter: Arc<dyn Alerter>,
    settings: PoolSettings,
    identities: Vec<SendingIdentity>,
    locks: HashMap<String, Arc<Mutex<()>>>,
    state: DashMap<String, IdentityState>,
}

impl AccountPool {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        local: LocalClock,
        tracker: DomainTracker,
        alerter: Arc<dyn Alerter>,
        settings: PoolSettings,
        identities: Vec<SendingIdentity>,
    ) -> Self {
        let mut identities: Vec<SendingIdentity> = identities
            .into_iter()
            .map(|mut identity| {
                identity.address = identity.address.trim().to_ascii_lowercase();
                identity
            })
            .collect();
        identities.sort_by(|a, b| a.address.cmp(&b.address));
        identities.dedup_by(|a, b| a.address == b.address);

        let locks = identities
            .iter()
            .map(|i| (i.address.clone(), Arc::new(Mutex::new(()))))
            .collect();

        Self {
            db,
            clock,
            local,
            tracker,
            alerter,
            settings,
            identities,
            locks,
            state: DashMap::new(),
        }
    }

    /// Configured identities, ordered by address.
    pub fn identities(&self) -> &[SendingIdentity] {
        &self.identities
    }

    pub fn identity(&self, address: &str) -> Option<&SendingIdentity> {
        let address = address.trim().to_ascii_lowercase();
        self.identities.iter().find(|i| i.address == address)
    }

    pub fn tracker(&self) -> &DomainTracker {
        &self.tracker
    }

    /// Register identities in storage and load their persisted state:
    /// first-seen date, latest reputation and the cooldown implied by the
    /// last delivery.
    pub async fn sync_identities(&self) -> Result<(), OutboundError> {
        let now = self.clock.now();
        for identity in &self.identities {
            let first_seen =
                identities::sync_identity(&self.db, &identity.address, &identity.display_name, now)
                    .await?;
            let reputation = identities::latest_snapshot(&self.db, &identity.address)
                .await?
                .map(|s| Reputation {
                    score: s.score,
                    sends: s.sends,
                    bounce_rate: s.bounce_rate,
                    reply_rate: s.reply_rate,
                    fail_rate: s.fail_rate,
                    blocks: s.blocks,
                });
            let next_eligible = send_records::last_delivered_at(&self.db, &identity.address)
                .await?
                .map(|last| last + to_chrono(HUMAN_COOLDOWN_FLOOR))
                .filter(|next| *next > now);

            self.state.insert(
                identity.address.clone(),
                IdentityState {
                    first_seen: Some(first_seen),
                    next_eligible,
                    reputation,
                },
            );
        }
        info!(count = self.identities.len(), "identities synced");
        Ok(())
    }

    fn snapshot_state(&self, address: &str) -> IdentityState {
        self.state.get(address).map(|s| *s).unwrap_or_default()
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local.local_date(now)
    }

    async fn latest_blocks(
        &self,
    ) -> Result<Vec<Option<IdentityBlock>>, OutboundError> {
        let mut blocks = Vec::with_capacity(self.identities.len());
        for identity in &self.identities {
            blocks.push(identities::latest_block(&self.db, &identity.address).await?);
        }
        Ok(blocks)
    }

    async fn evaluate_all(&self, now: DateTime<Utc>) -> Result<Vec<Evaluation>, OutboundError> {
        let blocks = self.latest_blocks().await?;
        let active = blocks
            .iter()
            .filter(|b| b.as_ref().is_none_or(|b| b.blocked_until <= now))
            .count();
        let today = self.today(now);
        let day_start = self.local.day_start_utc(today);

        let mut evaluations = Vec::with_capacity(self.identities.len());
        for (index, (identity, block)) in self.identities.iter().zip(blocks).enumerate() {
            let state = self.snapshot_state(&identity.address);
            let sent_today =
                send_records::delivered_since(&self.db, &identity.address, day_start).await?;

            let (block_state, blocked_until) = match block {
                None => (BlockState::Clear, None),
                Some(b) if b.blocked_until > now => (BlockState::Active, Some(b.blocked_until)),
                Some(b) => (
                    BlockState::ExpiredDaysAgo((now - b.blocked_until).num_days()),
                    None,
                ),
            };

            let warmup_start = identity
                .warmup_start
                .or_else(|| state.first_seen.map(|t| self.today(t)))
                .unwrap_or(today);
            let age_days = (today - warmup_start).num_days();
            let quota = self.settings.quota.daily_quota(
                age_days,
                identity.daily_limit,
                block_state,
                active,
            );
            let score = state.reputation.map_or(100, |r| r.score);

            let eligibility = if let Some(until) = blocked_until {
                Eligibility::Blocked { until }
            } else if score < self.settings.pause_threshold {
                Eligibility::Paused { score }
            } else if sent_today >= quota {
                Eligibility::QuotaReached { quota }
            } else if let Some(until) = state.next_eligible.filter(|t| *t > now) {
                Eligibility::CoolingDown { until }
            } else {
                Eligibility::Eligible {
                    remaining: quota - sent_today,
                }
            };

            evaluations.push(Evaluation {
                index,
                sent_today,
                quota,
                state,
                eligibility,
            });
        }
        Ok(evaluations)
    }

    fn try_lock(&self, index: usize) -> Option<OwnedMutexGuard<()>> {
        let identity = &self.identities[index];
        self.locks.get(&identity.address)?.clone().try_lock_owned().ok()
    }

    /// Lock identity `index`, confirm it is still eligible, then reserve the
    /// recipient-domain slot. The evaluation that picked the candidate may be
    /// stale: another worker can finish a send between it and the lock.
    async fn lease(&self, index: usize, recipient: &str) -> Result<LeaseAttempt, OutboundError> {
        let Some(guard) = self.try_lock(index) else {
            return Ok(LeaseAttempt::Busy);
        };
        let identity = &self.identities[index];

        let current = self
            .evaluate_all(self.clock.now())
            .await?
            .into_iter()
            .find(|e| e.index == index)
            .map(|e| e.eligibility);
        if !matches!(current, Some(Eligibility::Eligible { .. })) {
            debug!(identity = %identity.address, eligibility = ?current, "identity no longer eligible");
            return Ok(LeaseAttempt::Ineligible);
        }

        let Some(slot) = self.tracker.reserve(recipient).await? else {
            return Ok(LeaseAttempt::DomainFull);
        };
        Ok(LeaseAttempt::Leased(IdentityLease {
            identity: identity.clone(),
            slot: Some(slot),
            tracker: self.tracker.clone(),
            _guard: guard,
        }))
    }

    /// Lease an identity for sending to `recipient`.
    ///
    /// `preferred` wins when it is eligible and free; otherwise the identity
    /// with the most remaining quota, ties broken by address. The lease also
    /// holds one of today's slots for the recipient's domain. `None` means
    /// the caller should back off.
    pub async fn acquire(
        &self,
        preferred: Option<&str>,
        recipient: &str,
    ) -> Result<Option<IdentityLease>, OutboundError> {
        if !self.tracker.can_send_to(recipient).await? {
            return Ok(None);
        }

        let now = self.clock.now();
        let mut eligible: Vec<(usize, u32)> = self
            .evaluate_all(now)
            .await?
            .into_iter()
            .filter_map(|e| match e.eligibility {
                Eligibility::Eligible { remaining } => Some((e.index, remaining)),
                _ => None,
            })
            .collect();

        if eligible.is_empty() {
            debug!(total = self.identities.len(), "no identity eligible");
            return Ok(None);
        }

        // Identities are stored by address, so a stable sort keeps ties ordered.
        eligible.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(preferred) = preferred.map(|p| p.trim().to_ascii_lowercase())
            && let Some(pos) = eligible
                .iter()
                .position(|(i, _)| self.identities[*i].address == preferred)
        {
            let first = eligible.remove(pos);
            eligible.insert(0, first);
        }

        for (index, remaining) in eligible {
            match self.lease(index, recipient).await? {
                LeaseAttempt::Leased(lease) => {
                    debug!(identity = %lease.address(), remaining, recipient, "identity acquired");
                    return Ok(Some(lease));
                }
                LeaseAttempt::DomainFull => return Ok(None),
                LeaseAttempt::Busy | LeaseAttempt::Ineligible => {}
            }
        }

        debug!("no eligible identity is free");
        Ok(None)
    }

    /// Give a lease back without recording a send. A reserved domain slot is
    /// returned to today's count.
    pub async fn release(&self, mut lease: IdentityLease) {
        if let Some(slot) = lease.slot.take()
            && let Err(e) = self.tracker.unreserve(slot).await
        {
            warn!(identity = %lease.address(), error = %e, "failed to return domain slot");
        }
        debug!(identity = %lease.address(), "identity released");
    }

    /// Account for a delivered message: keep the reserved domain slot and
    /// push the identity's next-eligible time out by a human-like cooldown.
    pub fn record_send(&self, lease: &mut IdentityLease, recipient: &str) -> Duration {
        lease.slot = None;

        let now = self.clock.now();
        let address = lease.address();
        let bounce_rate = self
            .snapshot_state(address)
            .reputation
            .map_or(0.0, |r| r.bounce_rate);
        let local_hour = self.local.to_local(now).hour();
        let cooldown = {
            let mut rng = rand::thread_rng();
            human_cooldown(
                self.settings.min_delay_mins,
                self.settings.max_delay_mins,
                bounce_rate,
                local_hour,
                self.settings.jitter_pct,
                &mut rng,
            )
        };

        let next = now + to_chrono(cooldown);
        self.state.entry(address.to_string()).or_default().next_eligible = Some(next);
        info!(
            identity = %address,
            recipient,
            cooldown_mins = cooldown.as_secs() / 60,
            "send recorded"
        );
        cooldown
    }

    /// Block `identity` for the configured number of hours. Raises a critical
    /// alert when this leaves every identity blocked.
    pub async fn mark_blocked(&self, identity: &str, reason: &str) -> Result<(), OutboundError> {
        let identity = identity.trim().to_ascii_lowercase();
        let now = self.clock.now();
        let until = now + chrono::Duration::hours(i64::from(self.settings.block_hours));
        identities::insert_block(&self.db, &identity, reason, now, until).await?;
        warn!(%identity, reason, blocked_until = %until, "identity blocked");

        let blocks = self.latest_blocks().await?;
        let all_blocked = !blocks.is_empty()
            && blocks
                .iter()
                .all(|b| b.as_ref().is_some_and(|b| b.blocked_until > now));
        if all_blocked {
            error!(count = blocks.len(), "all sending identities are blocked");
            self.alerter
                .notify(
                    &format!(
                        "All {} sending identities are blocked. Last block: {identity} ({reason}).",
                        blocks.len()
                    ),
                    AlertSeverity::Critical,
                )
                .await;
        }
        Ok(())
    }

    /// Rest an identity after a genuine reply. Never shortens an existing cooldown.
    pub fn pause_for_reply(&self, identity: &str, pause: Duration) {
        let identity = identity.trim().to_ascii_lowercase();
        let until = self.clock.now() + to_chrono(pause);
        let mut state = self.state.entry(identity.clone()).or_default();
        if state.next_eligible.is_none_or(|t| t < until) {
            state.next_eligible = Some(until);
        }
        info!(%identity, pause_mins = pause.as_secs() / 60, "identity paused after reply");
    }

    /// Whether anything can send now, soon, or not again today. Ignores
    /// in-flight locks.
    pub async fn wait_hint(&self) -> Result<WaitHint, OutboundError> {
        let now = self.clock.now();
        let today = self.today(now);
        let end_of_day = today
            .succ_opt()
            .map_or(now, |tomorrow| self.local.day_start_utc(tomorrow));

        let mut soonest: Option<DateTime<Utc>> = None;
        for evaluation in self.evaluate_all(now).await? {
            let until = match evaluation.eligibility {
                Eligibility::Eligible { .. } => return Ok(WaitHint::Ready),
                Eligibility::CoolingDown { until } | Eligibility::Blocked { until } => until,
                Eligibility::Paused { .. } | Eligibility::QuotaReached { .. } => continue,
            };
            if until < end_of_day {
                soonest = Some(soonest.map_or(until, |s| s.min(until)));
            }
        }

        Ok(match soonest {
            Some(at) => WaitHint::Wait((at - now).to_std().unwrap_or(Duration::ZERO)),
            None => WaitHint::Exhausted,
        })
    }

    /// Per-identity snapshot for stats and the daily summary.
    pub async fn status(&self) -> Result<Vec<IdentityStatus>, OutboundError> {
        let now = self.clock.now();
        let evaluations = self.evaluate_all(now).await?;
        Ok(evaluations
            .into_iter()
            .map(|e| {
                let identity = &self.identities[e.index];
                let reputation = e.state.reputation.unwrap_or_else(Reputation::pristine);
                let in_flight = self
                    .locks
                    .get(&identity.address)
                    .is_some_and(|lock| lock.try_lock().is_err());
                IdentityStatus {
                    address: identity.address.clone(),
                    sent_today: e.sent_today,
                    quota: e.quota,
                    remaining: e.quota.saturating_sub(e.sent_today),
                    score: reputation.score,
                    bounce_rate: reputation.bounce_rate,
                    in_flight,
                    next_eligible: e.state.next_eligible.filter(|t| *t > now),
                    eligibility: e.eligibility,
                }
            })
            .collect())
    }

    /// Recompute every identity's reputation over the rolling window,
    /// persist snapshots, and warn on newly crossed thresholds.
    pub async fn refresh_reputation(&self) -> Result<Vec<ReputationSnapshot>, OutboundError> {
        let now = self.clock.now();
        let since = now - chrono::Duration::days(i64::from(self.settings.window_days));
        let mut snapshots = Vec::with_capacity(self.identities.len());

        for identity in &self.identities {
            let address = identity.address.as_str();
            let stats = send_records::window_stats(&self.db, address, since).await?;
            let blocks = identities::blocks_since(&self.db, address, since).await?;
            let current = reputation::compute(&stats, blocks);
            let previous = self.snapshot_state(address).reputation;

            let snapshot = ReputationSnapshot {
                identity: address.to_string(),
                score: current.score,
                sends: current.sends,
                bounce_rate: current.bounce_rate,
                reply_rate: current.reply_rate,
                fail_rate: current.fail_rate,
                blocks: current.blocks,
                computed_at: now,
            };
            identities::insert_snapshot(&self.db, &snapshot).await?;
            info!(
                identity = %address,
                score = current.score,
                sends = current.sends,
                bounce_rate = current.bounce_rate,
                "reputation refreshed"
            );

            let alert_rate = self.settings.alert_bounce_rate;
            if current.bounce_rate > alert_rate
                && previous.is_none_or(|p| p.bounce_rate <= alert_rate)
            {
                self.alerter
                    .notify(
                        &format!(
                            "High bounce rate on {address}: {:.1}% over {} sends in the last {} days.",
                            current.bounce_rate * 100.0,
                            current.sends,
                            self.settings.window_days
                        ),
                        AlertSeverity::Critical,
                    )
                    .await;
            }

            let warning = self.settings.warning_threshold;
            if current.score < warning && previous.is_none_or(|p| p.score >= warning) {
                warn!(identity = %address, score = current.score, "low reputation");
                self.alerter
                    .notify(
                        &format!(
                            "Reputation of {address} fell to {} (warning below {warning}).",
                            current.score
                        ),
                        AlertSeverity::Warning,
                    )
                    .await;
            }
            if current.score < self.settings.pause_threshold {
                warn!(identity = %address, score = current.score, "identity paused for reputation");
            }

            self.state.entry(address.to_string()).or_default().reputation = Some(current);
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(365))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use outbound_core::PluginAdapter;
    use outbound_core::types::{AdapterType, HealthStatus};

    struct Fixed(DateTime<Utc>);

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct Silent;

    #[async_trait]
    impl PluginAdapter for Silent {
        fn name(&self) -> &str {
            "silent"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Alerter
        }
        async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), OutboundError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Alerter for Silent {
        async fn notify(&self, _message: &str, _severity: AlertSeverity) {}
    }

    async fn single_identity_pool(max_per_domain: u32) -> (AccountPool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("pool.db").to_str().unwrap())
            .await
            .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(Fixed(Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()));
        let local = LocalClock::default();
        let tracker = DomainTracker::new(db.clone(), clock.clone(), local, max_per_domain, 10);
        let identity = SendingIdentity {
            address: "a@send.test".into(),
            display_name: "Sender".into(),
            password: "pw".into(),
            daily_limit: None,
            warmup_start: NaiveDate::from_ymd_opt(2025, 1, 1),
        };
        let pool = AccountPool::new(
            db,
            clock,
            local,
            tracker,
            Arc::new(Silent),
            PoolSettings::default(),
            vec![identity],
        );
        pool.sync_identities().await.unwrap();
        (pool, dir)
    }

    #[tokio::test]
    async fn stale_candidate_is_rechecked_under_the_lock() {
        let (pool, _dir) = single_identity_pool(5).await;
        let picked = pool.evaluate_all(pool.clock.now()).await.unwrap();
        assert!(matches!(picked[0].eligibility, Eligibility::Eligible { .. }));

        // Another worker finishes a send after the evaluation above.
        let mut other = pool.acquire(None, "one@acme.com").await.unwrap().unwrap();
        pool.record_send(&mut other, "one@acme.com");
        drop(other);

        let attempt = pool.lease(0, "two@other.com").await.unwrap();
        assert!(matches!(attempt, LeaseAttempt::Ineligible));
        // No slot was taken for the recipient that was turned away.
        assert!(pool.tracker().saturated_domains().await.unwrap().is_empty());
        assert!(pool.tracker().can_send_to("two@other.com").await.unwrap());
    }

    #[tokio::test]
    async fn full_domain_releases_the_identity_lock() {
        let (pool, _dir) = single_identity_pool(1).await;
        assert!(pool.tracker().reserve("one@acme.com").await.unwrap().is_some());

        let attempt = pool.lease(0, "two@acme.com").await.unwrap();
        assert!(matches!(attempt, LeaseAttempt::DomainFull));
        assert!(pool.try_lock(0).is_some());
    }
}
