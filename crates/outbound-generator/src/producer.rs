// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background draft producer.
//!
//! Each cycle walks the active campaigns. Due follow-ups are planned first,
//! then the `ready` queue is topped up with first-contact drafts from the
//! lead source. Every created draft goes through the bounded review loop and
//! ends in `ready` or `review_failed`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use outbound_config::model::{CampaignConfig, GeneratorConfig};
use outbound_core::OutboundError;
use outbound_core::traits::{ContentGenerator, LeadSource};
use outbound_core::types::{
    Campaign, CampaignContext, CampaignStatus, CreateOutcome, DraftContent, DraftStatus,
    MessageKind, NewDraft, Recipient, SendRecord, ThreadRefs,
};
use outbound_storage::queries::{campaigns, drafts, recipients, send_records, suppression};
use outbound_storage::{Database, NewCampaign};
use outbound_timing::Clock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::review::{ReviewOutcome, review_loop};

/// A draft still `generating` after this long belongs to a dead producer.
const STALE_GENERATION: chrono::Duration = chrono::Duration::minutes(30);

/// Producer tunables, resolved from [`GeneratorConfig`].
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub enabled: bool,
    pub review_threshold: u32,
    pub max_rewrites_initial: u32,
    pub max_rewrites_followup: u32,
    pub target_ready: u32,
    pub batch_size: u32,
    pub followup_1_days: u32,
    pub followup_2_days: u32,
    pub max_followups: u32,
    pub productive_sleep: Duration,
    pub idle_sleep: Duration,
    pub sender_name: String,
    pub company: String,
}

impl ProducerSettings {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            enabled: config.enabled,
            review_threshold: config.review_threshold,
            max_rewrites_initial: config.max_rewrites_initial,
            max_rewrites_followup: config.max_rewrites_followup,
            target_ready: config.target_ready,
            batch_size: config.batch_size,
            followup_1_days: config.followup_1_days,
            followup_2_days: config.followup_2_days,
            max_followups: config.max_followups,
            productive_sleep: Duration::from_secs(config.productive_sleep_secs),
            idle_sleep: Duration::from_secs(config.idle_sleep_secs),
            sender_name: config.sender_name.clone(),
            company: config.company.clone(),
        }
    }
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self::from_config(&GeneratorConfig::default())
    }
}

/// Counters for one producer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Drafts inserted (initial and follow-up).
    pub created: u32,
    pub ready: u32,
    pub review_failed: u32,
    /// Candidates dropped before a draft was created.
    pub skipped: u32,
    pub duplicates: u32,
    pub suppressed: u32,
    /// Follow-up drafts among `created`.
    pub followups: u32,
    /// Campaigns whose pass failed.
    pub errors: u32,
}

impl ProducerStats {
    fn absorb(&mut self, other: ProducerStats) {
        self.created += other.created;
        self.ready += other.ready;
        self.review_failed += other.review_failed;
        self.skipped += other.skipped;
        self.duplicates += other.duplicates;
        self.suppressed += other.suppressed;
        self.followups += other.followups;
        self.errors += other.errors;
    }
}

/// Insert or update the configured campaigns. Inactive ones are stored as
/// `paused`.
pub async fn sync_campaigns(
    db: &Database,
    configs: &[CampaignConfig],
    now: DateTime<Utc>,
) -> Result<(), OutboundError> {
    for config in configs {
        let campaign = NewCampaign {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            target: config.target.clone(),
            max_recipients: config.max_recipients,
            status: if config.active {
                CampaignStatus::Active
            } else {
                CampaignStatus::Paused
            },
        };
        campaigns::upsert(db, &campaign, now).await?;
    }
    debug!(count = configs.len(), "campaigns synced");
    Ok(())
}

fn empty_content() -> DraftContent {
    DraftContent {
        subject: String::new(),
        body: String::new(),
        body_html: None,
    }
}

/// Threading headers for a same-thread reply to `record`.
fn reply_thread(record: &SendRecord) -> Option<ThreadRefs> {
    let message_id = record.message_id.as_deref()?;
    let references = match record.references.as_deref() {
        Some(chain) if !chain.trim().is_empty() => format!("{} {message_id}", chain.trim()),
        _ => message_id.to_string(),
    };
    Some(ThreadRefs {
        in_reply_to: message_id.to_string(),
        references,
    })
}

/// Keeps the `ready` queue stocked.
pub struct DraftProducer {
    db: Database,
    clock: Arc<dyn Clock>,
    leads: Arc<dyn LeadSource>,
    generator: Arc<dyn ContentGenerator>,
    settings: ProducerSettings,
}

impl DraftProducer {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        leads: Arc<dyn LeadSource>,
        generator: Arc<dyn ContentGenerator>,
        settings: ProducerSettings,
    ) -> Self {
        Self {
            db,
            clock,
            leads,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &ProducerSettings {
        &self.settings
    }

    /// Skip drafts stranded in `generating` by an earlier process. Their
    /// leads become eligible for a fresh draft.
    pub async fn recover_interrupted(&self) -> Result<usize, OutboundError> {
        let moved =
            drafts::cleanup_stale_generating(&self.db, STALE_GENERATION, self.clock.now()).await?;
        if moved > 0 {
            warn!(moved, "interrupted generations skipped");
        }
        Ok(moved)
    }

    /// Produce until cancelled, sleeping `productive_sleep` after a cycle
    /// that created drafts and `idle_sleep` otherwise.
    pub async fn run(&self, cancel: CancellationToken) {
        if let Err(e) = self.recover_interrupted().await {
            error!(error = %e, "cannot sweep interrupted generations");
        }
        if !self.settings.enabled {
            info!("draft producer disabled");
            return;
        }
        info!(
            target_ready = self.settings.target_ready,
            batch_size = self.settings.batch_size,
            "draft producer started"
        );
        while !cancel.is_cancelled() {
            let stats = self.run_cycle(&cancel).await;
            let sleep = if stats.created > 0 {
                self.settings.productive_sleep
            } else {
                self.settings.idle_sleep
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep) => {}
            }
        }
        info!("draft producer stopped");
    }

    /// One pass over every active campaign. A failing campaign is logged and
    /// counted; the others still run.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> ProducerStats {
        let mut stats = ProducerStats::default();
        let active = match campaigns::list(&self.db, Some(CampaignStatus::Active)).await {
            Ok(active) => active,
            Err(e) => {
                error!(error = %e, "cannot list campaigns");
                stats.errors += 1;
                return stats;
            }
        };

        for campaign in &active {
            if cancel.is_cancelled() {
                break;
            }
            match self.produce_for(campaign, cancel).await {
                Ok(campaign_stats) => stats.absorb(campaign_stats),
                Err(e) => {
                    error!(campaign = %campaign.id, error = %e, "campaign pass failed");
                    stats.errors += 1;
                }
            }
        }

        if stats.created > 0 || stats.errors > 0 {
            info!(
                created = stats.created,
                ready = stats.ready,
                review_failed = stats.review_failed,
                followups = stats.followups,
                errors = stats.errors,
                "producer cycle complete"
            );
        }
        stats
    }

    /// One pass for a single campaign, as fired by a scheduled run.
    ///
    /// An unknown campaign is a configuration error. A campaign that is not
    /// active is skipped with a warning.
    pub async fn run_campaign(
        &self,
        campaign_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ProducerStats, OutboundError> {
        let campaign = campaigns::get(&self.db, campaign_id)
            .await?
            .ok_or_else(|| OutboundError::Config(format!("unknown campaign '{campaign_id}'")))?;
        if campaign.status != CampaignStatus::Active {
            warn!(campaign = %campaign.id, status = %campaign.status, "campaign not active, run skipped");
            return Ok(ProducerStats::default());
        }
        self.produce_for(&campaign, cancel).await
    }

    fn context(&self, campaign: &Campaign) -> CampaignContext {
        CampaignContext {
            campaign_id: campaign.id.clone(),
            name: campaign.name.clone(),
            description: campaign.description.clone(),
            sender_name: self.settings.sender_name.clone(),
            company: self.settings.company.clone(),
        }
    }

    async fn produce_for(
        &self,
        campaign: &Campaign,
        cancel: &CancellationToken,
    ) -> Result<ProducerStats, OutboundError> {
        let ctx = self.context(campaign);
        let mut stats = ProducerStats::default();

        for sequence in 1..=self.settings.max_followups.min(2) {
            if cancel.is_cancelled() {
                return Ok(stats);
            }
            self.plan_followups(campaign, &ctx, sequence, cancel, &mut stats)
                .await?;
        }
        if !cancel.is_cancelled() {
            self.top_up(campaign, &ctx, cancel, &mut stats).await?;
        }
        Ok(stats)
    }

    async fn plan_followups(
        &self,
        campaign: &Campaign,
        ctx: &CampaignContext,
        sequence: u32,
        cancel: &CancellationToken,
        stats: &mut ProducerStats,
    ) -> Result<(), OutboundError> {
        let (previous, gap_days, kind) = match sequence {
            1 => (0, self.settings.followup_1_days, MessageKind::Followup),
            _ => (
                1,
                self.settings
                    .followup_2_days
                    .saturating_sub(self.settings.followup_1_days),
                MessageKind::FollowupNewThread,
            ),
        };
        let now = self.clock.now();
        let sent_before = now - chrono::Duration::days(i64::from(gap_days));
        let due = send_records::followup_due(
            &self.db,
            &campaign.id,
            previous,
            sent_before,
            self.settings.batch_size as usize,
        )
        .await?;
        if !due.is_empty() {
            debug!(campaign = %campaign.id, sequence, due = due.len(), "follow-ups due");
        }

        for record in due {
            if cancel.is_cancelled() {
                break;
            }
            let recipient = recipients::get(&self.db, &record.recipient_email)
                .await?
                .unwrap_or_else(|| Recipient::new(record.recipient_email.clone()));
            let new = NewDraft {
                campaign_id: campaign.id.clone(),
                recipient_email: recipient.email.clone(),
                recipient_name: recipient.name.clone(),
                kind,
                followup_number: sequence,
                preferred_identity: Some(record.identity.clone()),
                thread: if kind == MessageKind::Followup {
                    reply_thread(&record)
                } else {
                    None
                },
                scheduled_at: None,
            };
            let Some(id) = self.create(new, stats).await? else {
                continue;
            };
            stats.followups += 1;

            let prior = send_records::prior_sends(&self.db, &recipient.email, &campaign.id).await?;
            let generated = self
                .generator
                .generate_followup(&recipient, ctx, &prior, sequence)
                .await;
            self.finish(&id, generated, &recipient, ctx, self.settings.max_rewrites_followup, stats)
                .await?;
        }
        Ok(())
    }

    async fn top_up(
        &self,
        campaign: &Campaign,
        ctx: &CampaignContext,
        cancel: &CancellationToken,
        stats: &mut ProducerStats,
    ) -> Result<(), OutboundError> {
        let ready = drafts::count_with_status(&self.db, DraftStatus::Ready).await?;
        let target = u64::from(self.settings.target_ready);
        if ready >= target {
            debug!(campaign = %campaign.id, ready, target, "ready queue full");
            return Ok(());
        }
        let drafted = drafts::count_for_campaign(&self.db, &campaign.id, MessageKind::Initial).await?;
        let remaining = u64::from(campaign.max_recipients).saturating_sub(drafted);
        let capacity = u64::from(self.settings.batch_size)
            .min(target - ready)
            .min(remaining);
        if capacity == 0 {
            debug!(campaign = %campaign.id, drafted, "campaign recipient budget used up");
            return Ok(());
        }

        let mut exclude = send_records::contacted_addresses(&self.db).await?;
        exclude.extend(suppression::all_addresses(&self.db).await?);
        let candidates = self
            .leads
            .fetch_candidates(&campaign.target, capacity as usize, &exclude)
            .await?;
        debug!(campaign = %campaign.id, candidates = candidates.len(), capacity, "leads fetched");

        for mut recipient in candidates {
            if cancel.is_cancelled() {
                break;
            }
            recipient.email = recipient.email.trim().to_ascii_lowercase();
            if exclude.contains(&recipient.email)
                || recipients::is_invalid(&self.db, &recipient.email).await?
            {
                stats.skipped += 1;
                continue;
            }
            if suppression::is_suppressed(&self.db, &recipient.email).await? {
                stats.suppressed += 1;
                continue;
            }
            if drafts::exists_for_recipient(&self.db, &recipient.email, &campaign.id).await? {
                stats.duplicates += 1;
                continue;
            }

            recipients::upsert(&self.db, &recipient, self.clock.now()).await?;
            let Some(id) = self
                .create(NewDraft::initial(&campaign.id, &recipient), stats)
                .await?
            else {
                continue;
            };
            let generated = self.generator.generate_initial(&recipient, ctx).await;
            self.finish(&id, generated, &recipient, ctx, self.settings.max_rewrites_initial, stats)
                .await?;
        }
        Ok(())
    }

    async fn create(
        &self,
        new: NewDraft,
        stats: &mut ProducerStats,
    ) -> Result<Option<String>, OutboundError> {
        let email = new.recipient_email.clone();
        match drafts::create(&self.db, new, self.clock.now()).await? {
            CreateOutcome::Created(id) => {
                stats.created += 1;
                Ok(Some(id))
            }
            CreateOutcome::Duplicate(existing) => {
                debug!(recipient = %email, existing = %existing, "draft already exists");
                stats.duplicates += 1;
                Ok(None)
            }
            CreateOutcome::Suppressed => {
                debug!(recipient = %email, "recipient suppressed, no draft");
                stats.suppressed += 1;
                Ok(None)
            }
        }
    }

    /// Review generated content and move the draft out of `generating`.
    async fn finish(
        &self,
        id: &str,
        generated: Result<Option<DraftContent>, OutboundError>,
        recipient: &Recipient,
        ctx: &CampaignContext,
        max_rewrites: u32,
        stats: &mut ProducerStats,
    ) -> Result<(), OutboundError> {
        let content = match generated {
            Ok(Some(content)) => content,
            Ok(None) => {
                stats.review_failed += 1;
                return drafts::mark_review_failed(
                    &self.db,
                    id,
                    &empty_content(),
                    0,
                    "generation returned no content",
                )
                .await;
            }
            Err(e) => {
                warn!(draft_id = %id, recipient = %recipient.email, error = %e, "generation failed");
                stats.review_failed += 1;
                return drafts::mark_review_failed(
                    &self.db,
                    id,
                    &empty_content(),
                    0,
                    &format!("generation failed: {e}"),
                )
                .await;
            }
        };

        let outcome = review_loop(
            self.generator.as_ref(),
            content.clone(),
            recipient,
            ctx,
            self.settings.review_threshold,
            max_rewrites,
        )
        .await;
        match outcome {
            Ok(ReviewOutcome::Accepted { content, score }) => {
                drafts::mark_ready(&self.db, id, &content, score).await?;
                stats.ready += 1;
                debug!(draft_id = %id, recipient = %recipient.email, score, "draft ready");
            }
            Ok(ReviewOutcome::Rejected {
                content,
                best_score,
                reason,
            }) => {
                drafts::mark_review_failed(&self.db, id, &content, best_score, &reason).await?;
                stats.review_failed += 1;
                info!(draft_id = %id, recipient = %recipient.email, best_score, "draft failed review");
            }
            Err(e) => {
                warn!(draft_id = %id, error = %e, "review failed");
                drafts::mark_review_failed(&self.db, id, &content, 0, &format!("review failed: {e}"))
                    .await?;
                stats.review_failed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message_id: Option<&str>, references: Option<&str>) -> SendRecord {
        SendRecord {
            id: "r1".into(),
            draft_id: "d1".into(),
            campaign_id: "c1".into(),
            recipient_email: "a@b.com".into(),
            recipient_domain: "b.com".into(),
            identity: "sam@acme.com".into(),
            kind: MessageKind::Initial,
            followup_number: 0,
            subject: "idea".into(),
            message_id: message_id.map(str::to_string),
            in_reply_to: None,
            references: references.map(str::to_string),
            status: outbound_core::types::SendStatus::Sent,
            bounce_kind: None,
            error: None,
            sent_at: Utc::now(),
            replied_at: None,
            bounced_at: None,
        }
    }

    #[test]
    fn reply_thread_extends_the_reference_chain() {
        assert_eq!(reply_thread(&record(None, None)), None);
        assert_eq!(
            reply_thread(&record(Some("<2@x>"), None)),
            Some(ThreadRefs {
                in_reply_to: "<2@x>".into(),
                references: "<2@x>".into(),
            })
        );
        assert_eq!(
            reply_thread(&record(Some("<2@x>"), Some("<1@x>"))).map(|t| t.references),
            Some("<1@x> <2@x>".to_string())
        );
    }

    #[test]
    fn settings_follow_config() {
        let mut config = GeneratorConfig::default();
        config.productive_sleep_secs = 7;
        config.batch_size = 3;
        let settings = ProducerSettings::from_config(&config);
        assert_eq!(settings.productive_sleep, Duration::from_secs(7));
        assert_eq!(settings.batch_size, 3);
        assert_eq!(settings.review_threshold, 70);
    }

    #[test]
    fn stats_absorb_adds_every_counter() {
        let mut total = ProducerStats {
            created: 1,
            errors: 1,
            ..Default::default()
        };
        total.absorb(ProducerStats {
            created: 2,
            ready: 2,
            followups: 1,
            ..Default::default()
        });
        assert_eq!(total.created, 3);
        assert_eq!(total.ready, 2);
        assert_eq!(total.followups, 1);
        assert_eq!(total.errors, 1);
    }
}
