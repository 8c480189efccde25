// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox scanning across every sending identity.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use outbound_config::model::MailboxConfig;
use outbound_core::OutboundError;
use outbound_core::traits::InboundTransport;
use outbound_core::types::{
    BounceKind, CampaignCounter, Classification, InboundMessage, SendingIdentity,
    SuppressionReason,
};
use outbound_pool::AccountPool;
use outbound_storage::Database;
use outbound_storage::queries::{campaigns, drafts, processed, recipients, send_records, suppression};
use outbound_timing::{Clock, reply_pause};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::{
    bounce_candidates, bounce_for, bounce_kind, classify_reply, extract_address,
    is_bounce_notification,
};

#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    pub lookback_days: u32,
    pub scan_timeout: Duration,
}

impl ScanSettings {
    pub fn from_config(config: &MailboxConfig) -> Self {
        Self {
            lookback_days: config.lookback_days,
            scan_timeout: Duration::from_secs(config.scan_timeout_secs),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&MailboxConfig::default())
    }
}

/// What one identity's scan found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityScanReport {
    pub identity: String,
    /// Messages handled this scan (already-processed ones excluded).
    pub processed: u32,
    pub replies: u32,
    pub auto_replies: u32,
    pub unsubscribes: u32,
    pub bounces: u32,
    pub suppressions_added: u32,
    /// Set when the scan timed out or failed.
    pub error: Option<String>,
}

impl IdentityScanReport {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            ..Self::default()
        }
    }
}

/// Aggregate of a scan across all identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub identities: Vec<IdentityScanReport>,
}

impl ScanReport {
    pub fn replies(&self) -> u32 {
        self.identities.iter().map(|r| r.replies).sum()
    }

    pub fn bounces(&self) -> u32 {
        self.identities.iter().map(|r| r.bounces).sum()
    }

    pub fn suppressions_added(&self) -> u32 {
        self.identities.iter().map(|r| r.suppressions_added).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &IdentityScanReport> {
        self.identities.iter().filter(|r| r.error.is_some())
    }
}

/// Reads every identity's inbox and applies replies, opt-outs and bounces
/// to the send records, suppression list and draft queue.
pub struct MailboxScanner {
    db: Database,
    clock: Arc<dyn Clock>,
    pool: Arc<AccountPool>,
    inbox: Arc<dyn InboundTransport>,
    settings: ScanSettings,
}

impl MailboxScanner {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        pool: Arc<AccountPool>,
        inbox: Arc<dyn InboundTransport>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            db,
            clock,
            pool,
            inbox,
            settings,
        }
    }

    /// Scan every identity concurrently, each bounded by the scan timeout.
    pub async fn scan_all(&self) -> ScanReport {
        let scans = self.pool.identities().iter().map(|identity| async move {
            let mut report = IdentityScanReport::new(&identity.address);
            match tokio::time::timeout(self.settings.scan_timeout, self.scan_identity(identity, &mut report))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(identity = %identity.address, error = %e, "mailbox scan failed");
                    report.error = Some(e.to_string());
                }
                Err(_) => {
                    let e = OutboundError::Timeout {
                        duration: self.settings.scan_timeout,
                    };
                    warn!(identity = %identity.address, error = %e, "mailbox scan timed out");
                    report.error = Some(e.to_string());
                }
            }
            report
        });

        let report = ScanReport {
            identities: futures::future::join_all(scans).await,
        };
        info!(
            identities = report.identities.len(),
            replies = report.replies(),
            bounces = report.bounces(),
            suppressions = report.suppressions_added(),
            failed = report.failed().count(),
            "mailbox scan complete"
        );
        report
    }

    /// Scan one identity, accumulating into `report` as it goes so that a
    /// timeout still leaves partial counts.
    async fn scan_identity(
        &self,
        identity: &SendingIdentity,
        report: &mut IdentityScanReport,
    ) -> Result<(), OutboundError> {
        let messages = self
            .inbox
            .fetch_unseen_since(identity, self.settings.lookback_days)
            .await?;
        debug!(identity = %identity.address, fetched = messages.len(), "inbox fetched");

        let mut seen = Vec::new();
        for message in &messages {
            if processed::is_processed(&self.db, &identity.address, &message.message_id).await? {
                seen.push(message.message_id.clone());
                continue;
            }
            self.handle(identity, message, report).await?;
            processed::mark_processed(
                &self.db,
                &identity.address,
                &message.message_id,
                self.clock.now(),
            )
            .await?;
            report.processed += 1;
            seen.push(message.message_id.clone());
        }

        if !seen.is_empty() {
            self.inbox.mark_seen(identity, &seen).await?;
        }
        Ok(())
    }

    async fn handle(
        &self,
        identity: &SendingIdentity,
        message: &InboundMessage,
        report: &mut IdentityScanReport,
    ) -> Result<(), OutboundError> {
        let from = extract_address(&message.from);

        if !send_records::has_contacted(&self.db, &from).await? {
            return self.handle_bounce(message, report).await;
        }
        if suppression::is_suppressed(&self.db, &from).await? {
            debug!(from = %from, "message from suppressed address ignored");
            return Ok(());
        }

        let class = classify_reply(&message.subject, &message.body);
        match &class {
            Classification::PermanentAutoReply => {
                report.auto_replies += 1;
                self.suppress(&from, SuppressionReason::PermanentAutoReply, &message.subject, report)
                    .await?;
            }
            Classification::AutoReply => {
                report.auto_replies += 1;
                info!(from = %from, identity = %identity.address, "temporary auto-reply");
            }
            Classification::Unsubscribe => {
                report.unsubscribes += 1;
                self.suppress(&from, SuppressionReason::Unsubscribe, &message.subject, report)
                    .await?;
            }
            _ => {
                report.replies += 1;
                self.credit_reply(identity, &from).await?;
            }
        }
        Ok(())
    }

    async fn suppress(
        &self,
        email: &str,
        reason: SuppressionReason,
        subject: &str,
        report: &mut IdentityScanReport,
    ) -> Result<(), OutboundError> {
        let detail: String = subject.chars().take(100).collect();
        if suppression::add(&self.db, email, reason, Some(&detail), self.clock.now()).await? {
            report.suppressions_added += 1;
        }
        let skipped = drafts::skip_for_recipient(&self.db, email, &format!("recipient suppressed: {reason}")).await?;
        info!(email, %reason, skipped, "address suppressed");
        Ok(())
    }

    async fn credit_reply(&self, identity: &SendingIdentity, from: &str) -> Result<(), OutboundError> {
        let now = self.clock.now();
        let campaign_ids = send_records::mark_replied(&self.db, from, now).await?;

        let mut per_campaign: BTreeMap<String, u64> = BTreeMap::new();
        for id in &campaign_ids {
            *per_campaign.entry(id.clone()).or_default() += 1;
        }
        for (campaign_id, count) in per_campaign {
            campaigns::increment_counter(&self.db, &campaign_id, CampaignCounter::Replied, count, now)
                .await?;
        }

        let pause = {
            let mut rng = rand::thread_rng();
            reply_pause(&mut rng)
        };
        self.pool.pause_for_reply(&identity.address, pause);
        info!(
            from,
            identity = %identity.address,
            records = campaign_ids.len(),
            "reply detected"
        );
        Ok(())
    }

    /// Apply a delivery notification to the first known recipient it
    /// mentions. At most one bounce is counted per notification.
    async fn handle_bounce(
        &self,
        message: &InboundMessage,
        report: &mut IdentityScanReport,
    ) -> Result<(), OutboundError> {
        if !is_bounce_notification(&message.from, &message.subject) {
            return Ok(());
        }
        let kind = bounce_kind(&message.subject, &message.body);

        for address in bounce_candidates(&message.body) {
            let known = send_records::has_contacted(&self.db, &address).await?
                || recipients::get(&self.db, &address).await?.is_some();
            if !known {
                continue;
            }

            report.bounces += 1;
            let now = self.clock.now();
            let campaign_id = send_records::mark_bounced(&self.db, &address, kind, now).await?;
            if let Some(campaign_id) = &campaign_id {
                campaigns::increment_counter(&self.db, campaign_id, CampaignCounter::Bounced, 1, now)
                    .await?;
            }

            if kind == BounceKind::Hard {
                let detail: String = message.subject.chars().take(100).collect();
                if suppression::add(&self.db, &address, SuppressionReason::HardBounce, Some(&detail), now)
                    .await?
                {
                    report.suppressions_added += 1;
                }
                recipients::mark_invalid(&self.db, &address, "hard bounce", now).await?;
                drafts::skip_for_recipient(&self.db, &address, "recipient hard bounced").await?;
            }
            info!(classification = ?bounce_for(kind, address), "bounce detected");
            break;
        }
        Ok(())
    }
}
