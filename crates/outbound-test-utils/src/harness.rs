// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a temp SQLite database, a hand-driven clock, an
//! [`AccountPool`] and mock collaborators, and hands out producers, send
//! workers and mailbox scanners wired to them.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use outbound_config::OutboundConfig;
use outbound_config::model::{CampaignConfig, IdentityConfig};
use outbound_core::OutboundError;
use outbound_core::types::{
    CreateOutcome, DraftContent, MessageKind, NewDraft, Recipient, SendingIdentity, ThreadRefs,
};
use outbound_generator::{DraftProducer, ProducerSettings, sync_campaigns};
use outbound_mailbox::{MailboxScanner, ScanSettings};
use outbound_pool::{AccountPool, DomainTracker, PoolSettings};
use outbound_sender::{SendWorker, WorkerSettings};
use outbound_storage::Database;
use outbound_storage::queries::drafts;
use outbound_timing::LocalClock;

use crate::mock_generator::MockGenerator;
use crate::mock_leads::MockLeadSource;
use crate::mock_transport::{MockInbox, MockTransport};
use crate::recording::{ManualClock, RecordingAlerter};

/// Tuesday 2026-03-10, 15:00 UTC: 11:00 in New York, inside the default window.
pub fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Configuration tuned for tests: no warm-up, one session spanning the
/// whole window, no random skips.
pub fn test_config() -> OutboundConfig {
    let mut config = OutboundConfig::default();
    config.warmup.enabled = false;
    config.sending.session_count = 1;
    config.sending.skip_probability = 0.0;
    config.generator.sender_name = "Sam".into();
    config.generator.company = "Acme".into();
    config
}

pub fn identity_config(address: &str) -> IdentityConfig {
    IdentityConfig {
        address: address.to_string(),
        display_name: "Sam Carter".into(),
        password: "app-password".into(),
        daily_limit: None,
        warmup_start: None,
    }
}

pub fn campaign_config(id: &str) -> CampaignConfig {
    CampaignConfig {
        id: id.to_string(),
        name: format!("Campaign {id}"),
        description: "outbound email infrastructure".into(),
        target: String::new(),
        max_recipients: 100,
        active: true,
    }
}

/// A lead at `email` working for `company`.
pub fn lead(email: &str, company: &str) -> Recipient {
    let mut recipient = Recipient::new(email);
    recipient.name = email.split('@').next().map(str::to_string);
    recipient.company = Some(company.to_string());
    recipient
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: OutboundConfig,
    start: DateTime<Utc>,
    leads: Vec<Recipient>,
    generator: Option<MockGenerator>,
    transport: Option<MockTransport>,
    inbox: Option<MockInbox>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: test_config(),
            start: default_start(),
            leads: Vec::new(),
            generator: None,
            transport: None,
            inbox: None,
        }
    }

    /// Replace the whole configuration. Identities and campaigns added
    /// before this call are discarded.
    pub fn with_config(mut self, config: OutboundConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_identity(mut self, address: &str) -> Self {
        self.config.identities.push(identity_config(address));
        self
    }

    pub fn with_identities(mut self, addresses: &[&str]) -> Self {
        for address in addresses {
            self.config.identities.push(identity_config(address));
        }
        self
    }

    pub fn with_campaign(mut self, campaign: CampaignConfig) -> Self {
        self.config.campaigns.push(campaign);
        self
    }

    pub fn with_leads(mut self, leads: Vec<Recipient>) -> Self {
        self.leads = leads;
        self
    }

    pub fn with_generator(mut self, generator: MockGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_transport(mut self, transport: MockTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_inbox(mut self, inbox: MockInbox) -> Self {
        self.inbox = Some(inbox);
        self
    }

    /// Start the manual clock at `start` instead of [`default_start`].
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Tweak the configuration in place.
    pub fn configure(mut self, f: impl FnOnce(&mut OutboundConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, OutboundError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| OutboundError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let config = self.config;
        let clock = ManualClock::at(self.start);
        let local = LocalClock::new(config.sending.utc_offset_hours, config.sending.observe_us_dst);
        let alerter = Arc::new(RecordingAlerter::new());

        let tracker = DomainTracker::new(
            db.clone(),
            clock.clone(),
            local,
            config.throttle.max_per_domain,
            config.throttle.webmail_multiplier,
        );
        let identities: Vec<SendingIdentity> =
            config.identities.iter().map(SendingIdentity::from).collect();
        let pool = Arc::new(AccountPool::new(
            db.clone(),
            clock.clone(),
            local,
            tracker,
            alerter.clone(),
            PoolSettings::from_config(&config),
            identities,
        ));
        pool.sync_identities().await?;
        sync_campaigns(&db, &config.campaigns, self.start).await?;

        Ok(TestHarness {
            config,
            db,
            clock,
            local,
            alerter,
            leads: Arc::new(MockLeadSource::with_leads(self.leads)),
            generator: Arc::new(self.generator.unwrap_or_default()),
            transport: Arc::new(self.transport.unwrap_or_default()),
            inbox: Arc::new(self.inbox.unwrap_or_default()),
            pool,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    pub config: OutboundConfig,
    /// Temp DB, removed on drop.
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub local: LocalClock,
    pub alerter: Arc<RecordingAlerter>,
    pub leads: Arc<MockLeadSource>,
    pub generator: Arc<MockGenerator>,
    pub transport: Arc<MockTransport>,
    pub inbox: Arc<MockInbox>,
    pub pool: Arc<AccountPool>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn now(&self) -> DateTime<Utc> {
        use outbound_timing::Clock;
        self.clock.now()
    }

    pub fn producer(&self) -> DraftProducer {
        DraftProducer::new(
            self.db.clone(),
            self.clock.clone(),
            self.leads.clone(),
            self.generator.clone(),
            ProducerSettings::from_config(&self.config.generator),
        )
    }

    pub fn worker(&self) -> SendWorker {
        self.worker_with(WorkerSettings::from_config(&self.config))
    }

    pub fn worker_with(&self, settings: WorkerSettings) -> SendWorker {
        SendWorker::new(
            "test-worker",
            self.db.clone(),
            self.clock.clone(),
            self.local,
            self.pool.clone(),
            self.transport.clone(),
            settings,
        )
    }

    pub fn scanner(&self) -> MailboxScanner {
        MailboxScanner::new(
            self.db.clone(),
            self.clock.clone(),
            self.pool.clone(),
            self.inbox.clone(),
            ScanSettings::from_config(&self.config.mailbox),
        )
    }

    /// Insert a `ready` draft directly, bypassing the producer.
    pub async fn ready_draft(
        &self,
        campaign_id: &str,
        email: &str,
        kind: MessageKind,
        followup_number: u32,
        thread: Option<ThreadRefs>,
    ) -> Result<String, OutboundError> {
        let recipient = Recipient::new(email);
        let mut new = NewDraft::initial(campaign_id, &recipient);
        new.kind = kind;
        new.followup_number = followup_number;
        new.thread = thread;
        let id = match drafts::create(&self.db, new, self.now()).await? {
            CreateOutcome::Created(id) => id,
            other => {
                return Err(OutboundError::Internal(format!(
                    "draft for {email} not created: {other:?}"
                )));
            }
        };
        let content = DraftContent {
            subject: format!("idea for {}", recipient.email),
            body: "Hey,\n\nshort note.\n\nSam".into(),
            body_html: None,
        };
        drafts::mark_ready(&self.db, &id, &content, 90).await?;
        Ok(id)
    }
}
