// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the production component graph from a validated configuration.

use std::sync::Arc;

use outbound_config::OutboundConfig;
use outbound_core::{
    Alerter, ContentGenerator, HealthStatus, InboundTransport, LeadSource, OutboundError,
    OutboundTransport, PluginAdapter,
};
use outbound_generator::{
    CsvLeadSource, DraftProducer, ProducerSettings, ReviewRules, TableLeadSource,
    TemplateGenerator, sync_campaigns,
};
use outbound_mailbox::{ImapTransport, MailboxScanner, ScanSettings};
use outbound_pool::{AccountPool, DomainTracker, PoolSettings};
use outbound_scheduler::{Orchestrator, OrchestratorSettings, Service};
use outbound_sender::{SendWorker, SmtpTransport, WorkerSettings};
use outbound_storage::Database;
use outbound_timing::{Clock, LocalClock, SystemClock};
use tracing::{info, warn};

/// Open (and migrate) the configured database. Failure here is fatal.
pub async fn open_database(config: &OutboundConfig) -> Result<Database, OutboundError> {
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(path = %config.storage.database_path, "database opened");
    Ok(db)
}

/// CSV leads when `generator.leads_csv` is set, otherwise the imported
/// `recipients` table.
pub fn lead_source(config: &OutboundConfig, db: &Database) -> Arc<dyn LeadSource> {
    match &config.generator.leads_csv {
        Some(path) => Arc::new(CsvLeadSource::new(path)),
        None => Arc::new(TableLeadSource::new(db.clone())),
    }
}

/// Every long-lived component, sharing one database, clock and pool.
pub struct Components {
    pub db: Database,
    pub clock: Arc<dyn Clock>,
    pub local: LocalClock,
    pub alerter: Arc<dyn Alerter>,
    pub pool: Arc<AccountPool>,
    pub producer: Arc<DraftProducer>,
    pub scanner: Arc<MailboxScanner>,
    pub workers: Vec<Arc<SendWorker>>,
    adapters: Vec<Arc<dyn PluginAdapter>>,
}

impl Components {
    pub async fn assemble(config: &OutboundConfig, db: Database) -> Result<Self, OutboundError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let local = LocalClock::new(config.sending.utc_offset_hours, config.sending.observe_us_dst);
        sync_campaigns(&db, &config.campaigns, clock.now()).await?;

        let alerter = outbound_alerts::from_config(&config.alerts)?;
        let leads = lead_source(config, &db);
        let generator: Arc<dyn ContentGenerator> =
            Arc::new(TemplateGenerator::new(ReviewRules::default()));
        let transport: Arc<dyn OutboundTransport> = Arc::new(SmtpTransport::new(&config.smtp));
        let inbox: Arc<dyn InboundTransport> = Arc::new(ImapTransport::new(&config.imap));

        let tracker = DomainTracker::new(
            db.clone(),
            clock.clone(),
            local,
            config.throttle.max_per_domain,
            config.throttle.webmail_multiplier,
        );
        let pool = Arc::new(AccountPool::new(
            db.clone(),
            clock.clone(),
            local,
            tracker,
            alerter.clone(),
            PoolSettings::from_config(config),
            config.sending_identities(),
        ));

        let producer = Arc::new(DraftProducer::new(
            db.clone(),
            clock.clone(),
            leads.clone(),
            generator.clone(),
            ProducerSettings::from_config(&config.generator),
        ));
        let scanner = Arc::new(MailboxScanner::new(
            db.clone(),
            clock.clone(),
            pool.clone(),
            inbox.clone(),
            ScanSettings::from_config(&config.mailbox),
        ));
        let workers = (0..config.queue.workers.max(1))
            .map(|i| {
                Arc::new(SendWorker::new(
                    format!("worker-{i}"),
                    db.clone(),
                    clock.clone(),
                    local,
                    pool.clone(),
                    transport.clone(),
                    WorkerSettings::from_config(config),
                ))
            })
            .collect();

        Ok(Self {
            db,
            clock,
            local,
            alerter: alerter.clone(),
            pool,
            producer,
            scanner,
            workers,
            adapters: vec![leads, generator, transport, inbox, alerter],
        })
    }

    /// Log the health of every adapter. Unhealthy adapters are reported,
    /// not fatal.
    pub async fn check_adapters(&self) {
        for adapter in &self.adapters {
            match adapter.health_check().await {
                Ok(HealthStatus::Healthy) => {
                    info!(adapter = adapter.name(), kind = %adapter.adapter_type(), "adapter healthy");
                }
                Ok(status) => {
                    warn!(adapter = adapter.name(), ?status, "adapter not healthy");
                }
                Err(e) => warn!(adapter = adapter.name(), error = %e, "adapter health check failed"),
            }
        }
    }

    pub async fn shutdown_adapters(&self) {
        for adapter in &self.adapters {
            if let Err(e) = adapter.shutdown().await {
                warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
            }
        }
    }

    /// The `serve` task set.
    pub fn service(&self, config: &OutboundConfig) -> Result<Service, OutboundError> {
        let orchestrator = Orchestrator::new(
            self.db.clone(),
            self.clock.clone(),
            self.local,
            OrchestratorSettings::from_config(config)?,
            self.pool.clone(),
            self.producer.clone(),
            self.scanner.clone(),
            self.alerter.clone(),
        );
        Ok(Service {
            pool: self.pool.clone(),
            producer: self.producer.clone(),
            workers: self.workers.clone(),
            orchestrator: Arc::new(orchestrator),
            grace_period: std::time::Duration::from_secs(config.scheduler.grace_period_secs),
        })
    }
}
