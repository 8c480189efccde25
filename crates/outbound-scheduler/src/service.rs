// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-running service: producer, send workers and orchestrator under one
//! shutdown token.

use std::sync::Arc;
use std::time::Duration;

use outbound_core::OutboundError;
use outbound_generator::DraftProducer;
use outbound_pool::AccountPool;
use outbound_sender::SendWorker;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orchestrator::Orchestrator;
use crate::shutdown::drain;

/// Everything `serve` runs, already wired to shared storage and clock.
pub struct Service {
    pub pool: Arc<AccountPool>,
    pub producer: Arc<DraftProducer>,
    pub workers: Vec<Arc<SendWorker>>,
    pub orchestrator: Arc<Orchestrator>,
    pub grace_period: Duration,
}

impl Service {
    /// Sync identities, return stale claims to the queue, then run every
    /// loop until `cancel` fires. Loops still running after the grace period
    /// are aborted.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), OutboundError> {
        self.pool.sync_identities().await?;
        if let Some(worker) = self.workers.first() {
            let swept = worker.sweep_stale().await?;
            if swept > 0 {
                info!(swept, "stale claims returned to the queue at startup");
            }
        }

        let mut tasks = JoinSet::new();
        {
            let producer = self.producer.clone();
            let token = cancel.child_token();
            tasks.spawn(async move { producer.run(token).await });
        }
        for worker in &self.workers {
            let worker = worker.clone();
            let token = cancel.child_token();
            tasks.spawn(async move { worker.run(token).await });
        }
        {
            let orchestrator = self.orchestrator.clone();
            let token = cancel.child_token();
            tasks.spawn(async move { orchestrator.run(token).await });
        }
        info!(
            workers = self.workers.len(),
            identities = self.pool.identities().len(),
            "outbound service running"
        );

        cancel.cancelled().await;
        info!(
            grace_secs = self.grace_period.as_secs(),
            "shutdown requested, waiting for loops to stop"
        );
        let stragglers = drain(&mut tasks, self.grace_period).await;
        info!(stragglers, "outbound service stopped");
        Ok(())
    }
}
