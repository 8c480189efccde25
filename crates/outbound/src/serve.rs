// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `outbound serve` command implementation.
//!
//! Opens storage, assembles the components, then runs the producer, the
//! send workers and the orchestrator until SIGINT or SIGTERM. Supports
//! graceful shutdown through the scheduler's grace period.

use outbound_config::OutboundConfig;
use outbound_core::OutboundError;
use outbound_scheduler::install_signal_handler;
use tracing::info;

use crate::wiring::{Components, open_database};

pub async fn run_serve(config: OutboundConfig) -> Result<(), OutboundError> {
    info!(
        name = %config.service.name,
        identities = config.identities.len(),
        campaigns = config.campaigns.len(),
        "starting outbound"
    );

    let db = open_database(&config).await?;
    let components = Components::assemble(&config, db).await?;
    components.check_adapters().await;

    let service = components.service(&config)?;
    let cancel = install_signal_handler();
    service.run(cancel).await?;

    components.shutdown_adapters().await;
    info!("outbound serve shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured
/// level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("outbound={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
