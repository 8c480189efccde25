// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands: `scan`, `stats`, `import-leads` and `check-config`.

use std::path::Path;

use chrono::Utc;
use outbound_config::OutboundConfig;
use outbound_core::OutboundError;
use outbound_generator::import_leads;
use outbound_mailbox::ScanReport;
use outbound_scheduler::OrchestratorSettings;

use crate::stats::run_stats;
use crate::wiring::{Components, open_database};

/// Run a single mailbox scan across every identity and report the result.
pub async fn run_scan(config: &OutboundConfig, json: bool) -> Result<(), OutboundError> {
    let db = open_database(config).await?;
    let components = Components::assemble(config, db).await?;
    components.pool.sync_identities().await?;

    let report = components.scanner.scan_all().await;
    components.shutdown_adapters().await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print!("{}", render_scan(&report));
    }
    Ok(())
}

fn render_scan(report: &ScanReport) -> String {
    let mut out = String::new();
    for identity in &report.identities {
        match &identity.error {
            Some(error) => out.push_str(&format!("  {:<28} failed: {error}\n", identity.identity)),
            None => out.push_str(&format!(
                "  {:<28} processed {} | replies {} | auto-replies {} | unsubscribes {} | bounces {}\n",
                identity.identity,
                identity.processed,
                identity.replies,
                identity.auto_replies,
                identity.unsubscribes,
                identity.bounces
            )),
        }
    }
    out.push_str(&format!(
        "  Total: {} replies, {} bounces, {} added to do-not-contact\n",
        report.replies(),
        report.bounces(),
        report.suppressions_added()
    ));
    out
}

pub async fn run_stats_command(config: &OutboundConfig, json: bool, plain: bool) -> Result<(), OutboundError> {
    let db = open_database(config).await?;
    let components = Components::assemble(config, db).await?;
    components.pool.sync_identities().await?;
    run_stats(&components.db, &components.pool, json, plain).await
}

pub async fn run_import(config: &OutboundConfig, path: &Path) -> Result<(), OutboundError> {
    let db = open_database(config).await?;
    let report = import_leads(&db, path, Utc::now()).await?;
    println!(
        "outbound: imported {} leads from {} ({} new, {} updated)",
        report.read,
        path.display(),
        report.inserted,
        report.updated
    );
    Ok(())
}

/// Validate the parts of the configuration only checked when the
/// scheduler is built, then print a short summary.
pub fn check_config(config: &OutboundConfig) -> Result<String, OutboundError> {
    OrchestratorSettings::from_config(config)?;
    Ok(format!(
        "outbound: config OK ({} sending identities, {} campaigns, {} scheduled runs)",
        config.sending_identities().len(),
        config.campaigns.len(),
        config.scheduler.campaigns.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbound_mailbox::IdentityScanReport;

    #[test]
    fn default_config_checks_out() {
        let config = outbound_config::load_and_validate_str("").unwrap();
        let line = check_config(&config).unwrap();
        assert!(line.starts_with("outbound: config OK"));
    }

    #[test]
    fn scan_report_lists_failures() {
        let mut ok = IdentityScanReport::new("sam@acme.io");
        ok.replies = 2;
        let mut failed = IdentityScanReport::new("kim@acme.io");
        failed.error = Some("login rejected".into());
        let text = render_scan(&ScanReport {
            identities: vec![ok, failed],
        });
        assert!(text.contains("sam@acme.io"));
        assert!(text.contains("kim@acme.io"));
        assert!(text.contains("failed: login rejected"));
        assert!(text.contains("Total: 2 replies"));
    }
}
