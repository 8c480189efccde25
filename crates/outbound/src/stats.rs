// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `outbound stats` command implementation.
//!
//! Reads queue counts, identity status and campaign counters straight from
//! the database. `--json` prints the same report for scripting.

use std::collections::BTreeMap;
use std::io::IsTerminal;

use outbound_core::OutboundError;
use outbound_core::types::{Campaign, CampaignCounters};
use outbound_pool::{AccountPool, Eligibility, IdentityStatus};
use outbound_storage::Database;
use outbound_storage::queries::{campaigns, drafts, suppression};
use serde::Serialize;

/// Structured stats output.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub drafts: BTreeMap<String, u64>,
    pub identities: Vec<IdentityStatus>,
    pub campaigns: Vec<Campaign>,
    pub totals: CampaignCounters,
    pub suppressed: u64,
}

pub async fn collect_stats(db: &Database, pool: &AccountPool) -> Result<StatsReport, OutboundError> {
    Ok(StatsReport {
        drafts: drafts::counts_by_status(db).await?,
        identities: pool.status().await?,
        campaigns: campaigns::list(db, None).await?,
        totals: campaigns::totals(db).await?,
        suppressed: suppression::count(db).await?,
    })
}

/// Run the `outbound stats` command.
pub async fn run_stats(db: &Database, pool: &AccountPool, json: bool, plain: bool) -> Result<(), OutboundError> {
    let report = collect_stats(db, pool).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print!("{}", render(&report, use_color));
    }
    Ok(())
}

fn eligibility_label(eligibility: &Eligibility) -> String {
    match eligibility {
        Eligibility::Eligible { remaining } => format!("eligible ({remaining} left)"),
        Eligibility::Blocked { until } => format!("blocked until {}", until.format("%Y-%m-%d %H:%M UTC")),
        Eligibility::Paused { score } => format!("paused (reputation {score})"),
        Eligibility::QuotaReached { quota } => format!("quota reached ({quota})"),
        Eligibility::CoolingDown { until } => format!("cooling down until {}", until.format("%H:%M UTC")),
    }
}

fn render(report: &StatsReport, use_color: bool) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("  outbound stats\n");
    out.push_str(&format!("  {}\n", "-".repeat(35)));

    out.push_str("  Queue\n");
    for (status, count) in &report.drafts {
        out.push_str(&format!("    {status:<14} {count}\n"));
    }

    out.push_str("  Identities\n");
    for identity in &report.identities {
        let label = eligibility_label(&identity.eligibility);
        let label = if use_color {
            use colored::Colorize;
            match identity.eligibility {
                Eligibility::Eligible { .. } => label.green().to_string(),
                Eligibility::Blocked { .. } | Eligibility::Paused { .. } => label.red().to_string(),
                _ => label.yellow().to_string(),
            }
        } else {
            label
        };
        out.push_str(&format!(
            "    {:<28} {}/{} today, score {}, {}\n",
            identity.address, identity.sent_today, identity.quota, identity.score, label
        ));
    }

    out.push_str("  Campaigns\n");
    for campaign in &report.campaigns {
        let c = &campaign.counters;
        out.push_str(&format!(
            "    {:<16} {:<9} sent {} | replied {} | bounced {} | failed {}\n",
            campaign.id, campaign.status.to_string(), c.sent, c.replied, c.bounced, c.failed
        ));
    }
    let t = &report.totals;
    out.push_str(&format!(
        "  Totals: sent {} | replied {} | bounced {} | failed {}\n",
        t.sent, t.replied, t.bounced, t.failed
    ));
    out.push_str(&format!("  Do-not-contact: {}\n\n", report.suppressed));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbound_core::types::MessageKind;
    use outbound_test_utils::{TestHarness, campaign_config};

    async fn harness() -> TestHarness {
        TestHarness::builder()
            .with_identity("sam@acme.io")
            .with_campaign(campaign_config("spring"))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stats_reflect_queue_and_campaigns() {
        let h = harness().await;
        h.ready_draft("spring", "ana@northwind.io", MessageKind::Initial, 0, None)
            .await
            .unwrap();
        h.ready_draft("spring", "bo@contoso.com", MessageKind::Initial, 0, None)
            .await
            .unwrap();

        let report = collect_stats(&h.db, &h.pool).await.unwrap();
        assert_eq!(report.drafts.get("ready"), Some(&2));
        assert_eq!(report.identities.len(), 1);
        assert_eq!(report.campaigns.len(), 1);
        assert_eq!(report.suppressed, 0);

        let text = render(&report, false);
        assert!(text.contains("ready"));
        assert!(text.contains("sam@acme.io"));
        assert!(text.contains("eligible"));
        assert!(text.contains("spring"));
    }

    #[tokio::test]
    async fn stats_serialize_to_json() {
        let h = harness().await;
        let report = collect_stats(&h.db, &h.pool).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["identities"][0]["address"], "sam@acme.io");
        assert_eq!(json["identities"][0]["eligibility"]["state"], "eligible");
        assert_eq!(json["campaigns"][0]["id"], "spring");
    }

    #[test]
    fn eligibility_labels_are_readable() {
        assert_eq!(
            eligibility_label(&Eligibility::QuotaReached { quota: 5 }),
            "quota reached (5)"
        );
        assert_eq!(
            eligibility_label(&Eligibility::Paused { score: 32 }),
            "paused (reputation 32)"
        );
    }
}
