// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-of-day summary sent as an `Info` alert.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, Utc};
use outbound_core::OutboundError;
use outbound_storage::queries::{send_records, suppression};
use outbound_storage::{Database, SendTotals};
use outbound_timing::LocalClock;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub totals: SendTotals,
    pub suppressed: u64,
    pub per_identity: Vec<(String, u64)>,
    pub reply_rate: f64,
}

impl DailySummary {
    /// Gather today's numbers, "today" being the local date at `now`.
    pub async fn collect(
        db: &Database,
        local: &LocalClock,
        now: DateTime<Utc>,
    ) -> Result<Self, OutboundError> {
        let date = local.local_date(now);
        let since = local.day_start_utc(date);
        Ok(Self {
            date,
            totals: send_records::totals_since(db, since).await?,
            suppressed: suppression::count(db).await?,
            per_identity: send_records::delivered_by_identity_since(db, since).await?,
            reply_rate: send_records::all_time_reply_rate(db).await?,
        })
    }

    pub fn render(&self) -> String {
        let mut out = format!("Daily summary for {}\n", self.date.format("%Y-%m-%d"));
        let _ = writeln!(
            out,
            "Sent: {} | Replies: {} | Bounces: {} | Failed: {}",
            self.totals.sent, self.totals.replied, self.totals.bounced, self.totals.failed
        );
        let _ = writeln!(out, "Do-not-contact list: {}", self.suppressed);
        let _ = writeln!(out, "Reply rate (all time): {:.1}%", self.reply_rate * 100.0);
        if self.per_identity.is_empty() {
            out.push_str("No sends today.");
        } else {
            out.push_str("Per identity:");
            for (identity, sent) in &self.per_identity {
                let _ = write!(out, "\n  {identity}: {sent}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(per_identity: Vec<(String, u64)>) -> DailySummary {
        DailySummary {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            totals: SendTotals {
                sent: 12,
                replied: 2,
                bounced: 1,
                failed: 0,
            },
            suppressed: 5,
            per_identity,
            reply_rate: 0.0321,
        }
    }

    #[test]
    fn renders_totals_and_identities() {
        let text = summary(vec![("sam@acme.io".into(), 7), ("lee@acme.io".into(), 5)]).render();
        assert!(text.starts_with("Daily summary for 2026-03-10"));
        assert!(text.contains("Sent: 12 | Replies: 2 | Bounces: 1 | Failed: 0"));
        assert!(text.contains("Do-not-contact list: 5"));
        assert!(text.contains("Reply rate (all time): 3.2%"));
        assert!(text.contains("  sam@acme.io: 7"));
        assert!(text.contains("  lee@acme.io: 5"));
    }

    #[test]
    fn quiet_day_says_so() {
        assert!(summary(Vec::new()).render().ends_with("No sends today."));
    }
}
