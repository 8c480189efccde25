// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign rows and their aggregate counters.

use chrono::{DateTime, Utc};
use outbound_core::OutboundError;
use outbound_core::types::{Campaign, CampaignCounter, CampaignCounters, CampaignStatus};
use rusqlite::{OptionalExtension, params};

use crate::codec::{enum_col, fmt_ts, ts_col};
use crate::database::{Database, map_tr_err};
use crate::models::NewCampaign;

const CAMPAIGN_COLUMNS: &str = "id, name, description, status, target, max_recipients,
    sent_count, reply_count, bounce_count, failed_count, created_at";

fn campaign_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: enum_col(row, 3)?,
        target: row.get(4)?,
        max_recipients: row.get(5)?,
        counters: CampaignCounters {
            sent: row.get(6)?,
            replied: row.get(7)?,
            bounced: row.get(8)?,
            failed: row.get(9)?,
        },
        created_at: ts_col(row, 10)?,
    })
}

/// Insert or update a campaign definition. Counters are never touched.
pub async fn upsert(db: &Database, campaign: &NewCampaign, now: DateTime<Utc>) -> Result<(), OutboundError> {
    let c = campaign.clone();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaigns (id, name, description, status, target, max_recipients,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                     description = excluded.description, status = excluded.status,
                     target = excluded.target, max_recipients = excluded.max_recipients,
                     updated_at = excluded.updated_at",
                params![
                    c.id,
                    c.name,
                    c.description,
                    c.status.to_string(),
                    c.target,
                    c.max_recipients,
                    now
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a campaign by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Campaign>, OutboundError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1");
            conn.query_row(&sql, params![id], campaign_from_row).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All campaigns, optionally restricted to one status, ordered by id.
pub async fn list(
    db: &Database,
    status: Option<CampaignStatus>,
) -> Result<Vec<Campaign>, OutboundError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE ?1 IS NULL OR status = ?1 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], campaign_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Add `by` to one counter column.
pub async fn increment_counter(
    db: &Database,
    id: &str,
    counter: CampaignCounter,
    by: u64,
    now: DateTime<Utc>,
) -> Result<(), OutboundError> {
    if by == 0 {
        return Ok(());
    }
    let id = id.to_string();
    let now = fmt_ts(now);
    // Column names come from the CampaignCounter enum, never from input.
    let sql = format!(
        "UPDATE campaigns SET {counter} = {counter} + ?2, updated_at = ?3 WHERE id = ?1"
    );
    db.connection()
        .call(move |conn| {
            conn.execute(&sql, params![id, by, now])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Counter totals across all campaigns.
pub async fn totals(db: &Database) -> Result<CampaignCounters, OutboundError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(sent_count), 0), COALESCE(SUM(reply_count), 0),
                        COALESCE(SUM(bounce_count), 0), COALESCE(SUM(failed_count), 0)
                 FROM campaigns",
                [],
                |row| {
                    Ok(CampaignCounters {
                        sent: row.get(0)?,
                        replied: row.get(1)?,
                        bounced: row.get(2)?,
                        failed: row.get(3)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}
