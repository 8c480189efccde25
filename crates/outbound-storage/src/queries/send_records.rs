// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable send records, used for reply and bounce correlation, quotas,
//! reputation and follow-up planning.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use outbound_core::OutboundError;
use outbound_core::types::{BounceKind, PriorSend, SendRecord, SendStatus};
use rusqlite::{OptionalExtension, params};

use crate::codec::{enum_col, fmt_ts, opt_enum_col, opt_ts_col, ts_col};
use crate::database::{Database, map_tr_err};
use crate::models::{NewSendRecord, SendTotals, WindowStats};

const RECORD_COLUMNS: &str = "id, draft_id, campaign_id, recipient_email, recipient_domain,
    identity, kind, followup_number, subject, message_id, in_reply_to, references_chain,
    status, bounce_kind, error, sent_at, replied_at, bounced_at";

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SendRecord> {
    Ok(SendRecord {
        id: row.get(0)?,
        draft_id: row.get(1)?,
        campaign_id: row.get(2)?,
        recipient_email: row.get(3)?,
        recipient_domain: row.get(4)?,
        identity: row.get(5)?,
        kind: enum_col(row, 6)?,
        followup_number: row.get(7)?,
        subject: row.get(8)?,
        message_id: row.get(9)?,
        in_reply_to: row.get(10)?,
        references: row.get(11)?,
        status: enum_col(row, 12)?,
        bounce_kind: opt_enum_col(row, 13)?,
        error: row.get(14)?,
        sent_at: ts_col(row, 15)?,
        replied_at: opt_ts_col(row, 16)?,
        bounced_at: opt_ts_col(row, 17)?,
    })
}

/// Persist a send attempt. Returns the new record id.
pub async fn insert(db: &Database, record: NewSendRecord) -> Result<String, OutboundError> {
    let id = uuid::Uuid::new_v4().to_string();
    let d = record.draft;
    let identity = record.identity.to_ascii_lowercase();
    let status = record.status.to_string();
    let sent_at = fmt_ts(record.sent_at);
    let message_id = record.message_id;
    let error = record.error;
    let kind = d.kind.to_string();
    let record_id = id.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO send_records (id, draft_id, campaign_id, recipient_email,
                     recipient_domain, identity, kind, followup_number, subject, message_id,
                     in_reply_to, references_chain, status, error, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    record_id,
                    d.id,
                    d.campaign_id,
                    d.recipient_email,
                    d.recipient_domain,
                    identity,
                    kind,
                    d.followup_number,
                    d.subject,
                    message_id,
                    d.in_reply_to,
                    d.references,
                    status,
                    error,
                    sent_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(id)
}

/// Mark every delivered-but-unanswered record for `email` as replied.
///
/// Returns the campaign id of each record that changed, one entry per record.
pub async fn mark_replied(
    db: &Database,
    email: &str,
    now: DateTime<Utc>,
) -> Result<Vec<String>, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "UPDATE send_records SET status = 'replied', replied_at = ?2
                 WHERE recipient_email = ?1 AND status = 'sent'
                 RETURNING campaign_id",
            )?;
            let rows = stmt.query_map(params![email, now], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark the most recent delivered record for `email` as bounced.
///
/// Returns the campaign id of the record that changed, if any.
pub async fn mark_bounced(
    db: &Database,
    email: &str,
    kind: BounceKind,
    now: DateTime<Utc>,
) -> Result<Option<String>, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    let kind = kind.to_string();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "UPDATE send_records SET status = 'bounced', bounce_kind = ?2, bounced_at = ?3
                 WHERE id = (
                     SELECT id FROM send_records
                     WHERE recipient_email = ?1 AND status = 'sent'
                     ORDER BY sent_at DESC LIMIT 1)
                 RETURNING campaign_id",
                params![email, kind, now],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Whether any send was attempted to `email`.
pub async fn has_contacted(db: &Database, email: &str) -> Result<bool, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM send_records WHERE recipient_email = ?1)",
                params![email],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Every address with at least one delivered (not `failed`) send record.
pub async fn contacted_addresses(db: &Database) -> Result<HashSet<String>, OutboundError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT recipient_email FROM send_records WHERE status != 'failed'",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Records for `email`, newest first.
pub async fn list_for_recipient(
    db: &Database,
    email: &str,
) -> Result<Vec<SendRecord>, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM send_records WHERE recipient_email = ?1
                 ORDER BY sent_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![email], record_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Previously delivered messages to `email` in `campaign_id`, oldest first.
pub async fn prior_sends(
    db: &Database,
    email: &str,
    campaign_id: &str,
) -> Result<Vec<PriorSend>, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT subject, message_id, identity, followup_number, sent_at FROM send_records
                 WHERE recipient_email = ?1 AND campaign_id = ?2 AND status != 'failed'
                 ORDER BY sent_at ASC",
            )?;
            let rows = stmt.query_map(params![email, campaign_id], |row| {
                Ok(PriorSend {
                    subject: row.get(0)?,
                    message_id: row.get(1)?,
                    identity: row.get(2)?,
                    followup_number: row.get(3)?,
                    sent_at: ts_col(row, 4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delivered records at sequence `previous` that are due a follow-up.
///
/// A record qualifies when it was sent at or before `sent_before`, the
/// recipient never replied or bounced in this campaign, the recipient is not
/// suppressed, and no live draft exists yet for sequence `previous + 1`.
pub async fn followup_due(
    db: &Database,
    campaign_id: &str,
    previous: u32,
    sent_before: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<SendRecord>, OutboundError> {
    let campaign_id = campaign_id.to_string();
    let sent_before = fmt_ts(sent_before);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM send_records r
                 WHERE r.campaign_id = ?1 AND r.followup_number = ?2 AND r.status = 'sent'
                   AND r.sent_at <= ?3
                   AND NOT EXISTS (
                       SELECT 1 FROM send_records o
                       WHERE o.recipient_email = r.recipient_email AND o.campaign_id = r.campaign_id
                         AND o.status IN ('replied', 'bounced'))
                   AND NOT EXISTS (SELECT 1 FROM suppression s WHERE s.email = r.recipient_email)
                   AND NOT EXISTS (
                       SELECT 1 FROM drafts d
                       WHERE d.recipient_email = r.recipient_email AND d.campaign_id = r.campaign_id
                         AND d.followup_number = ?2 + 1
                         AND d.status NOT IN ('failed', 'skipped'))
                 ORDER BY r.sent_at ASC
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![campaign_id, previous, sent_before, limit], record_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome counts for `identity` over records sent at or after `since`.
pub async fn window_stats(
    db: &Database,
    identity: &str,
    since: DateTime<Utc>,
) -> Result<WindowStats, OutboundError> {
    let identity = identity.to_ascii_lowercase();
    let since = fmt_ts(since);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'bounced'), 0),
                        COALESCE(SUM(status = 'replied'), 0),
                        COALESCE(SUM(status = 'failed'), 0)
                 FROM send_records WHERE identity = ?1 AND sent_at >= ?2",
                params![identity, since],
                |row| {
                    Ok(WindowStats {
                        sends: row.get(0)?,
                        bounces: row.get(1)?,
                        replies: row.get(2)?,
                        failures: row.get(3)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Delivered sends by `identity` at or after `since`. Failed attempts do not
/// count toward quota.
pub async fn delivered_since(
    db: &Database,
    identity: &str,
    since: DateTime<Utc>,
) -> Result<u32, OutboundError> {
    let identity = identity.to_ascii_lowercase();
    let since = fmt_ts(since);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM send_records
                 WHERE identity = ?1 AND sent_at >= ?2 AND status != 'failed'",
                params![identity, since],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Time of the latest delivered send by `identity`.
pub async fn last_delivered_at(
    db: &Database,
    identity: &str,
) -> Result<Option<DateTime<Utc>>, OutboundError> {
    let identity = identity.to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            let raw: Option<String> = conn.query_row(
                "SELECT MAX(sent_at) FROM send_records WHERE identity = ?1 AND status != 'failed'",
                params![identity],
                |row| row.get(0),
            )?;
            raw.map(|r| crate::codec::parse_ts(0, &r)).transpose()
        })
        .await
        .map_err(map_tr_err)
}

/// Totals across all identities for activity at or after `since`.
pub async fn totals_since(db: &Database, since: DateTime<Utc>) -> Result<SendTotals, OutboundError> {
    let since = fmt_ts(since);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(status != 'failed' AND sent_at >= ?1), 0),
                        COALESCE(SUM(replied_at IS NOT NULL AND replied_at >= ?1), 0),
                        COALESCE(SUM(bounced_at IS NOT NULL AND bounced_at >= ?1), 0),
                        COALESCE(SUM(status = 'failed' AND sent_at >= ?1), 0)
                 FROM send_records",
                params![since],
                |row| {
                    Ok(SendTotals {
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

/// Delivered sends per identity at or after `since`, by address.
pub async fn delivered_by_identity_since(
    db: &Database,
    since: DateTime<Utc>,
) -> Result<Vec<(String, u64)>, OutboundError> {
    let since = fmt_ts(since);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT identity, COUNT(*) FROM send_records
                 WHERE sent_at >= ?1 AND status != 'failed'
                 GROUP BY identity ORDER BY identity",
            )?;
            let rows = stmt.query_map(params![since], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Replied records divided by delivered records, over all time.
pub async fn all_time_reply_rate(db: &Database) -> Result<f64, OutboundError> {
    db.connection()
        .call(|conn| {
            let (delivered, replied): (u64, u64) = conn.query_row(
                "SELECT COALESCE(SUM(status != 'failed'), 0), COALESCE(SUM(status = 'replied'), 0)
                 FROM send_records",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(if delivered == 0 {
                0.0
            } else {
                replied as f64 / delivered as f64
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Status of the record correlated with a delivered draft.
pub async fn status_for_draft(
    db: &Database,
    draft_id: &str,
) -> Result<Option<SendStatus>, OutboundError> {
    let draft_id = draft_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT status FROM send_records WHERE draft_id = ?1 ORDER BY sent_at DESC LIMIT 1",
                params![draft_id],
                |row| enum_col(row, 0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
