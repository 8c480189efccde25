// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Draft queue operations.
//!
//! Every status change is a conditional `UPDATE ... WHERE status IN (...)`
//! built from [`DraftStatus::predecessors`]. An update that matches no row is
//! reported as [`OutboundError::InvalidTransition`], which is also how a
//! caller learns it lost a race for the same draft.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use outbound_core::OutboundError;
use outbound_core::types::{
    CreateOutcome, Draft, DraftContent, DraftStatus, MessageKind, NewDraft, domain_of,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::codec::{enum_col, fmt_opt_ts, fmt_ts, opt_ts_col, ts_col};
use crate::database::{Database, map_tr_err};

const DRAFT_COLUMNS: &str = "id, campaign_id, identity, recipient_email, recipient_name,
    recipient_domain, kind, followup_number, subject, body, body_html, in_reply_to,
    references_chain, quality_score, status, review_reason, created_at, scheduled_at,
    claimed_at, sent_at, message_id, last_error, retry_count";

pub(crate) fn draft_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draft> {
    Ok(Draft {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        identity: row.get(2)?,
        recipient_email: row.get(3)?,
        recipient_name: row.get(4)?,
        recipient_domain: row.get(5)?,
        kind: enum_col(row, 6)?,
        followup_number: row.get(7)?,
        subject: row.get(8)?,
        body: row.get(9)?,
        body_html: row.get(10)?,
        in_reply_to: row.get(11)?,
        references: row.get(12)?,
        quality_score: row.get(13)?,
        status: enum_col(row, 14)?,
        review_reason: row.get(15)?,
        created_at: ts_col(row, 16)?,
        scheduled_at: opt_ts_col(row, 17)?,
        claimed_at: opt_ts_col(row, 18)?,
        sent_at: opt_ts_col(row, 19)?,
        message_id: row.get(20)?,
        last_error: row.get(21)?,
        retry_count: row.get(22)?,
    })
}

/// SQL list of the statuses allowed to move to `next`.
fn predecessor_list(next: DraftStatus) -> String {
    DraftStatus::predecessors(next)
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of a guarded update, resolved on the connection thread.
enum Guarded {
    Applied,
    Rejected(String),
}

fn resolve(conn: &Connection, changed: usize, id: &str) -> rusqlite::Result<Guarded> {
    if changed > 0 {
        return Ok(Guarded::Applied);
    }
    let current: Option<String> = conn
        .query_row("SELECT status FROM drafts WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(Guarded::Rejected(current.unwrap_or_else(|| "missing".to_string())))
}

fn into_result(outcome: Guarded, id: &str, to: DraftStatus) -> Result<(), OutboundError> {
    match outcome {
        Guarded::Applied => Ok(()),
        Guarded::Rejected(from) => Err(OutboundError::InvalidTransition {
            id: id.to_string(),
            from,
            to: to.to_string(),
        }),
    }
}

/// Create a draft in `generating`.
///
/// Suppression is checked first, then an existing draft for the same
/// (recipient, campaign, kind, sequence) in any status other than
/// `failed`/`skipped`. Both checks and the insert run in one transaction.
pub async fn create(
    db: &Database,
    new: NewDraft,
    now: DateTime<Utc>,
) -> Result<CreateOutcome, OutboundError> {
    let id = uuid::Uuid::new_v4().to_string();
    let email = new.recipient_email.trim().to_ascii_lowercase();
    let domain = domain_of(&email);
    let created_at = fmt_ts(now);
    let scheduled_at = fmt_opt_ts(new.scheduled_at);
    let kind = new.kind.to_string();
    let (in_reply_to, references) = match new.thread {
        Some(t) => (Some(t.in_reply_to), Some(t.references)),
        None => (None, None),
    };

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let suppressed: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM suppression WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?;
            if suppressed {
                return Ok(CreateOutcome::Suppressed);
            }

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM drafts
                     WHERE recipient_email = ?1 AND campaign_id = ?2 AND kind = ?3
                       AND followup_number = ?4 AND status NOT IN ('failed', 'skipped')
                     LIMIT 1",
                    params![email, new.campaign_id, kind, new.followup_number],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(existing) = existing {
                return Ok(CreateOutcome::Duplicate(existing));
            }

            tx.execute(
                "INSERT INTO drafts (id, campaign_id, identity, recipient_email, recipient_name,
                     recipient_domain, kind, followup_number, in_reply_to, references_chain,
                     status, created_at, scheduled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'generating', ?11, ?12)",
                params![
                    id,
                    new.campaign_id,
                    new.preferred_identity,
                    email,
                    new.recipient_name,
                    domain,
                    kind,
                    new.followup_number,
                    in_reply_to,
                    references,
                    created_at,
                    scheduled_at,
                ],
            )?;
            tx.commit()?;
            Ok(CreateOutcome::Created(id))
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a draft by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Draft>, OutboundError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1");
            conn.query_row(&sql, params![id], draft_from_row).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// `generating -> ready` with accepted content.
pub async fn mark_ready(
    db: &Database,
    id: &str,
    content: &DraftContent,
    score: u32,
) -> Result<(), OutboundError> {
    let id = id.to_string();
    let content = content.clone();
    let guard_id = id.clone();
    let sql = format!(
        "UPDATE drafts SET status = 'ready', subject = ?2, body = ?3, body_html = ?4,
             quality_score = ?5, review_reason = NULL
         WHERE id = ?1 AND status IN ({})",
        predecessor_list(DraftStatus::Ready)
    );
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &sql,
                params![id, content.subject, content.body, content.body_html, score],
            )?;
            resolve(conn, changed, &id)
        })
        .await
        .map_err(map_tr_err)?;
    into_result(outcome, &guard_id, DraftStatus::Ready)
}

/// `generating -> review_failed`, keeping the best attempt for inspection.
pub async fn mark_review_failed(
    db: &Database,
    id: &str,
    content: &DraftContent,
    best_score: u32,
    reason: &str,
) -> Result<(), OutboundError> {
    let id = id.to_string();
    let content = content.clone();
    let reason = reason.to_string();
    let guard_id = id.clone();
    let sql = format!(
        "UPDATE drafts SET status = 'review_failed', subject = ?2, body = ?3, body_html = ?4,
             quality_score = ?5, review_reason = ?6
         WHERE id = ?1 AND status IN ({})",
        predecessor_list(DraftStatus::ReviewFailed)
    );
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &sql,
                params![
                    id,
                    content.subject,
                    content.body,
                    content.body_html,
                    best_score,
                    reason
                ],
            )?;
            resolve(conn, changed, &id)
        })
        .await
        .map_err(map_tr_err)?;
    into_result(outcome, &guard_id, DraftStatus::ReviewFailed)
}

/// `claimed -> sent`, recording the identity that actually sent it.
pub async fn mark_sent(
    db: &Database,
    id: &str,
    message_id: Option<&str>,
    identity: &str,
    now: DateTime<Utc>,
) -> Result<(), OutboundError> {
    let id = id.to_string();
    let message_id = message_id.map(str::to_string);
    let identity = identity.to_string();
    let sent_at = fmt_ts(now);
    let guard_id = id.clone();
    let sql = format!(
        "UPDATE drafts SET status = 'sent', message_id = ?2, identity = ?3, sent_at = ?4,
             last_error = NULL
         WHERE id = ?1 AND status IN ({})",
        predecessor_list(DraftStatus::Sent)
    );
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(&sql, params![id, message_id, identity, sent_at])?;
            resolve(conn, changed, &id)
        })
        .await
        .map_err(map_tr_err)?;
    into_result(outcome, &guard_id, DraftStatus::Sent)
}

/// `claimed -> failed`, incrementing the retry count.
pub async fn mark_failed(
    db: &Database,
    id: &str,
    identity: Option<&str>,
    error: &str,
) -> Result<(), OutboundError> {
    let id = id.to_string();
    let identity = identity.map(str::to_string);
    let error = error.to_string();
    let guard_id = id.clone();
    let sql = format!(
        "UPDATE drafts SET status = 'failed', last_error = ?2,
             identity = COALESCE(?3, identity), retry_count = retry_count + 1
         WHERE id = ?1 AND status IN ({})",
        predecessor_list(DraftStatus::Failed)
    );
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(&sql, params![id, error, identity])?;
            resolve(conn, changed, &id)
        })
        .await
        .map_err(map_tr_err)?;
    into_result(outcome, &guard_id, DraftStatus::Failed)
}

/// Move a not-yet-claimed draft to `skipped`.
pub async fn mark_skipped(db: &Database, id: &str, reason: &str) -> Result<(), OutboundError> {
    let id = id.to_string();
    let reason = reason.to_string();
    let guard_id = id.clone();
    let sql = format!(
        "UPDATE drafts SET status = 'skipped', review_reason = ?2
         WHERE id = ?1 AND status IN ({})",
        predecessor_list(DraftStatus::Skipped)
    );
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(&sql, params![id, reason])?;
            resolve(conn, changed, &id)
        })
        .await
        .map_err(map_tr_err)?;
    into_result(outcome, &guard_id, DraftStatus::Skipped)
}

/// Atomically claim the next sendable draft.
///
/// Ordering: highest follow-up sequence first, then drafts whose identity is
/// `preferred`, then earliest scheduled, then oldest. Suppressed recipients,
/// excluded domains and drafts scheduled in the future are never returned.
pub async fn claim_next(
    db: &Database,
    preferred: Option<&str>,
    excluded_domains: &[String],
    now: DateTime<Utc>,
) -> Result<Option<Draft>, OutboundError> {
    let preferred = preferred.map(str::to_string);
    let excluded = serde_json::to_string(excluded_domains)
        .map_err(|e| OutboundError::Internal(format!("encode excluded domains: {e}")))?;
    let now = fmt_ts(now);

    db.connection()
        .call(move |conn| {
            let sql = format!(
                "UPDATE drafts SET status = 'claimed', claimed_at = ?1
                 WHERE id = (
                     SELECT d.id FROM drafts d
                     WHERE d.status = 'ready'
                       AND NOT EXISTS (SELECT 1 FROM suppression s WHERE s.email = d.recipient_email)
                       AND d.recipient_domain NOT IN (SELECT value FROM json_each(?3))
                       AND (d.scheduled_at IS NULL OR d.scheduled_at <= ?1)
                     ORDER BY d.followup_number DESC,
                              CASE WHEN d.identity IS NOT NULL AND d.identity = ?2 THEN 0 ELSE 1 END,
                              COALESCE(d.scheduled_at, d.created_at),
                              d.created_at
                     LIMIT 1)
                   AND status = 'ready'
                 RETURNING {DRAFT_COLUMNS}"
            );
            conn.query_row(&sql, params![now, preferred, excluded], draft_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// `claimed -> ready`, clearing the claim time.
pub async fn release_claimed(db: &Database, id: &str) -> Result<(), OutboundError> {
    let id = id.to_string();
    let guard_id = id.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE drafts SET status = 'ready', claimed_at = NULL
                 WHERE id = ?1 AND status = 'claimed'",
                params![id],
            )?;
            resolve(conn, changed, &id)
        })
        .await
        .map_err(map_tr_err)?;
    into_result(outcome, &guard_id, DraftStatus::Ready)
}

/// Return claims older than `timeout` to `ready`. Returns how many moved.
pub async fn cleanup_stale_claimed(
    db: &Database,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<usize, OutboundError> {
    let cutoff = fmt_ts(now - timeout);
    db.connection()
        .call(move |conn| {
            let moved = conn.execute(
                "UPDATE drafts SET status = 'ready', claimed_at = NULL
                 WHERE status = 'claimed' AND claimed_at < ?1",
                params![cutoff],
            )?;
            Ok(moved)
        })
        .await
        .map_err(map_tr_err)
}

/// Skip drafts left in `generating` for longer than `timeout`, the trace of
/// a producer that died mid-generation. Returns how many moved.
pub async fn cleanup_stale_generating(
    db: &Database,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<usize, OutboundError> {
    let cutoff = fmt_ts(now - timeout);
    db.connection()
        .call(move |conn| {
            let moved = conn.execute(
                "UPDATE drafts SET status = 'skipped', review_reason = 'generation interrupted'
                 WHERE status = 'generating' AND created_at < ?1",
                params![cutoff],
            )?;
            Ok(moved)
        })
        .await
        .map_err(map_tr_err)
}

/// Skip every unclaimed draft whose recipient is on the suppression list.
pub async fn skip_suppressed(db: &Database) -> Result<usize, OutboundError> {
    let sql = format!(
        "UPDATE drafts SET status = 'skipped', review_reason = 'recipient suppressed'
         WHERE status IN ({})
           AND recipient_email IN (SELECT email FROM suppression)",
        predecessor_list(DraftStatus::Skipped)
    );
    db.connection()
        .call(move |conn| Ok(conn.execute(&sql, [])?))
        .await
        .map_err(map_tr_err)
}

/// Skip every unclaimed draft addressed to `email`.
pub async fn skip_for_recipient(
    db: &Database,
    email: &str,
    reason: &str,
) -> Result<usize, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    let reason = reason.to_string();
    let sql = format!(
        "UPDATE drafts SET status = 'skipped', review_reason = ?2
         WHERE recipient_email = ?1 AND status IN ({})",
        predecessor_list(DraftStatus::Skipped)
    );
    db.connection()
        .call(move |conn| Ok(conn.execute(&sql, params![email, reason])?))
        .await
        .map_err(map_tr_err)
}

/// Number of drafts in each status. Statuses with no drafts are reported as 0.
pub async fn counts_by_status(
    db: &Database,
) -> Result<BTreeMap<String, u64>, OutboundError> {
    db.connection()
        .call(|conn| {
            let mut counts: BTreeMap<String, u64> = outbound_core::types::ALL_DRAFT_STATUSES
                .iter()
                .map(|s| (s.to_string(), 0))
                .collect();
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM drafts GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                counts.insert(status, count);
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of drafts currently in `status`.
pub async fn count_with_status(db: &Database, status: DraftStatus) -> Result<u64, OutboundError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM drafts WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a live draft (anything but `failed`/`skipped`) exists for the
/// recipient in the campaign.
pub async fn exists_for_recipient(
    db: &Database,
    email: &str,
    campaign_id: &str,
) -> Result<bool, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM drafts WHERE recipient_email = ?1 AND campaign_id = ?2
                     AND status NOT IN ('failed', 'skipped'))",
                params![email, campaign_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Every draft addressed to `email`, oldest first.
pub async fn list_for_recipient(db: &Database, email: &str) -> Result<Vec<Draft>, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts WHERE recipient_email = ?1 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![email], draft_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Live drafts of `kind` in `campaign_id` (anything but `failed`/`skipped`).
pub async fn count_for_campaign(
    db: &Database,
    campaign_id: &str,
    kind: MessageKind,
) -> Result<u64, OutboundError> {
    let campaign_id = campaign_id.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM drafts
                 WHERE campaign_id = ?1 AND kind = ?2 AND status NOT IN ('failed', 'skipped')",
                params![campaign_id, kind],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::suppression;
    use outbound_core::types::{Recipient, SuppressionReason, ThreadRefs};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn content(subject: &str) -> DraftContent {
        DraftContent {
            subject: subject.to_string(),
            body: "Hello there".to_string(),
            body_html: None,
        }
    }

    async fn ready_draft(db: &Database, email: &str, now: DateTime<Utc>) -> String {
        let new = NewDraft::initial("c1", &Recipient::new(email));
        let CreateOutcome::Created(id) = create(db, new, now).await.unwrap() else {
            panic!("expected Created");
        };
        mark_ready(db, &id, &content("Hi"), 80).await.unwrap();
        id
    }

    #[tokio::test]
    async fn create_lowercases_and_derives_domain() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let new = NewDraft::initial("c1", &Recipient::new("Jane@Example.COM"));
        let CreateOutcome::Created(id) = create(&db, new, now).await.unwrap() else {
            panic!("expected Created");
        };
        let draft = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(draft.recipient_email, "jane@example.com");
        assert_eq!(draft.recipient_domain, "example.com");
        assert_eq!(draft.status, DraftStatus::Generating);
        assert_eq!(draft.kind, MessageKind::Initial);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_duplicate_returns_existing_id() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let first = ready_draft(&db, "a@x.com", now).await;

        let again = NewDraft::initial("c1", &Recipient::new("a@x.com"));
        assert_eq!(
            create(&db, again, now).await.unwrap(),
            CreateOutcome::Duplicate(first.clone())
        );

        // A different campaign is a different key.
        let other = NewDraft::initial("c2", &Recipient::new("a@x.com"));
        assert!(matches!(
            create(&db, other, now).await.unwrap(),
            CreateOutcome::Created(_)
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_draft_does_not_block_a_new_one() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = ready_draft(&db, "a@x.com", now).await;
        claim_next(&db, None, &[], now).await.unwrap().unwrap();
        mark_failed(&db, &id, Some("s@me.com"), "connection reset").await.unwrap();

        let failed = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.last_error.as_deref(), Some("connection reset"));

        let again = NewDraft::initial("c1", &Recipient::new("a@x.com"));
        assert!(matches!(
            create(&db, again, now).await.unwrap(),
            CreateOutcome::Created(_)
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_for_suppressed_recipient_is_refused() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        suppression::add(&db, "gone@x.com", SuppressionReason::Unsubscribe, None, now)
            .await
            .unwrap();
        let new = NewDraft::initial("c1", &Recipient::new("Gone@X.com"));
        assert_eq!(create(&db, new, now).await.unwrap(), CreateOutcome::Suppressed);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_transitions_are_rejected() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = ready_draft(&db, "a@x.com", now).await;

        // ready -> sent skips claimed.
        let err = mark_sent(&db, &id, Some("<m@x>"), "s@me.com", now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OutboundError::InvalidTransition { ref from, ref to, .. } if from == "ready" && to == "sent"
        ));

        // ready cannot be marked ready again.
        assert!(mark_ready(&db, &id, &content("x"), 90).await.is_err());

        // Unknown ids report "missing".
        let err = release_claimed(&db, "nope").await.unwrap_err();
        assert!(matches!(err, OutboundError::InvalidTransition { ref from, .. } if from == "missing"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn full_lifecycle_reaches_sent() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = ready_draft(&db, "a@x.com", now).await;

        let claimed = claim_next(&db, None, &[], now).await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, DraftStatus::Claimed);
        assert!(claimed.claimed_at.is_some());

        mark_sent(&db, &id, Some("<m@x>"), "s@me.com", now).await.unwrap();
        let sent = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(sent.status, DraftStatus::Sent);
        assert_eq!(sent.identity.as_deref(), Some("s@me.com"));
        assert_eq!(sent.message_id.as_deref(), Some("<m@x>"));

        assert!(mark_skipped(&db, &id, "late").await.is_err());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claim_prefers_highest_sequence() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let initial = ready_draft(&db, "first@x.com", now - Duration::hours(2)).await;

        let followup = NewDraft {
            kind: MessageKind::FollowupNewThread,
            followup_number: 2,
            ..NewDraft::initial("c1", &Recipient::new("second@y.com"))
        };
        let CreateOutcome::Created(seq2) = create(&db, followup, now).await.unwrap() else {
            panic!("expected Created");
        };
        mark_ready(&db, &seq2, &content("Last note"), 75).await.unwrap();

        let first = claim_next(&db, None, &[], now).await.unwrap().unwrap();
        assert_eq!(first.id, seq2);
        let second = claim_next(&db, None, &[], now).await.unwrap().unwrap();
        assert_eq!(second.id, initial);
        assert!(claim_next(&db, None, &[], now).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn preferred_identity_breaks_ties_within_sequence() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let _older = ready_draft(&db, "a@x.com", now - Duration::minutes(10)).await;

        let owned = NewDraft {
            preferred_identity: Some("owner@me.com".into()),
            ..NewDraft::initial("c1", &Recipient::new("b@y.com"))
        };
        let CreateOutcome::Created(owned_id) = create(&db, owned, now).await.unwrap() else {
            panic!("expected Created");
        };
        mark_ready(&db, &owned_id, &content("Hi"), 80).await.unwrap();

        let claimed = claim_next(&db, Some("owner@me.com"), &[], now).await.unwrap().unwrap();
        assert_eq!(claimed.id, owned_id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claim_skips_excluded_domains_suppressed_and_future() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        ready_draft(&db, "a@busy.com", now).await;
        ready_draft(&db, "b@blocked.com", now).await;
        suppression::add(&db, "b@blocked.com", SuppressionReason::HardBounce, None, now)
            .await
            .unwrap();

        let later = NewDraft {
            scheduled_at: Some(now + Duration::hours(1)),
            ..NewDraft::initial("c1", &Recipient::new("c@later.com"))
        };
        let CreateOutcome::Created(later_id) = create(&db, later, now).await.unwrap() else {
            panic!("expected Created");
        };
        mark_ready(&db, &later_id, &content("Hi"), 80).await.unwrap();

        let excluded = vec!["busy.com".to_string()];
        assert!(claim_next(&db, None, &excluded, now).await.unwrap().is_none());

        let claimed = claim_next(&db, None, &excluded, now + Duration::hours(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, later_id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_claim_returns_to_ready() {
        let (db, _dir) = setup_db().await;
        let claimed_at = Utc::now() - Duration::minutes(45);
        let id = ready_draft(&db, "a@x.com", claimed_at).await;
        claim_next(&db, None, &[], claimed_at).await.unwrap().unwrap();

        let fresh = ready_draft(&db, "b@x.com", Utc::now()).await;
        claim_next(&db, None, &[], Utc::now()).await.unwrap().unwrap();

        let moved = cleanup_stale_claimed(&db, Duration::minutes(30), Utc::now())
            .await
            .unwrap();
        assert_eq!(moved, 1);

        let stale = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(stale.status, DraftStatus::Ready);
        assert!(stale.claimed_at.is_none());
        assert_eq!(get(&db, &fresh).await.unwrap().unwrap().status, DraftStatus::Claimed);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn interrupted_generation_is_skipped_and_frees_the_lead() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let old = NewDraft::initial("c1", &Recipient::new("old@x.com"));
        let CreateOutcome::Created(old) = create(&db, old, now - Duration::hours(2)).await.unwrap() else {
            panic!("expected Created");
        };
        let recent = NewDraft::initial("c1", &Recipient::new("new@x.com"));
        let CreateOutcome::Created(recent) = create(&db, recent, now - Duration::minutes(5)).await.unwrap() else {
            panic!("expected Created");
        };
        let done = ready_draft(&db, "done@x.com", now - Duration::hours(3)).await;

        let moved = cleanup_stale_generating(&db, Duration::minutes(30), now).await.unwrap();
        assert_eq!(moved, 1);

        let skipped = get(&db, &old).await.unwrap().unwrap();
        assert_eq!(skipped.status, DraftStatus::Skipped);
        assert_eq!(skipped.review_reason.as_deref(), Some("generation interrupted"));
        assert_eq!(get(&db, &recent).await.unwrap().unwrap().status, DraftStatus::Generating);
        assert_eq!(get(&db, &done).await.unwrap().unwrap().status, DraftStatus::Ready);

        // The lead can be drafted again.
        let retry = NewDraft::initial("c1", &Recipient::new("old@x.com"));
        assert!(matches!(create(&db, retry, now).await.unwrap(), CreateOutcome::Created(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn skip_suppressed_leaves_claimed_drafts_alone() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let claimed = ready_draft(&db, "x@y.com", now).await;
        claim_next(&db, None, &[], now).await.unwrap().unwrap();

        let followup = NewDraft {
            kind: MessageKind::Followup,
            followup_number: 1,
            thread: Some(ThreadRefs {
                in_reply_to: "<m@x>".into(),
                references: "<m@x>".into(),
            }),
            ..NewDraft::initial("c1", &Recipient::new("x@y.com"))
        };
        let CreateOutcome::Created(pending) = create(&db, followup, now).await.unwrap() else {
            panic!("expected Created");
        };

        suppression::add(&db, "x@y.com", SuppressionReason::HardBounce, None, now)
            .await
            .unwrap();
        assert_eq!(skip_suppressed(&db).await.unwrap(), 1);
        assert_eq!(get(&db, &pending).await.unwrap().unwrap().status, DraftStatus::Skipped);
        assert_eq!(get(&db, &claimed).await.unwrap().unwrap().status, DraftStatus::Claimed);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn counts_include_every_status() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        ready_draft(&db, "a@x.com", now).await;
        ready_draft(&db, "b@x.com", now).await;
        claim_next(&db, None, &[], now).await.unwrap();

        let counts = counts_by_status(&db).await.unwrap();
        assert_eq!(counts["ready"], 1);
        assert_eq!(counts["claimed"], 1);
        assert_eq!(counts["sent"], 0);
        assert_eq!(counts.len(), 7);
        assert_eq!(count_with_status(&db, DraftStatus::Ready).await.unwrap(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn campaign_count_ignores_dead_drafts() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        ready_draft(&db, "a@x.com", now).await;
        let dead = ready_draft(&db, "b@x.com", now).await;
        mark_skipped(&db, &dead, "test").await.unwrap();

        assert_eq!(count_for_campaign(&db, "c1", MessageKind::Initial).await.unwrap(), 1);
        assert_eq!(count_for_campaign(&db, "c1", MessageKind::Followup).await.unwrap(), 0);
        assert_eq!(count_for_campaign(&db, "c2", MessageKind::Initial).await.unwrap(), 0);
    }
}
