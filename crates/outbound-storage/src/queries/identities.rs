// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sending identity bookkeeping: first-seen anchors, policy blocks and
//! reputation snapshots.

use chrono::{DateTime, Utc};
use outbound_core::OutboundError;
use rusqlite::{OptionalExtension, params};

use crate::codec::{fmt_ts, ts_col};
use crate::database::{Database, map_tr_err};
use crate::models::{IdentityBlock, ReputationSnapshot};

/// Register a configured identity. The first call fixes `first_seen_at`;
/// later calls only refresh the display name. Returns the first-seen time.
pub async fn sync_identity(
    db: &Database,
    address: &str,
    display_name: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, OutboundError> {
    let address = address.trim().to_ascii_lowercase();
    let display_name = display_name.to_string();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO identities (address, display_name, first_seen_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(address) DO UPDATE SET display_name = excluded.display_name
                 RETURNING first_seen_at",
                params![address, display_name, now],
                |row| ts_col(row, 0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// When the identity was first registered.
pub async fn first_seen(
    db: &Database,
    address: &str,
) -> Result<Option<DateTime<Utc>>, OutboundError> {
    let address = address.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT first_seen_at FROM identities WHERE address = ?1",
                params![address],
                |row| ts_col(row, 0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Record a policy block.
pub async fn insert_block(
    db: &Database,
    identity: &str,
    reason: &str,
    blocked_at: DateTime<Utc>,
    blocked_until: DateTime<Utc>,
) -> Result<i64, OutboundError> {
    let identity = identity.to_string();
    let reason = reason.to_string();
    let blocked_at = fmt_ts(blocked_at);
    let blocked_until = fmt_ts(blocked_until);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO identity_blocks (identity, reason, blocked_at, blocked_until)
                 VALUES (?1, ?2, ?3, ?4)",
                params![identity, reason, blocked_at, blocked_until],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

fn block_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdentityBlock> {
    Ok(IdentityBlock {
        id: row.get(0)?,
        identity: row.get(1)?,
        reason: row.get(2)?,
        blocked_at: ts_col(row, 3)?,
        blocked_until: ts_col(row, 4)?,
    })
}

/// The most recent block on `identity`, active or expired.
pub async fn latest_block(
    db: &Database,
    identity: &str,
) -> Result<Option<IdentityBlock>, OutboundError> {
    let identity = identity.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, identity, reason, blocked_at, blocked_until FROM identity_blocks
                 WHERE identity = ?1 ORDER BY blocked_until DESC, id DESC LIMIT 1",
                params![identity],
                block_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Blocks placed on `identity` at or after `since`.
pub async fn blocks_since(
    db: &Database,
    identity: &str,
    since: DateTime<Utc>,
) -> Result<u64, OutboundError> {
    let identity = identity.to_string();
    let since = fmt_ts(since);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM identity_blocks WHERE identity = ?1 AND blocked_at >= ?2",
                params![identity, since],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Persist a reputation computation.
pub async fn insert_snapshot(
    db: &Database,
    snapshot: &ReputationSnapshot,
) -> Result<(), OutboundError> {
    let s = snapshot.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO reputation_snapshots
                     (identity, score, sends, bounce_rate, reply_rate, fail_rate, blocks, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    s.identity,
                    s.score,
                    s.sends,
                    s.bounce_rate,
                    s.reply_rate,
                    s.fail_rate,
                    s.blocks,
                    fmt_ts(s.computed_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The newest reputation snapshot for `identity`.
pub async fn latest_snapshot(
    db: &Database,
    identity: &str,
) -> Result<Option<ReputationSnapshot>, OutboundError> {
    let identity = identity.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT identity, score, sends, bounce_rate, reply_rate, fail_rate, blocks, computed_at
                 FROM reputation_snapshots WHERE identity = ?1
                 ORDER BY computed_at DESC, id DESC LIMIT 1",
                params![identity],
                |row| {
                    Ok(ReputationSnapshot {
                        identity: row.get(0)?,
                        score: row.get(1)?,
                        sends: row.get(2)?,
                        bounce_rate: row.get(3)?,
                        reply_rate: row.get(4)?,
                        fail_rate: row.get(5)?,
                        blocks: row.get(6)?,
                        computed_at: ts_col(row, 7)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn first_seen_is_fixed_by_first_sync() {
        let (db, _dir) = setup_db().await;
        let t0 = Utc::now() - Duration::days(30);
        let first = sync_identity(&db, "A@Me.com", "A", t0).await.unwrap();
        let again = sync_identity(&db, "a@me.com", "Alex", Utc::now()).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first_seen(&db, "a@me.com").await.unwrap(), Some(first));
        assert!(first_seen(&db, "b@me.com").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn latest_block_and_window_count() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        insert_block(&db, "a@me.com", "554 old", now - Duration::days(10), now - Duration::days(9))
            .await
            .unwrap();
        insert_block(&db, "a@me.com", "554 new", now, now + Duration::hours(24))
            .await
            .unwrap();

        let latest = latest_block(&db, "a@me.com").await.unwrap().unwrap();
        assert_eq!(latest.reason, "554 new");
        assert_eq!(blocks_since(&db, "a@me.com", now - Duration::days(3)).await.unwrap(), 1);
        assert!(latest_block(&db, "b@me.com").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn snapshots_return_newest() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        for (score, offset) in [(90, 2), (35, 1)] {
            insert_snapshot(
                &db,
                &ReputationSnapshot {
                    identity: "a@me.com".into(),
                    score,
                    sends: 10,
                    bounce_rate: 0.0,
                    reply_rate: 0.0,
                    fail_rate: 0.0,
                    blocks: 0,
                    computed_at: now - Duration::days(offset),
                },
            )
            .await
            .unwrap();
        }
        assert_eq!(latest_snapshot(&db, "a@me.com").await.unwrap().unwrap().score, 35);
        db.close().await.unwrap();
    }
}
