// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dedup set of inbound messages already classified, keyed per identity.

use chrono::{DateTime, Utc};
use outbound_core::OutboundError;
use rusqlite::params;

use crate::codec::fmt_ts;
use crate::database::{Database, map_tr_err};

/// Whether `(identity, message_id)` has been processed.
pub async fn is_processed(
    db: &Database,
    identity: &str,
    message_id: &str,
) -> Result<bool, OutboundError> {
    let identity = identity.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM processed_messages WHERE identity = ?1 AND message_id = ?2)",
                params![identity, message_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Record a processed message. Returns `false` if it was already recorded.
pub async fn mark_processed(
    db: &Database,
    identity: &str,
    message_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, OutboundError> {
    let identity = identity.to_string();
    let message_id = message_id.to_string();
    let processed_at = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO processed_messages (identity, message_id, processed_at)
                 VALUES (?1, ?2, ?3)",
                params![identity, message_id, processed_at],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete entries processed before `cutoff`. Returns how many were removed.
pub async fn purge_older_than(db: &Database, cutoff: DateTime<Utc>) -> Result<usize, OutboundError> {
    let cutoff = fmt_ts(cutoff);
    db.connection()
        .call(move |conn| {
            Ok(conn.execute(
                "DELETE FROM processed_messages WHERE processed_at < ?1",
                params![cutoff],
            )?)
        })
        .await
        .map_err(map_tr_err)
}
