// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Do-not-contact list. Append-only.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use outbound_core::OutboundError;
use outbound_core::types::{SuppressionEntry, SuppressionReason};
use rusqlite::{OptionalExtension, params};

use crate::codec::{enum_col, fmt_ts, ts_col};
use crate::database::{Database, map_tr_err};

/// Suppress an address. Returns `false` if it was already suppressed, in
/// which case the original reason is kept.
pub async fn add(
    db: &Database,
    email: &str,
    reason: SuppressionReason,
    detail: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    let reason = reason.to_string();
    let detail = detail.map(str::to_string);
    let created_at = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO suppression (email, reason, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, reason, detail, created_at],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Whether the address is suppressed.
pub async fn is_suppressed(db: &Database, email: &str) -> Result<bool, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM suppression WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Look up the suppression entry for an address.
pub async fn get(db: &Database, email: &str) -> Result<Option<SuppressionEntry>, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT email, reason, detail, created_at FROM suppression WHERE email = ?1",
                params![email],
                |row| {
                    Ok(SuppressionEntry {
                        email: row.get(0)?,
                        reason: enum_col(row, 1)?,
                        detail: row.get(2)?,
                        created_at: ts_col(row, 3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Total number of suppressed addresses.
pub async fn count(db: &Database) -> Result<u64, OutboundError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM suppression", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}

/// Every suppressed address.
pub async fn all_addresses(db: &Database) -> Result<HashSet<String>, OutboundError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT email FROM suppression")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn first_reason_wins() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let now = Utc::now();

        assert!(add(&db, "X@Y.com", SuppressionReason::HardBounce, Some("550"), now).await.unwrap());
        assert!(!add(&db, "x@y.com", SuppressionReason::Manual, None, now).await.unwrap());

        let entry = get(&db, "x@y.com").await.unwrap().unwrap();
        assert_eq!(entry.reason, SuppressionReason::HardBounce);
        assert_eq!(entry.detail.as_deref(), Some("550"));
        assert!(is_suppressed(&db, " X@y.COM ").await.unwrap());
        assert_eq!(count(&db).await.unwrap(), 1);
        assert!(all_addresses(&db).await.unwrap().contains("x@y.com"));
        db.close().await.unwrap();
    }
}
