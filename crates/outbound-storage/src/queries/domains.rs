// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-day recipient-domain send counters.

use chrono::NaiveDate;
use outbound_core::OutboundError;
use rusqlite::{OptionalExtension, params};

use crate::codec::fmt_day;
use crate::database::{Database, map_tr_err};

/// Take one slot for `(day, domain)` if the count is still below `limit`.
/// Check and increment are one statement, so concurrent callers can never
/// push the count past the limit. Returns the new count, or `None` when the
/// domain is full.
pub async fn reserve(
    db: &Database,
    day: NaiveDate,
    domain: &str,
    limit: u32,
) -> Result<Option<u32>, OutboundError> {
    if limit == 0 {
        return Ok(None);
    }
    let day = fmt_day(day);
    let domain = domain.to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO domain_sends (day, domain, count) VALUES (?1, ?2, 1)
                 ON CONFLICT(day, domain) DO UPDATE SET count = count + 1
                 WHERE domain_sends.count < ?3
                 RETURNING count",
                params![day, domain, limit],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Give back a slot taken by [`reserve`] whose send never happened.
pub async fn unreserve(db: &Database, day: NaiveDate, domain: &str) -> Result<(), OutboundError> {
    let day = fmt_day(day);
    let domain = domain.to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE domain_sends SET count = count - 1
                 WHERE day = ?1 AND domain = ?2 AND count > 0",
                params![day, domain],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Sends to `domain` on `day`.
pub async fn count(db: &Database, day: NaiveDate, domain: &str) -> Result<u32, OutboundError> {
    let day = fmt_day(day);
    let domain = domain.to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            let count: Option<u32> = conn
                .query_row(
                    "SELECT count FROM domain_sends WHERE day = ?1 AND domain = ?2",
                    params![day, domain],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.unwrap_or(0))
        })
        .await
        .map_err(map_tr_err)
}

/// Every domain counter for `day`.
pub async fn counts_for_day(
    db: &Database,
    day: NaiveDate,
) -> Result<Vec<(String, u32)>, OutboundError> {
    let day = fmt_day(day);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn
                .prepare("SELECT domain, count FROM domain_sends WHERE day = ?1 ORDER BY domain")?;
            let rows = stmt.query_map(params![day], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Drop counters for days before `day`.
pub async fn purge_before(db: &Database, day: NaiveDate) -> Result<usize, OutboundError> {
    let day = fmt_day(day);
    db.connection()
        .call(move |conn| Ok(conn.execute("DELETE FROM domain_sends WHERE day < ?1", params![day])?))
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn concurrent_reservations_are_not_lost() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                reserve(&db, day, "Acme.com", 100).await.unwrap().unwrap()
            }));
        }
        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=20).collect::<Vec<u32>>());
        assert_eq!(count(&db, day, "acme.com").await.unwrap(), 20);

        let next_day = day.succ_opt().unwrap();
        assert_eq!(count(&db, next_day, "acme.com").await.unwrap(), 0);
        reserve(&db, next_day, "b.com", 100).await.unwrap();
        assert_eq!(purge_before(&db, next_day).await.unwrap(), 1);
        assert_eq!(counts_for_day(&db, next_day).await.unwrap(), vec![("b.com".to_string(), 1)]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reservations_stop_at_the_limit() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                reserve(&db, day, "acme.com", 3).await.unwrap()
            }));
        }
        let mut granted = 0;
        for h in handles {
            if h.await.unwrap().is_some() {
                granted += 1;
            }
        }
        assert_eq!(granted, 3);
        assert_eq!(count(&db, day, "acme.com").await.unwrap(), 3);

        unreserve(&db, day, "acme.com").await.unwrap();
        assert_eq!(count(&db, day, "acme.com").await.unwrap(), 2);
        assert_eq!(reserve(&db, day, "acme.com", 3).await.unwrap(), Some(3));
        assert_eq!(reserve(&db, day, "acme.com", 3).await.unwrap(), None);
        assert_eq!(reserve(&db, day, "other.com", 0).await.unwrap(), None);

        unreserve(&db, day, "never.com").await.unwrap();
        assert_eq!(count(&db, day, "never.com").await.unwrap(), 0);
        db.close().await.unwrap();
    }
}
