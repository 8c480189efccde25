// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient (lead) rows.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use outbound_core::OutboundError;
use outbound_core::types::Recipient;
use rusqlite::{OptionalExtension, params};

use crate::codec::fmt_ts;
use crate::database::{Database, map_tr_err};

fn recipient_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recipient> {
    Ok(Recipient {
        email: row.get(0)?,
        name: row.get(1)?,
        company: row.get(2)?,
        title: row.get(3)?,
        campaign_id: row.get(4)?,
    })
}

/// Insert a recipient, filling in missing details on an existing row.
/// Returns `true` if the row is new.
pub async fn upsert(
    db: &Database,
    recipient: &Recipient,
    now: DateTime<Utc>,
) -> Result<bool, OutboundError> {
    let r = Recipient {
        email: recipient.email.trim().to_ascii_lowercase(),
        ..recipient.clone()
    };
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM recipients WHERE email = ?1)",
                params![r.email],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO recipients (email, name, company, title, campaign_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(email) DO UPDATE SET
                     name = COALESCE(recipients.name, excluded.name),
                     company = COALESCE(recipients.company, excluded.company),
                     title = COALESCE(recipients.title, excluded.title),
                     campaign_id = COALESCE(recipients.campaign_id, excluded.campaign_id)",
                params![r.email, r.name, r.company, r.title, r.campaign_id, now],
            )?;
            tx.commit()?;
            Ok(!exists)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a recipient by address.
pub async fn get(db: &Database, email: &str) -> Result<Option<Recipient>, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT email, name, company, title, campaign_id FROM recipients WHERE email = ?1",
                params![email],
                recipient_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Flag an address as undeliverable, creating its row if it was never
/// imported.
pub async fn mark_invalid(
    db: &Database,
    email: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(), OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    let reason = reason.to_string();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO recipients (email, invalid, invalid_reason, created_at)
                 VALUES (?1, 1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET invalid = 1, invalid_reason = excluded.invalid_reason",
                params![email, reason, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Whether the address is flagged invalid.
pub async fn is_invalid(db: &Database, email: &str) -> Result<bool, OutboundError> {
    let email = email.trim().to_ascii_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM recipients WHERE email = ?1 AND invalid = 1)",
                params![email],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Valid, never-drafted recipients matching `criteria`.
///
/// An empty `criteria` matches everything. Otherwise a row matches when its
/// campaign tag equals `criteria` or its company or title contains it.
pub async fn candidates(
    db: &Database,
    criteria: &str,
    limit: usize,
    exclude: &HashSet<String>,
) -> Result<Vec<Recipient>, OutboundError> {
    let criteria = criteria.trim().to_string();
    let exclude = exclude.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT email, name, company, title, campaign_id FROM recipients r
                 WHERE invalid = 0
                   AND NOT EXISTS (SELECT 1 FROM suppression s WHERE s.email = r.email)
                   AND NOT EXISTS (SELECT 1 FROM drafts d WHERE d.recipient_email = r.email)
                   AND (?1 = ''
                        OR campaign_id = ?1
                        OR instr(lower(COALESCE(company, '')), lower(?1)) > 0
                        OR instr(lower(COALESCE(title, '')), lower(?1)) > 0)
                 ORDER BY created_at, email",
            )?;
            let rows = stmt.query_map(params![criteria], recipient_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                let recipient = row?;
                if exclude.contains(&recipient.email) {
                    continue;
                }
                out.push(recipient);
                if out.len() >= limit {
                    break;
                }
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Total stored recipients.
pub async fn count(db: &Database) -> Result<u64, OutboundError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM recipients", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upsert_fills_gaps_without_overwriting() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let now = Utc::now();

        let bare = Recipient::new("Jane@Acme.com");
        assert!(upsert(&db, &bare, now).await.unwrap());
        let detailed = Recipient {
            name: Some("Jane Doe".into()),
            company: Some("Acme".into()),
            ..Recipient::new("jane@acme.com")
        };
        assert!(!upsert(&db, &detailed, now).await.unwrap());

        let stored = get(&db, "jane@acme.com").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Jane Doe"));
        assert_eq!(count(&db).await.unwrap(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn candidates_filter_invalid_excluded_and_criteria() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let now = Utc::now();
        for (email, company) in [
            ("a@acme.com", "Acme Agency"),
            ("b@bolt.com", "Bolt Labs"),
            ("c@cargo.com", "Cargo Agency"),
            ("d@delta.com", "Delta Agency"),
        ] {
            let r = Recipient {
                company: Some(company.into()),
                ..Recipient::new(email)
            };
            upsert(&db, &r, now).await.unwrap();
        }
        mark_invalid(&db, "c@cargo.com", "hard bounce", now).await.unwrap();
        assert!(is_invalid(&db, "c@cargo.com").await.unwrap());

        let exclude: HashSet<String> = ["d@delta.com".to_string()].into();
        let found = candidates(&db, "agency", 10, &exclude).await.unwrap();
        let emails: Vec<_> = found.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["a@acme.com"]);

        let all = candidates(&db, "", 2, &HashSet::new()).await.unwrap();
        assert_eq!(all.len(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_address_can_be_marked_invalid() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let now = Utc::now();
        assert!(!is_invalid(&db, "x@y.com").await.unwrap());

        mark_invalid(&db, "X@y.com", "hard bounce", now).await.unwrap();
        assert!(is_invalid(&db, "x@y.com").await.unwrap());
        assert_eq!(count(&db).await.unwrap(), 1);

        // A later import keeps the flag.
        upsert(&db, &Recipient::new("x@y.com"), now).await.unwrap();
        assert!(is_invalid(&db, "x@y.com").await.unwrap());
        assert!(candidates(&db, "", 10, &HashSet::new()).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
