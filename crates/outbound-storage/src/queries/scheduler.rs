// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler bookkeeping: fired run keys and component heartbeats.

use chrono::{DateTime, Utc};
use outbound_core::OutboundError;
use rusqlite::{OptionalExtension, params};

use crate::codec::{fmt_ts, ts_col};
use crate::database::{Database, map_tr_err};
use crate::models::Heartbeat;

/// Record that the trigger identified by `run_key` fired.
///
/// Returns `false` if the key was already recorded, meaning the run must not
/// fire again.
pub async fn try_record_run(
    db: &Database,
    run_key: &str,
    now: DateTime<Utc>,
) -> Result<bool, OutboundError> {
    let run_key = run_key.to_string();
    let fired_at = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO scheduler_runs (run_key, fired_at) VALUES (?1, ?2)",
                params![run_key, fired_at],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Whether `run_key` has already fired.
pub async fn has_run(db: &Database, run_key: &str) -> Result<bool, OutboundError> {
    let run_key = run_key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM scheduler_runs WHERE run_key = ?1)",
                params![run_key],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert the liveness marker for `component`.
pub async fn beat(
    db: &Database,
    component: &str,
    detail: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), OutboundError> {
    let component = component.to_string();
    let detail = detail.map(str::to_string);
    let beat_at = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO heartbeats (component, beat_at, detail) VALUES (?1, ?2, ?3)
                 ON CONFLICT(component) DO UPDATE SET beat_at = excluded.beat_at,
                     detail = excluded.detail",
                params![component, beat_at, detail],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The last heartbeat written by `component`.
pub async fn last_beat(db: &Database, component: &str) -> Result<Option<Heartbeat>, OutboundError> {
    let component = component.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT component, beat_at, detail FROM heartbeats WHERE component = ?1",
                params![component],
                |row| {
                    Ok(Heartbeat {
                        component: row.get(0)?,
                        beat_at: ts_col(row, 1)?,
                        detail: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
