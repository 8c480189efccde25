// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All reads and writes go through one `tokio_rusqlite::Connection`, whose
//! background thread serializes every closure. That serialization is what
//! makes the draft claim and the counter increments atomic with respect to
//! each other. Do NOT open additional connections for writes.

use outbound_core::OutboundError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Per-connection PRAGMAs.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA busy_timeout = 5000;
    PRAGMA foreign_keys = ON;
    PRAGMA synchronous = NORMAL;
";

/// Convert a tokio-rusqlite error into `OutboundError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> OutboundError {
    OutboundError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database.
///
/// Cloning is cheap and every clone shares the same background connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) and migrate the database at `path`.
    ///
    /// Migrations run on a short-lived synchronous connection before the
    /// shared async connection is opened.
    pub async fn open(path: &str) -> Result<Self, OutboundError> {
        Self::open_with(path, true).await
    }

    /// Open the database, optionally keeping the rollback journal instead of WAL.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, OutboundError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| OutboundError::Storage {
                source: Box::new(e),
            })?;
        }

        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), OutboundError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(|e| OutboundError::Storage {
                    source: Box::new(e),
                })?;
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")
                    .map_err(|e| OutboundError::Storage {
                        source: Box::new(e),
                    })?;
            }
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| OutboundError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| OutboundError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(CONNECTION_PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The shared async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Verify the connection answers a trivial query.
    pub async fn ping(&self) -> Result<(), OutboundError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), OutboundError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        self.conn.close().await.map_err(|e| OutboundError::Storage {
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("outbound.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        for table in ["drafts", "send_records", "suppression", "processed_messages", "domain_sends"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("outbound.db");
        let path = path.to_str().unwrap();

        Database::open(path).await.unwrap().close().await.unwrap();
        let db = Database::open(path).await.unwrap();
        db.ping().await.unwrap();
        db.close().await.unwrap();
    }
}
