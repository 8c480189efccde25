// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Outbound campaign engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for the draft
//! queue, send records, suppression list, processed-message dedup, domain
//! counters, identity blocks, reputation snapshots and scheduler bookkeeping.
//!
//! Every timestamp is supplied by the caller so that time-dependent behavior
//! (stale claims, rolling windows) is driven by an injectable clock.

pub mod codec;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
