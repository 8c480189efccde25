// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage entity types.
//!
//! Records that cross component boundaries live in `outbound-core::types` and
//! are re-exported here. The types defined below are storage-shaped inputs
//! and aggregates that only the persistence layer and its callers use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use outbound_core::types::{
    BounceKind, Campaign, CampaignCounter, CampaignCounters, CampaignStatus, CreateOutcome, Draft,
    NewDraft, Recipient, SendRecord, SendStatus, SuppressionEntry, SuppressionReason,
};

/// Campaign definition synchronized from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCampaign {
    pub id: String,
    pub name: String,
    pub description: String,
    pub target: String,
    pub max_recipients: u32,
    pub status: CampaignStatus,
}

/// A send attempt to persist after the transport returns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSendRecord {
    pub draft: Draft,
    pub identity: String,
    pub status: SendStatus,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// A provider policy block on an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBlock {
    pub id: i64,
    pub identity: String,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub blocked_until: DateTime<Utc>,
}

/// Send outcome counts for one identity over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    pub sends: u64,
    pub bounces: u64,
    pub replies: u64,
    pub failures: u64,
}

/// A persisted reputation computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationSnapshot {
    pub identity: String,
    pub score: u32,
    pub sends: u64,
    pub bounce_rate: f64,
    pub reply_rate: f64,
    pub fail_rate: f64,
    pub blocks: u64,
    pub computed_at: DateTime<Utc>,
}

/// Send outcome totals across all identities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTotals {
    pub sent: u64,
    pub replied: u64,
    pub bounced: u64,
    pub failed: u64,
}

/// Last liveness marker written by a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub component: String,
    pub beat_at: DateTime<Utc>,
    pub detail: Option<String>,
}
