// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sending-identity pool for the Outbound campaign engine.
//!
//! [`AccountPool`] decides which identity may send right now, enforcing one
//! in-flight send per identity, daily quota with warm-up and warm-down,
//! cooldown spacing, reputation-based pausing and, through the injected
//! [`DomainTracker`], recipient-domain concentration limits.

pub mod domains;
pub mod pool;
pub mod quota;
pub mod reputation;

pub use domains::{DomainSlot, DomainTracker, is_webmail};
pub use pool::{AccountPool, Eligibility, IdentityLease, IdentityStatus, PoolSettings, WaitHint};
pub use quota::{BlockState, QuotaPolicy};
pub use reputation::Reputation;
