// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox side of the Outbound campaign engine.
//!
//! - **Classifier**: pattern rules for auto-replies, opt-outs and bounces
//! - **Scanner**: concurrent, timeout-bounded scans of every identity inbox,
//!   deduplicated through the processed-message table
//! - **IMAP**: the production [`InboundTransport`](outbound_core::InboundTransport)

pub mod classifier;
pub mod imap;
pub mod scanner;

pub use classifier::{classify_reply, extract_address, is_bounce_notification};
pub use imap::ImapTransport;
pub use scanner::{IdentityScanReport, MailboxScanner, ScanReport, ScanSettings};
