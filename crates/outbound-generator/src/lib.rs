// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Draft production for the Outbound campaign engine.
//!
//! This crate provides:
//! - **Lead sources**: a re-read CSV file and the stored recipients table
//! - **Template generator**: rendered templates with a rule-based reviewer
//! - **Review loop**: bounded review-and-rewrite keeping the best attempt
//! - **Draft producer**: follow-up planning and `ready` queue top-up

pub mod leads;
pub mod producer;
pub mod review;
pub mod template;

pub use leads::{CsvLeadSource, ImportReport, TableLeadSource, import_leads, parse_leads};
pub use producer::{DraftProducer, ProducerSettings, ProducerStats, sync_campaigns};
pub use review::{ReviewOutcome, review_loop};
pub use template::{ReviewRules, TemplateGenerator};
