// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for operations on storage entities.

pub mod campaigns;
pub mod domains;
pub mod drafts;
pub mod identities;
pub mod processed;
pub mod recipients;
pub mod scheduler;
pub mod send_records;
pub mod suppression;
