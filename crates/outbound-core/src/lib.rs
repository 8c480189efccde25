// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Outbound campaign engine.
//!
//! This crate provides the error type, the domain records shared by every
//! component (drafts, send records, suppression entries, identities), and the
//! collaborator traits through which the engine reaches lead sources, content
//! generators, mail transports and alert channels.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::OutboundError;
pub use types::{AdapterType, AlertSeverity, DraftStatus, HealthStatus, MessageKind};

pub use traits::{
    Alerter, ContentGenerator, InboundTransport, LeadSource, OutboundTransport, PluginAdapter,
};
