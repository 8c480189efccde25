// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Everything the engine talks to outside its own storage sits behind one of
//! these traits. All extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod alert;
pub mod generator;
pub mod leads;
pub mod transport;

pub use adapter::PluginAdapter;
pub use alert::Alerter;
pub use generator::ContentGenerator;
pub use leads::LeadSource;
pub use transport::{InboundTransport, OutboundTransport};
