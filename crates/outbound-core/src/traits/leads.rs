// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead source trait for recipient acquisition.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::OutboundError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Recipient;

/// Supplies candidate recipients for a campaign.
///
/// The criteria string is opaque to the engine.
#[async_trait]
pub trait LeadSource: PluginAdapter {
    /// Return up to `limit` candidates whose lowercased address is not in `exclude`.
    async fn fetch_candidates(
        &self,
        criteria: &str,
        limit: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Recipient>, OutboundError>;
}
