// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content generator trait: drafting, reviewing and rewriting message content.

use async_trait::async_trait;

use crate::error::OutboundError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CampaignContext, DraftContent, PriorSend, Recipient, ReviewResult};

/// Produces and scores message content.
///
/// `None` from a generate call means the generator declined this recipient;
/// it is not an error.
#[async_trait]
pub trait ContentGenerator: PluginAdapter {
    /// Draft a first-contact message.
    async fn generate_initial(
        &self,
        recipient: &Recipient,
        ctx: &CampaignContext,
    ) -> Result<Option<DraftContent>, OutboundError>;

    /// Draft follow-up number `sequence` given the messages already sent.
    async fn generate_followup(
        &self,
        recipient: &Recipient,
        ctx: &CampaignContext,
        prior: &[PriorSend],
        sequence: u32,
    ) -> Result<Option<DraftContent>, OutboundError>;

    /// Score content for quality.
    async fn review(
        &self,
        content: &DraftContent,
        recipient: &Recipient,
    ) -> Result<ReviewResult, OutboundError>;

    /// Produce an improved version of `content` addressing `review`.
    async fn rewrite(
        &self,
        content: &DraftContent,
        review: &ReviewResult,
        ctx: &CampaignContext,
    ) -> Result<DraftContent, OutboundError>;
}
