// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mail protocol traits for sending and for reading identity inboxes.

use async_trait::async_trait;

use crate::error::OutboundError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundMessage, OutgoingMessage, SendOutcome, SendingIdentity};

/// Transmits messages on behalf of a sending identity.
#[async_trait]
pub trait OutboundTransport: PluginAdapter {
    /// Send one message. Delivery failures are reported in the outcome;
    /// `Err` is reserved for failures to even attempt the send.
    async fn send(
        &self,
        identity: &SendingIdentity,
        message: &OutgoingMessage,
    ) -> Result<SendOutcome, OutboundError>;
}

/// Reads an identity's inbox.
#[async_trait]
pub trait InboundTransport: PluginAdapter {
    /// Messages not yet marked seen, received within the last `lookback_days`.
    async fn fetch_unseen_since(
        &self,
        identity: &SendingIdentity,
        lookback_days: u32,
    ) -> Result<Vec<InboundMessage>, OutboundError>;

    /// Flag the given messages as seen.
    async fn mark_seen(
        &self,
        identity: &SendingIdentity,
        message_ids: &[String],
    ) -> Result<(), OutboundError>;
}
