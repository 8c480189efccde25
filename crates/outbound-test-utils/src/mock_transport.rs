// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock mail transports.
//!
//! [`MockTransport`] captures outgoing messages and answers with scripted
//! outcomes. [`MockInbox`] holds injected inbound messages per identity and
//! tracks which ones were marked seen.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use outbound_core::traits::{InboundTransport, OutboundTransport, PluginAdapter};
use outbound_core::types::{
    AdapterType, HealthStatus, InboundMessage, OutgoingMessage, SendOutcome, SendingIdentity,
};
use outbound_core::OutboundError;

/// A message captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub identity: String,
    pub message: OutgoingMessage,
}

/// Outbound transport that records every message.
///
/// Outcomes are popped from a FIFO queue; an empty queue means delivery
/// succeeds with a generated message id.
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Result<SendOutcome, String>>>,
    sent: Mutex<Vec<SentMessage>>,
    delay: Option<Duration>,
    counter: AtomicU64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            delay: None,
            counter: AtomicU64::new(0),
        }
    }

    /// Every send sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push_outcome(&self, outcome: SendOutcome) {
        self.outcomes.lock().await.push_back(Ok(outcome));
    }

    /// The next send returns a transport error instead of an outcome.
    pub async fn push_error(&self, message: &str) {
        self.outcomes.lock().await.push_back(Err(message.to_string()));
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl OutboundTransport for MockTransport {
    async fn send(
        &self,
        identity: &SendingIdentity,
        message: &OutgoingMessage,
    ) -> Result<SendOutcome, OutboundError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().await.push(SentMessage {
            identity: identity.address.clone(),
            message: message.clone(),
        });
        match self.outcomes.lock().await.pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(OutboundError::transport(message)),
            None => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
                Ok(SendOutcome::delivered(format!("<mock-{n}@outbound.test>")))
            }
        }
    }
}

#[derive(Default)]
struct InboxState {
    mailboxes: HashMap<String, Vec<InboundMessage>>,
    seen: HashMap<String, HashSet<String>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    fetches: usize,
}

/// Inbound transport backed by per-identity message lists.
#[derive(Default)]
pub struct MockInbox {
    state: Mutex<InboxState>,
    redeliver: bool,
}

impl MockInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return every message on every fetch, ignoring the seen flag, the
    /// way a server does when the flag update was lost.
    pub fn redelivering() -> Self {
        Self {
            state: Mutex::new(InboxState::default()),
            redeliver: true,
        }
    }

    pub async fn deliver(&self, identity: &str, message: InboundMessage) {
        self.state
            .lock()
            .await
            .mailboxes
            .entry(identity.to_ascii_lowercase())
            .or_default()
            .push(message);
    }

    /// Fetches for `identity` fail with a mailbox error.
    pub async fn fail_for(&self, identity: &str) {
        self.state.lock().await.failing.insert(identity.to_ascii_lowercase());
    }

    /// Fetches for `identity` stall for `delay` first.
    pub async fn delay_for(&self, identity: &str, delay: Duration) {
        self.state
            .lock()
            .await
            .delays
            .insert(identity.to_ascii_lowercase(), delay);
    }

    pub async fn seen(&self, identity: &str) -> HashSet<String> {
        self.state
            .lock()
            .await
            .seen
            .get(&identity.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub async fn fetch_count(&self) -> usize {
        self.state.lock().await.fetches
    }
}

#[async_trait]
impl PluginAdapter for MockInbox {
    fn name(&self) -> &str {
        "mock-inbox"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inbox
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl InboundTransport for MockInbox {
    async fn fetch_unseen_since(
        &self,
        identity: &SendingIdentity,
        _lookback_days: u32,
    ) -> Result<Vec<InboundMessage>, OutboundError> {
        let address = identity.address.to_ascii_lowercase();
        let delay = {
            let mut state = self.state.lock().await;
            state.fetches += 1;
            if state.failing.contains(&address) {
                return Err(OutboundError::mailbox(format!("mock login failed for {address}")));
            }
            state.delays.get(&address).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().await;
        let seen = state.seen.get(&address);
        Ok(state
            .mailboxes
            .get(&address)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| self.redeliver || seen.is_none_or(|s| !s.contains(&m.message_id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn mark_seen(
        &self,
        identity: &SendingIdentity,
        message_ids: &[String],
    ) -> Result<(), OutboundError> {
        self.state
            .lock()
            .await
            .seen
            .entry(identity.address.to_ascii_lowercase())
            .or_default()
            .extend(message_ids.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(address: &str) -> SendingIdentity {
        SendingIdentity {
            address: address.into(),
            display_name: "Sender".into(),
            password: "pw".into(),
            daily_limit: None,
            warmup_start: None,
        }
    }

    fn inbound(id: &str) -> InboundMessage {
        InboundMessage {
            message_id: id.into(),
            from: "lead@x.com".into(),
            subject: "Re: hello".into(),
            body: "sounds good".into(),
            in_reply_to: None,
        }
    }

    #[tokio::test]
    async fn transport_defaults_to_delivery() {
        let transport = MockTransport::new();
        transport.push_outcome(SendOutcome::failed("554 blocked", Some(554))).await;
        let message = OutgoingMessage {
            to: "lead@x.com".into(),
            to_name: None,
            subject: "s".into(),
            body: "b".into(),
            body_html: None,
            thread: None,
        };

        let first = transport.send(&identity("a@b.com"), &message).await.unwrap();
        let second = transport.send(&identity("a@b.com"), &message).await.unwrap();
        assert!(first.is_policy_block());
        assert!(second.success);
        assert_eq!(transport.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn seen_messages_are_not_refetched() {
        let inbox = MockInbox::new();
        let me = identity("a@b.com");
        inbox.deliver("a@b.com", inbound("<1@x>")).await;

        assert_eq!(inbox.fetch_unseen_since(&me, 7).await.unwrap().len(), 1);
        inbox.mark_seen(&me, &["<1@x>".to_string()]).await.unwrap();
        assert!(inbox.fetch_unseen_since(&me, 7).await.unwrap().is_empty());

        let redelivering = MockInbox::redelivering();
        redelivering.deliver("a@b.com", inbound("<1@x>")).await;
        redelivering.mark_seen(&me, &["<1@x>".to_string()]).await.unwrap();
        assert_eq!(redelivering.fetch_unseen_since(&me, 7).await.unwrap().len(), 1);
    }
}
