// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Outbound workspace.
//!
//! Persisted enums derive strum `Display`/`EnumString` with snake_case names;
//! those strings are what the storage layer writes and parses back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Types of collaborator adapters that can be plugged into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    /// Recipient candidate source.
    LeadSource,
    /// Message content generator and reviewer.
    Generator,
    /// Outbound mail protocol.
    Transport,
    /// Inbound mailbox protocol.
    Inbox,
    /// Operator notifications.
    Alerter,
}

/// Health status reported by an adapter's health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// The position of a draft within a recipient's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// First contact.
    Initial,
    /// Reply in the same thread as the previous message.
    Followup,
    /// Follow-up that starts a fresh thread.
    FollowupNewThread,
}

/// Lifecycle status of a draft.
///
/// ```text
/// generating -> ready | review_failed
/// ready -> claimed -> sent | failed
/// claimed -> ready                      (stale lease or explicit release)
/// generating | ready | review_failed -> skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Generating,
    ReviewFailed,
    Ready,
    Claimed,
    Sent,
    Failed,
    Skipped,
}

impl DraftStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: DraftStatus) -> bool {
        use DraftStatus::*;
        matches!(
            (self, next),
            (Generating, Ready)
                | (Generating, ReviewFailed)
                | (Ready, Claimed)
                | (Claimed, Sent)
                | (Claimed, Failed)
                | (Claimed, Ready)
                | (Generating, Skipped)
                | (Ready, Skipped)
                | (ReviewFailed, Skipped)
        )
    }

    /// Statuses from which `next` can be reached. Used to build guarded updates.
    pub fn predecessors(next: DraftStatus) -> Vec<DraftStatus> {
        ALL_DRAFT_STATUSES
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, DraftStatus::Sent | DraftStatus::Failed | DraftStatus::Skipped)
    }

    /// Counts toward the one-draft-per-(recipient, campaign, kind, sequence) rule.
    pub fn blocks_duplicates(self) -> bool {
        !matches!(self, DraftStatus::Failed | DraftStatus::Skipped)
    }
}

/// Every draft status, in lifecycle order.
pub const ALL_DRAFT_STATUSES: [DraftStatus; 7] = [
    DraftStatus::Generating,
    DraftStatus::ReviewFailed,
    DraftStatus::Ready,
    DraftStatus::Claimed,
    DraftStatus::Sent,
    DraftStatus::Failed,
    DraftStatus::Skipped,
];

/// One outbound message candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub campaign_id: String,
    /// Sending identity. Set on follow-ups to the thread owner, and on send.
    pub identity: Option<String>,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub recipient_domain: String,
    pub kind: MessageKind,
    pub followup_number: u32,
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub quality_score: Option<u32>,
    pub status: DraftStatus,
    pub review_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
    pub last_error: Option<String>,
    pub retry_count: u32,
}

impl Draft {
    /// Threading headers for this draft, if it continues a thread.
    pub fn thread_refs(&self) -> Option<ThreadRefs> {
        self.in_reply_to.as_ref().map(|id| ThreadRefs {
            in_reply_to: id.clone(),
            references: self.references.clone().unwrap_or_else(|| id.clone()),
        })
    }
}

/// Input for creating a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDraft {
    pub campaign_id: String,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub kind: MessageKind,
    pub followup_number: u32,
    pub preferred_identity: Option<String>,
    pub thread: Option<ThreadRefs>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewDraft {
    /// A first-contact draft with no threading.
    pub fn initial(campaign_id: &str, recipient: &Recipient) -> Self {
        Self {
            campaign_id: campaign_id.to_string(),
            recipient_email: recipient.email.clone(),
            recipient_name: recipient.name.clone(),
            kind: MessageKind::Initial,
            followup_number: 0,
            preferred_identity: None,
            thread: None,
            scheduled_at: None,
        }
    }
}

/// Result of attempting to create a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new draft was inserted in `generating`.
    Created(String),
    /// A live draft already exists for the same key.
    Duplicate(String),
    /// The recipient is on the suppression list.
    Suppressed,
}

/// Message threading headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRefs {
    pub in_reply_to: String,
    pub references: String,
}

/// Why an address must never be contacted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    HardBounce,
    Unsubscribe,
    PermanentAutoReply,
    Manual,
}

/// A do-not-contact entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub email: String,
    pub reason: SuppressionReason,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Status of a durable send record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Replied,
    Bounced,
    Failed,
}

/// Permanence of a delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BounceKind {
    Hard,
    Soft,
}

/// A transmitted (or attempted) message, kept for reply and bounce correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRecord {
    pub id: String,
    pub draft_id: String,
    pub campaign_id: String,
    pub recipient_email: String,
    pub recipient_domain: String,
    pub identity: String,
    pub kind: MessageKind,
    pub followup_number: u32,
    pub subject: String,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub status: SendStatus,
    pub bounce_kind: Option<BounceKind>,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub replied_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

/// A campaign together with its aggregate counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
    /// Opaque criteria handed to the lead source.
    pub target: String,
    pub max_recipients: u32,
    pub counters: CampaignCounters,
    pub created_at: DateTime<Utc>,
}

/// Aggregate per-campaign outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCounters {
    pub sent: u64,
    pub replied: u64,
    pub bounced: u64,
    pub failed: u64,
}

/// Counter columns on a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CampaignCounter {
    #[strum(serialize = "sent_count")]
    Sent,
    #[strum(serialize = "reply_count")]
    Replied,
    #[strum(serialize = "bounce_count")]
    Bounced,
    #[strum(serialize = "failed_count")]
    Failed,
}

/// A candidate recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub campaign_id: Option<String>,
}

impl Recipient {
    /// A recipient with only an address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            company: None,
            title: None,
            campaign_id: None,
        }
    }

    /// First token of the name, for greetings.
    pub fn first_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
    }
}

/// Campaign context handed to the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignContext {
    pub campaign_id: String,
    pub name: String,
    pub description: String,
    pub sender_name: String,
    pub company: String,
}

/// Generated message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
}

/// Result of one quality review pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// 0..=100.
    pub score: u32,
    pub must_rewrite: bool,
    pub issues: Vec<String>,
}

/// A previous message sent to the same recipient, for follow-up generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorSend {
    pub subject: String,
    pub message_id: Option<String>,
    pub identity: String,
    pub followup_number: u32,
    pub sent_at: DateTime<Utc>,
}

/// A configured sending mailbox.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendingIdentity {
    pub address: String,
    pub display_name: String,
    pub password: String,
    /// Per-identity cap overriding the configured mailbox limit.
    pub daily_limit: Option<u32>,
    /// Start of warm-up. Defaults to the first time the identity was seen.
    pub warmup_start: Option<NaiveDate>,
}

impl std::fmt::Debug for SendingIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendingIdentity")
            .field("address", &self.address)
            .field("display_name", &self.display_name)
            .field("password", &"[REDACTED]")
            .field("daily_limit", &self.daily_limit)
            .field("warmup_start", &self.warmup_start)
            .finish()
    }
}

/// A fully rendered message ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
    pub thread: Option<ThreadRefs>,
}

impl OutgoingMessage {
    /// Build the message for a claimed draft.
    pub fn from_draft(draft: &Draft) -> Self {
        Self {
            to: draft.recipient_email.clone(),
            to_name: draft.recipient_name.clone(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            body_html: draft.body_html.clone(),
            thread: draft.thread_refs(),
        }
    }
}

/// SMTP reply code used by providers to reject a sender on policy grounds.
pub const POLICY_BLOCK_CODE: u16 = 554;

/// Result reported by an outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<u16>,
}

impl SendOutcome {
    /// A successful send with the transport-assigned message id.
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
            error_code: None,
        }
    }

    /// A failed send.
    pub fn failed(error: impl Into<String>, error_code: Option<u16>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            error_code,
        }
    }

    /// The provider rejected the sending identity itself.
    pub fn is_policy_block(&self) -> bool {
        if self.success {
            return false;
        }
        self.error_code == Some(POLICY_BLOCK_CODE)
            || self
                .error
                .as_deref()
                .is_some_and(|e| e.contains(&POLICY_BLOCK_CODE.to_string()))
    }
}

/// A message fetched from an identity's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Stable per-mailbox identifier (Message-ID header, or the IMAP UID).
    pub message_id: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
}

/// What a scanned inbound message turned out to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// A genuine human reply.
    Reply,
    /// Temporary out-of-office.
    AutoReply,
    /// Recipient left, or mailbox no longer monitored.
    PermanentAutoReply,
    /// Opt-out request.
    Unsubscribe,
    /// Temporary delivery failure for `address`.
    SoftBounce { address: String },
    /// Permanent delivery failure for `address`.
    HardBounce { address: String },
    /// Nothing actionable.
    None,
}

/// Severity attached to operator alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Lowercased domain part of an address, or empty if there is none.
pub fn domain_of(address: &str) -> String {
    address
        .rsplit_once('@')
        .map(|(_, d)| d.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn draft_status_round_trips_snake_case() {
        assert_eq!(DraftStatus::ReviewFailed.to_string(), "review_failed");
        assert_eq!(
            DraftStatus::from_str("review_failed").unwrap(),
            DraftStatus::ReviewFailed
        );
        assert!(DraftStatus::from_str("bogus").is_err());
    }

    #[test]
    fn lifecycle_allows_only_documented_edges() {
        use DraftStatus::*;
        assert!(Generating.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Claimed));
        assert!(Claimed.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Sent));
        assert!(!Sent.can_transition_to(Ready));
        assert!(!Claimed.can_transition_to(Skipped));
        assert!(!Failed.can_transition_to(Ready));
    }

    #[test]
    fn predecessors_of_claimed_is_ready_only() {
        assert_eq!(
            DraftStatus::predecessors(DraftStatus::Claimed),
            vec![DraftStatus::Ready]
        );
        let skip_from = DraftStatus::predecessors(DraftStatus::Skipped);
        assert_eq!(skip_from.len(), 3);
        assert!(!skip_from.contains(&DraftStatus::Claimed));
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        for s in ALL_DRAFT_STATUSES.iter().filter(|s| s.is_terminal()) {
            for next in ALL_DRAFT_STATUSES {
                assert!(!s.can_transition_to(next), "{s} -> {next}");
            }
        }
    }

    #[test]
    fn message_kind_strings() {
        assert_eq!(MessageKind::FollowupNewThread.to_string(), "followup_new_thread");
        assert_eq!(MessageKind::from_str("initial").unwrap(), MessageKind::Initial);
    }

    #[test]
    fn policy_block_detection() {
        assert!(SendOutcome::failed("rejected", Some(554)).is_policy_block());
        assert!(SendOutcome::failed("554 5.7.1 blocked by policy", None).is_policy_block());
        assert!(!SendOutcome::failed("connection reset", Some(421)).is_policy_block());
        assert!(!SendOutcome::delivered("<a@b>").is_policy_block());
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("Jane@Example.COM"), "example.com");
        assert_eq!(domain_of("no-at-sign"), "");
    }

    #[test]
    fn identity_debug_redacts_password() {
        let id = SendingIdentity {
            address: "a@b.com".into(),
            display_name: "A".into(),
            password: "hunter2".into(),
            daily_limit: None,
            warmup_start: None,
        };
        let dbg = format!("{id:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn thread_refs_default_references_to_parent() {
        let now = Utc::now();
        let draft = Draft {
            id: "d".into(),
            campaign_id: "c".into(),
            identity: None,
            recipient_email: "x@y.com".into(),
            recipient_name: None,
            recipient_domain: "y.com".into(),
            kind: MessageKind::Followup,
            followup_number: 1,
            subject: "s".into(),
            body: "b".into(),
            body_html: None,
            in_reply_to: Some("<p@y>".into()),
            references: None,
            quality_score: None,
            status: DraftStatus::Ready,
            review_reason: None,
            created_at: now,
            scheduled_at: None,
            claimed_at: None,
            sent_at: None,
            message_id: None,
            last_error: None,
            retry_count: 0,
        };
        let refs = draft.thread_refs().unwrap();
        assert_eq!(refs.references, "<p@y>");
    }
}
