// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern-based classification of inbound mail.
//!
//! Two independent questions are answered here:
//! 1. **From a contacted recipient**: is it a permanent auto-reply, a
//!    temporary one, an opt-out request, or a genuine reply?
//! 2. **From anyone else**: is it a delivery-failure notification, and if so
//!    hard or soft, and which addresses does it mention?

use std::sync::LazyLock;

use outbound_core::types::{BounceKind, Classification};
use regex::{Regex, RegexSet};

/// Recipient left, or the mailbox is no longer read.
static PERMANENT_AUTO_REPLY: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)no longer (with|at|employed)",
        r"(?i)left (the company|the organization|this position)",
        r"(?i)is no longer (working|employed)",
        r"(?i)has left",
        r"(?i)moved on from",
        r"(?i)this email (address )?(is )?no longer (active|monitored|in use)",
        r"(?i)this (mailbox|inbox) is (not|no longer) (monitored|active)",
    ])
    .unwrap()
});

/// Out-of-office and similar temporary absences.
static AUTO_REPLY: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)out of (office|town)",
        r"(?i)automatic reply",
        r"(?i)auto[-\s]?reply",
        r"(?i)away from (office|email|my desk)",
        r"(?i)on vacation",
        r"(?i)on holiday",
        r"(?i)on leave",
        r"(?i)currently away",
        r"(?i)out of the office",
        r"(?i)will be out",
        r"(?i)limited access",
        r"(?i)maternity leave",
        r"(?i)paternity leave",
        r"(?i)sabbatical",
        r"(?i)ooo:",
        r"(?i)auto-?response",
        r"(?i)\[auto\]",
    ])
    .unwrap()
});

static UNSUBSCRIBE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)unsubscribe",
        r"(?i)remove me",
        r"(?i)opt[-\s]?out",
        r"(?i)stop (emailing|contacting|sending)",
        r"(?i)don'?t (email|contact|message)",
        r"(?i)take me off",
        r"(?i)no longer interested",
        r"(?i)not interested",
        r"(?i)please stop",
        r"(?i)do not contact",
        r"(?i)remove from (your )?(list|mailing)",
        r"(?i)never (email|contact)",
    ])
    .unwrap()
});

/// Substrings of the sender or subject that mark a delivery notification.
const BOUNCE_INDICATORS: &[&str] = &[
    "mailer-daemon",
    "postmaster",
    "mail delivery",
    "delivery failure",
    "undeliverable",
    "returned mail",
    "delivery status notification",
];

static HARD_BOUNCE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)user unknown",
        r"(?i)user not found",
        r"(?i)no such user",
        r"(?i)mailbox not found",
        r"(?i)invalid recipient",
        r"(?i)recipient rejected",
        r"(?i)address rejected",
        r"(?i)does not exist",
        r"(?i)mailbox unavailable",
        r"\b55[0-4]\b",
    ])
    .unwrap()
});

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w.-]+@[\w.-]+").unwrap());

static ANGLE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([^>]+)>").unwrap());

/// Bare lowercase address from a `From` header value.
///
/// Prefers the `<...>` part; falls back to the first address-shaped token,
/// then to the trimmed input.
pub fn extract_address(from_header: &str) -> String {
    let raw = ANGLE_ADDRESS
        .captures(from_header)
        .and_then(|c| c.get(1))
        .or_else(|| ADDRESS.find(from_header))
        .map_or(from_header, |m| m.as_str());
    raw.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Classify a message from a previously-contacted recipient.
///
/// Precedence: permanent auto-reply, temporary auto-reply, unsubscribe,
/// then genuine reply.
pub fn classify_reply(subject: &str, body: &str) -> Classification {
    let text = format!("{subject} {body}");
    if PERMANENT_AUTO_REPLY.is_match(&text) {
        Classification::PermanentAutoReply
    } else if AUTO_REPLY.is_match(&text) {
        Classification::AutoReply
    } else if UNSUBSCRIBE.is_match(&text) {
        Classification::Unsubscribe
    } else {
        Classification::Reply
    }
}

/// Whether the sender or subject looks like a delivery notification.
pub fn is_bounce_notification(from: &str, subject: &str) -> bool {
    let from = from.to_ascii_lowercase();
    let subject = subject.to_ascii_lowercase();
    BOUNCE_INDICATORS
        .iter()
        .any(|ind| from.contains(ind) || subject.contains(ind))
}

pub fn bounce_kind(subject: &str, body: &str) -> BounceKind {
    if HARD_BOUNCE.is_match(&format!("{subject} {body}")) {
        BounceKind::Hard
    } else {
        BounceKind::Soft
    }
}

/// Lowercased addresses mentioned in a notification body, in order of
/// appearance, without repeats.
pub fn bounce_candidates(body: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in ADDRESS.find_iter(body) {
        let addr = m.as_str().trim_end_matches('.').to_ascii_lowercase();
        if !out.contains(&addr) {
            out.push(addr);
        }
    }
    out
}

/// A delivery notification about one address.
pub fn bounce_for(kind: BounceKind, address: String) -> Classification {
    match kind {
        BounceKind::Hard => Classification::HardBounce { address },
        BounceKind::Soft => Classification::SoftBounce { address },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bracketed_and_bare_addresses() {
        assert_eq!(extract_address("Ana Lee <Ana@Northwind.io>"), "ana@northwind.io");
        assert_eq!(extract_address("ana@northwind.io"), "ana@northwind.io");
        assert_eq!(
            extract_address("\"Mail Delivery\" MAILER-DAEMON@mx.example.com"),
            "mailer-daemon@mx.example.com"
        );
    }

    #[test]
    fn permanent_auto_reply_wins_over_temporary() {
        let class = classify_reply(
            "Automatic reply: idea",
            "Ana is no longer with Northwind. This mailbox is not monitored.",
        );
        assert_eq!(class, Classification::PermanentAutoReply);
    }

    #[test]
    fn out_of_office_is_temporary() {
        assert_eq!(
            classify_reply("Out of Office", "I am on vacation until Monday."),
            Classification::AutoReply
        );
    }

    #[test]
    fn auto_reply_beats_unsubscribe() {
        assert_eq!(
            classify_reply("Auto-Reply", "Away. To unsubscribe from our newsletter click here."),
            Classification::AutoReply
        );
    }

    #[test]
    fn opt_out_requests() {
        for body in [
            "Please remove me from your list",
            "Not interested, thanks",
            "stop emailing me",
            "Don't contact me again",
        ] {
            assert_eq!(classify_reply("Re: idea", body), Classification::Unsubscribe, "{body}");
        }
    }

    #[test]
    fn ordinary_answer_is_a_reply() {
        assert_eq!(
            classify_reply("Re: idea for Northwind", "Sure, Thursday at 2pm works."),
            Classification::Reply
        );
    }

    #[test]
    fn bounce_notifications_by_sender_or_subject() {
        assert!(is_bounce_notification("mailer-daemon@googlemail.com", "Delivery Status Notification (Failure)"));
        assert!(is_bounce_notification("postmaster@acme.io", "hello"));
        assert!(is_bounce_notification("noreply@x.com", "Undeliverable: idea"));
        assert!(!is_bounce_notification("ana@northwind.io", "Re: idea"));
    }

    #[test]
    fn hard_and_soft_bounces() {
        assert_eq!(bounce_kind("Undeliverable", "550 5.1.1 user unknown"), BounceKind::Hard);
        assert_eq!(bounce_kind("Failure", "The address does not exist"), BounceKind::Hard);
        assert_eq!(bounce_kind("Delayed", "mailbox full, will retry for 2 days"), BounceKind::Soft);
        assert_eq!(bounce_kind("Delayed", "queued for 15500 seconds"), BounceKind::Soft);
    }

    #[test]
    fn candidates_are_deduplicated_in_order() {
        let body = "Delivery to x@y.com failed.\nFinal-Recipient: rfc822; X@Y.com.\nReporting-MTA: mx@relay.net";
        assert_eq!(bounce_candidates(body), vec!["x@y.com", "mx@relay.net"]);
    }

    #[test]
    fn bounce_classification_carries_address() {
        assert_eq!(
            bounce_for(BounceKind::Hard, "x@y.com".into()),
            Classification::HardBounce {
                address: "x@y.com".into()
            }
        );
    }
}
