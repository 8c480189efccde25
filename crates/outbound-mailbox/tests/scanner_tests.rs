// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the mailbox scanner: replies, opt-outs,
//! auto-replies, bounces, deduplication and per-identity isolation.

use std::time::Duration;

use outbound_core::types::{
    BounceKind, DraftStatus, InboundMessage, MessageKind, SendStatus, SuppressionReason,
};
use outbound_storage::queries::{campaigns, drafts, processed, recipients, send_records, suppression};
use outbound_test_utils::{MockInbox, TestHarness, campaign_config};
use tokio_util::sync::CancellationToken;

const SENDER: &str = "sam@acme.io";
const OTHER: &str = "lee@acme.io";

async fn harness() -> TestHarness {
    TestHarness::builder()
        .with_identity(SENDER)
        .with_campaign(campaign_config("spring"))
        .build()
        .await
        .unwrap()
}

fn message(id: &str, from: &str, subject: &str, body: &str) -> InboundMessage {
    InboundMessage {
        message_id: id.to_string(),
        from: from.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        in_reply_to: None,
    }
}

/// Put an initial draft for `email` through the worker so the address
/// counts as contacted.
async fn contact(h: &TestHarness, email: &str) {
    h.ready_draft("spring", email, MessageKind::Initial, 0, None)
        .await
        .unwrap();
    h.worker().tick(&CancellationToken::new()).await.unwrap();
    assert!(send_records::has_contacted(&h.db, email).await.unwrap());
}

#[tokio::test]
async fn reply_marks_record_and_pauses_identity() {
    let h = harness().await;
    contact(&h, "ana@northwind.io").await;
    h.inbox
        .deliver(
            SENDER,
            message("<r1@northwind.io>", "Ana Lee <Ana@Northwind.io>", "Re: idea", "Sure, Thursday works."),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.replies(), 1);
    assert_eq!(report.identities[0].processed, 1);

    let records = send_records::list_for_recipient(&h.db, "ana@northwind.io").await.unwrap();
    assert_eq!(records[0].status, SendStatus::Replied);
    let campaign = campaigns::get(&h.db, "spring").await.unwrap().unwrap();
    assert_eq!(campaign.counters.replied, 1);

    let status = h.pool.status().await.unwrap();
    let until = status[0].next_eligible.unwrap();
    assert!(until >= h.now() + chrono::Duration::minutes(30));

    assert!(processed::is_processed(&h.db, SENDER, "<r1@northwind.io>").await.unwrap());
    assert!(h.inbox.seen(SENDER).await.contains("<r1@northwind.io>"));
    assert!(!suppression::is_suppressed(&h.db, "ana@northwind.io").await.unwrap());
}

#[tokio::test]
async fn unsubscribe_suppresses_and_skips_pending_drafts() {
    let h = harness().await;
    contact(&h, "ana@northwind.io").await;
    let followup = h
        .ready_draft("spring", "ana@northwind.io", MessageKind::Followup, 1, None)
        .await
        .unwrap();
    h.inbox
        .deliver(
            SENDER,
            message("<u1@northwind.io>", "ana@northwind.io", "Re: idea", "Please remove me from your list."),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.identities[0].unsubscribes, 1);
    assert_eq!(report.suppressions_added(), 1);
    assert_eq!(report.replies(), 0);

    let entry = suppression::get(&h.db, "ana@northwind.io").await.unwrap().unwrap();
    assert_eq!(entry.reason, SuppressionReason::Unsubscribe);
    let draft = drafts::get(&h.db, &followup).await.unwrap().unwrap();
    assert_eq!(draft.status, DraftStatus::Skipped);

    // Opt-outs are not credited as replies.
    let campaign = campaigns::get(&h.db, "spring").await.unwrap().unwrap();
    assert_eq!(campaign.counters.replied, 0);
}

#[tokio::test]
async fn permanent_auto_reply_suppresses() {
    let h = harness().await;
    contact(&h, "ana@northwind.io").await;
    h.inbox
        .deliver(
            SENDER,
            message(
                "<a1@northwind.io>",
                "ana@northwind.io",
                "Automatic reply: idea",
                "Ana is no longer with Northwind. Please contact bo@northwind.io.",
            ),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.identities[0].auto_replies, 1);
    let entry = suppression::get(&h.db, "ana@northwind.io").await.unwrap().unwrap();
    assert_eq!(entry.reason, SuppressionReason::PermanentAutoReply);
}

#[tokio::test]
async fn temporary_auto_reply_changes_nothing() {
    let h = harness().await;
    contact(&h, "ana@northwind.io").await;
    h.inbox
        .deliver(
            SENDER,
            message(
                "<o1@northwind.io>",
                "ana@northwind.io",
                "Out of Office: idea",
                "I am on vacation until Monday.",
            ),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.identities[0].auto_replies, 1);
    assert_eq!(report.replies(), 0);
    assert!(!suppression::is_suppressed(&h.db, "ana@northwind.io").await.unwrap());
    let records = send_records::list_for_recipient(&h.db, "ana@northwind.io").await.unwrap();
    assert_eq!(records[0].status, SendStatus::Sent);
    assert!(processed::is_processed(&h.db, SENDER, "<o1@northwind.io>").await.unwrap());
}

#[tokio::test]
async fn hard_bounce_suppresses_and_blocks_new_drafts() {
    let h = harness().await;
    contact(&h, "x@y.com").await;
    h.inbox
        .deliver(
            SENDER,
            message(
                "<b1@mx.acme.io>",
                "MAILER-DAEMON@mx.acme.io",
                "Undelivered Mail Returned to Sender",
                "Delivery to the following recipient failed permanently:\n\n<x@y.com>: 550 5.1.1 user unknown",
            ),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.bounces(), 1);
    assert_eq!(report.suppressions_added(), 1);

    let records = send_records::list_for_recipient(&h.db, "x@y.com").await.unwrap();
    assert_eq!(records[0].status, SendStatus::Bounced);
    assert_eq!(records[0].bounce_kind, Some(BounceKind::Hard));

    let entry = suppression::get(&h.db, "x@y.com").await.unwrap().unwrap();
    assert_eq!(entry.reason, SuppressionReason::HardBounce);
    assert!(recipients::is_invalid(&h.db, "x@y.com").await.unwrap());

    let campaign = campaigns::get(&h.db, "spring").await.unwrap().unwrap();
    assert_eq!(campaign.counters.bounced, 1);

    // No further drafts can be created for the address.
    assert!(h
        .ready_draft("spring", "x@y.com", MessageKind::Followup, 1, None)
        .await
        .is_err());
}

#[tokio::test]
async fn soft_bounce_keeps_recipient_eligible() {
    let h = harness().await;
    contact(&h, "ana@northwind.io").await;
    h.inbox
        .deliver(
            SENDER,
            message(
                "<b2@mx.acme.io>",
                "postmaster@northwind.io",
                "Delivery Status Notification (Delay)",
                "Delivery to ana@northwind.io has been delayed: mailbox full, will retry.",
            ),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.bounces(), 1);
    assert_eq!(report.suppressions_added(), 0);

    let records = send_records::list_for_recipient(&h.db, "ana@northwind.io").await.unwrap();
    assert_eq!(records[0].status, SendStatus::Bounced);
    assert_eq!(records[0].bounce_kind, Some(BounceKind::Soft));
    assert!(!suppression::is_suppressed(&h.db, "ana@northwind.io").await.unwrap());
    assert!(!recipients::is_invalid(&h.db, "ana@northwind.io").await.unwrap());
}

#[tokio::test]
async fn unrelated_mail_is_ignored_but_processed() {
    let h = harness().await;
    h.inbox
        .deliver(
            SENDER,
            message("<n1@news.example>", "news@news.example", "Weekly digest", "Top stories"),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.identities[0].processed, 1);
    assert_eq!(report.bounces(), 0);
    assert_eq!(suppression::count(&h.db).await.unwrap(), 0);
}

#[tokio::test]
async fn bounce_for_unknown_address_is_not_counted() {
    let h = harness().await;
    h.inbox
        .deliver(
            SENDER,
            message(
                "<b3@mx.acme.io>",
                "mailer-daemon@mx.acme.io",
                "Undeliverable",
                "<stranger@nowhere.org>: 550 no such user",
            ),
        )
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.bounces(), 0);
    assert!(!suppression::is_suppressed(&h.db, "stranger@nowhere.org").await.unwrap());
}

#[tokio::test]
async fn rescanning_redelivered_mail_is_idempotent() {
    let h = TestHarness::builder()
        .with_identity(SENDER)
        .with_campaign(campaign_config("spring"))
        .with_inbox(MockInbox::redelivering())
        .build()
        .await
        .unwrap();
    contact(&h, "ana@northwind.io").await;
    h.inbox
        .deliver(
            SENDER,
            message("<r1@northwind.io>", "ana@northwind.io", "Re: idea", "Let's talk."),
        )
        .await;

    let first = h.scanner().scan_all().await;
    let second = h.scanner().scan_all().await;
    assert_eq!(first.replies(), 1);
    assert_eq!(second.replies(), 0);
    assert_eq!(second.identities[0].processed, 0);
    assert_eq!(h.inbox.fetch_count().await, 2);

    let campaign = campaigns::get(&h.db, "spring").await.unwrap().unwrap();
    assert_eq!(campaign.counters.replied, 1);
}

#[tokio::test]
async fn failing_identity_does_not_stop_the_others() {
    let h = TestHarness::builder()
        .with_identities(&[SENDER, OTHER])
        .with_campaign(campaign_config("spring"))
        .build()
        .await
        .unwrap();
    contact(&h, "ana@northwind.io").await;
    let owner = send_records::list_for_recipient(&h.db, "ana@northwind.io")
        .await
        .unwrap()[0]
        .identity
        .clone();
    let broken = if owner == SENDER { OTHER } else { SENDER };

    h.inbox.fail_for(broken).await;
    h.inbox
        .deliver(&owner, message("<r1@northwind.io>", "ana@northwind.io", "Re: idea", "Yes."))
        .await;

    let report = h.scanner().scan_all().await;
    assert_eq!(report.replies(), 1);
    let failed: Vec<_> = report.failed().map(|r| r.identity.clone()).collect();
    assert_eq!(failed, vec![broken.to_string()]);
}

#[tokio::test]
async fn slow_identity_times_out_alone() {
    let h = TestHarness::builder()
        .with_identities(&[SENDER, OTHER])
        .with_campaign(campaign_config("spring"))
        .configure(|c| c.mailbox.scan_timeout_secs = 1)
        .build()
        .await
        .unwrap();
    h.inbox.delay_for(OTHER, Duration::from_secs(10)).await;
    h.inbox
        .deliver(SENDER, message("<n1@news.example>", "news@news.example", "Digest", "Hi"))
        .await;

    let report = h.scanner().scan_all().await;
    let slow = report.identities.iter().find(|r| r.identity == OTHER).unwrap();
    let fast = report.identities.iter().find(|r| r.identity == SENDER).unwrap();
    assert!(slow.error.as_deref().unwrap_or_default().contains("timed out"));
    assert!(fast.error.is_none());
    assert_eq!(fast.processed, 1);
}
