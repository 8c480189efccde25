// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the draft queue and send-record correlation.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use outbound_core::types::{
    BounceKind, CreateOutcome, DraftContent, DraftStatus, MessageKind, NewDraft, Recipient,
    SendStatus, SuppressionReason, ThreadRefs,
};
use outbound_storage::queries::{drafts, send_records, suppression};
use outbound_storage::{Database, NewSendRecord};
use tempfile::tempdir;

async fn setup_db() -> (Database, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let db = Database::open(path.to_str().unwrap()).await.unwrap();
    (db, dir)
}

fn content() -> DraftContent {
    DraftContent {
        subject: "Quick question".into(),
        body: "Hi, quick question about your team.".into(),
        body_html: None,
    }
}

async fn ready(db: &Database, email: &str, campaign: &str) -> String {
    let new = NewDraft::initial(campaign, &Recipient::new(email));
    let CreateOutcome::Created(id) = drafts::create(db, new, Utc::now()).await.unwrap() else {
        panic!("expected Created for {email}");
    };
    drafts::mark_ready(db, &id, &content(), 85).await.unwrap();
    id
}

/// Send a ready draft end to end and write its record.
async fn deliver(db: &Database, identity: &str, sent_at: chrono::DateTime<Utc>) -> String {
    let draft = drafts::claim_next(db, None, &[], sent_at).await.unwrap().unwrap();
    let message_id = format!("<{}@mail.test>", draft.id);
    drafts::mark_sent(db, &draft.id, Some(&message_id), identity, sent_at)
        .await
        .unwrap();
    let sent = drafts::get(db, &draft.id).await.unwrap().unwrap();
    send_records::insert(
        db,
        NewSendRecord {
            draft: sent,
            identity: identity.into(),
            status: SendStatus::Sent,
            message_id: Some(message_id),
            error: None,
            sent_at,
        },
    )
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_double_claim() {
    let (db, _dir) = setup_db().await;
    let mut expected = HashSet::new();
    for i in 0..25 {
        expected.insert(ready(&db, &format!("lead{i}@corp{i}.com"), "c1").await);
    }

    let mut handles = Vec::new();
    for _ in 0..10 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let mut mine = Vec::new();
            while let Some(d) = drafts::claim_next(&db, None, &[], Utc::now()).await.unwrap() {
                mine.push(d.id);
            }
            mine
        }));
    }

    let mut claimed = Vec::new();
    for h in handles {
        claimed.extend(h.await.unwrap());
    }
    let unique: HashSet<String> = claimed.iter().cloned().collect();
    assert_eq!(claimed.len(), 25, "every draft claimed exactly once");
    assert_eq!(unique, expected);

    let counts = drafts::counts_by_status(&db).await.unwrap();
    assert_eq!(counts["claimed"], 25);
    assert_eq!(counts["ready"], 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn reply_marks_every_open_record() {
    let (db, _dir) = setup_db().await;
    ready(&db, "jane@acme.com", "c1").await;
    deliver(&db, "alex@me.com", Utc::now() - Duration::days(4)).await;
    ready(&db, "jane@acme.com", "c2").await;
    deliver(&db, "alex@me.com", Utc::now()).await;

    let campaigns = send_records::mark_replied(&db, "Jane@Acme.com", Utc::now())
        .await
        .unwrap();
    assert_eq!(campaigns.len(), 2);

    // Nothing left to mark a second time.
    assert!(send_records::mark_replied(&db, "jane@acme.com", Utc::now())
        .await
        .unwrap()
        .is_empty());
    let records = send_records::list_for_recipient(&db, "jane@acme.com").await.unwrap();
    assert!(records.iter().all(|r| r.status == SendStatus::Replied && r.replied_at.is_some()));
    db.close().await.unwrap();
}

#[tokio::test]
async fn hard_bounce_scenario_blocks_future_drafts() {
    let (db, _dir) = setup_db().await;
    ready(&db, "x@y.com", "c1").await;
    deliver(&db, "alex@me.com", Utc::now()).await;

    let campaign = send_records::mark_bounced(&db, "x@y.com", BounceKind::Hard, Utc::now())
        .await
        .unwrap();
    assert_eq!(campaign.as_deref(), Some("c1"));
    suppression::add(&db, "x@y.com", SuppressionReason::HardBounce, Some("550 5.1.1 user unknown"), Utc::now())
        .await
        .unwrap();

    let record = &send_records::list_for_recipient(&db, "x@y.com").await.unwrap()[0];
    assert_eq!(record.status, SendStatus::Bounced);
    assert_eq!(record.bounce_kind, Some(BounceKind::Hard));

    let followup = NewDraft {
        kind: MessageKind::Followup,
        followup_number: 1,
        ..NewDraft::initial("c1", &Recipient::new("x@y.com"))
    };
    assert_eq!(
        drafts::create(&db, followup, Utc::now()).await.unwrap(),
        CreateOutcome::Suppressed
    );
    db.close().await.unwrap();
}

#[tokio::test]
async fn followup_due_respects_age_replies_and_existing_drafts() {
    let (db, _dir) = setup_db().await;
    let four_days_ago = Utc::now() - Duration::days(4);
    for email in ["old@a.com", "replied@b.com", "drafted@c.com"] {
        ready(&db, email, "c1").await;
        deliver(&db, "alex@me.com", four_days_ago).await;
    }
    ready(&db, "fresh@d.com", "c1").await;
    deliver(&db, "alex@me.com", Utc::now()).await;

    send_records::mark_replied(&db, "replied@b.com", Utc::now()).await.unwrap();
    let existing = NewDraft {
        kind: MessageKind::Followup,
        followup_number: 1,
        thread: Some(ThreadRefs {
            in_reply_to: "<x@mail.test>".into(),
            references: "<x@mail.test>".into(),
        }),
        ..NewDraft::initial("c1", &Recipient::new("drafted@c.com"))
    };
    drafts::create(&db, existing, Utc::now()).await.unwrap();

    let due = send_records::followup_due(&db, "c1", 0, Utc::now() - Duration::days(3), 10)
        .await
        .unwrap();
    let emails: Vec<_> = due.iter().map(|r| r.recipient_email.as_str()).collect();
    assert_eq!(emails, vec!["old@a.com"]);
    assert_eq!(due[0].identity, "alex@me.com");
    assert!(due[0].message_id.is_some());
    db.close().await.unwrap();
}

#[tokio::test]
async fn window_stats_and_totals() {
    let (db, _dir) = setup_db().await;
    let now = Utc::now();
    for i in 0..4 {
        ready(&db, &format!("r{i}@x{i}.com"), "c1").await;
        deliver(&db, "alex@me.com", now - Duration::hours(1)).await;
    }
    send_records::mark_bounced(&db, "r0@x0.com", BounceKind::Soft, now).await.unwrap();
    send_records::mark_replied(&db, "r1@x1.com", now).await.unwrap();

    let failed_id = ready(&db, "r9@x9.com", "c1").await;
    let claimed = drafts::claim_next(&db, None, &[], now).await.unwrap().unwrap();
    assert_eq!(claimed.id, failed_id);
    drafts::mark_failed(&db, &failed_id, Some("alex@me.com"), "timeout").await.unwrap();
    send_records::insert(
        &db,
        NewSendRecord {
            draft: drafts::get(&db, &failed_id).await.unwrap().unwrap(),
            identity: "alex@me.com".into(),
            status: SendStatus::Failed,
            message_id: None,
            error: Some("timeout".into()),
            sent_at: now,
        },
    )
    .await
    .unwrap();

    let stats = send_records::window_stats(&db, "alex@me.com", now - Duration::days(3))
        .await
        .unwrap();
    assert_eq!(stats.sends, 5);
    assert_eq!(stats.bounces, 1);
    assert_eq!(stats.replies, 1);
    assert_eq!(stats.failures, 1);

    assert_eq!(
        send_records::delivered_since(&db, "alex@me.com", now - Duration::days(1)).await.unwrap(),
        4
    );
    let totals = send_records::totals_since(&db, now - Duration::days(1)).await.unwrap();
    assert_eq!((totals.sent, totals.replied, totals.bounced, totals.failed), (4, 1, 1, 1));
    let rate = send_records::all_time_reply_rate(&db).await.unwrap();
    assert!((rate - 0.25).abs() < 1e-9);
    assert!(send_records::last_delivered_at(&db, "alex@me.com").await.unwrap().is_some());
    assert_eq!(
        drafts::get(&db, &failed_id).await.unwrap().unwrap().status,
        DraftStatus::Failed
    );
    db.close().await.unwrap();
}
