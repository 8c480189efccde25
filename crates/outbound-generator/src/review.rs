// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded review-and-rewrite loop.

use outbound_core::OutboundError;
use outbound_core::traits::ContentGenerator;
use outbound_core::types::{CampaignContext, DraftContent, Recipient};
use tracing::debug;

/// Result of [`review_loop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Content passed review.
    Accepted { content: DraftContent, score: u32 },
    /// Every attempt fell short; `content` is the best-scoring one.
    Rejected {
        content: DraftContent,
        best_score: u32,
        reason: String,
    },
}

impl ReviewOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ReviewOutcome::Accepted { .. })
    }
}

/// Review `content`, rewriting up to `max_rewrites` times until it scores at
/// least `threshold` with no critical issue.
///
/// The generator is consulted `max_rewrites + 1` times for a review. On
/// rejection the best-scoring attempt is returned along with the issues
/// raised against it. Generator errors propagate.
pub async fn review_loop(
    generator: &dyn ContentGenerator,
    content: DraftContent,
    recipient: &Recipient,
    ctx: &CampaignContext,
    threshold: u32,
    max_rewrites: u32,
) -> Result<ReviewOutcome, OutboundError> {
    let mut current = content;
    let mut best: Option<(DraftContent, u32, Vec<String>)> = None;
    let mut rewrites = 0;

    loop {
        let review = generator.review(&current, recipient).await?;
        debug!(
            recipient = %recipient.email,
            score = review.score,
            must_rewrite = review.must_rewrite,
            attempt = rewrites,
            "draft reviewed"
        );
        if review.score >= threshold && !review.must_rewrite {
            return Ok(ReviewOutcome::Accepted {
                content: current,
                score: review.score,
            });
        }

        if best.as_ref().is_none_or(|(_, score, _)| review.score > *score) {
            best = Some((current.clone(), review.score, review.issues.clone()));
        }

        if rewrites >= max_rewrites {
            break;
        }
        current = generator.rewrite(&current, &review, ctx).await?;
        rewrites += 1;
    }

    let Some((content, best_score, issues)) = best else {
        return Err(OutboundError::Internal("review loop ended without an attempt".into()));
    };
    let mut reason = format!("score {best_score} below {threshold} after {rewrites} rewrites");
    if !issues.is_empty() {
        reason.push_str(": ");
        reason.push_str(&issues.join("; "));
    }
    Ok(ReviewOutcome::Rejected {
        content,
        best_score,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateGenerator;
    use outbound_test_utils::MockGenerator;

    fn ctx() -> CampaignContext {
        CampaignContext {
            campaign_id: "spring".into(),
            name: "Spring".into(),
            description: "outbound email infrastructure".into(),
            sender_name: "Sam".into(),
            company: "Acme".into(),
        }
    }

    fn content(body: &str) -> DraftContent {
        DraftContent {
            subject: "idea".into(),
            body: body.into(),
            body_html: None,
        }
    }

    #[tokio::test]
    async fn accepts_on_first_passing_review() {
        let generator = MockGenerator::with_scores(vec![88]);
        let outcome = review_loop(&generator, content("hi"), &Recipient::new("a@b.com"), &ctx(), 70, 3)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReviewOutcome::Accepted {
                content: content("hi"),
                score: 88
            }
        );
        let calls = generator.calls().await;
        assert_eq!(calls.review, 1);
        assert_eq!(calls.rewrite, 0);
    }

    #[tokio::test]
    async fn rewrites_until_threshold() {
        let generator = MockGenerator::with_scores(vec![40, 60, 75]);
        let outcome = review_loop(&generator, content("hi"), &Recipient::new("a@b.com"), &ctx(), 70, 3)
            .await
            .unwrap();
        match outcome {
            ReviewOutcome::Accepted { content, score } => {
                assert_eq!(score, 75);
                assert!(content.body.ends_with("(rewrite 2)"), "{}", content.body);
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
        assert_eq!(generator.calls().await.rewrite, 2);
    }

    #[tokio::test]
    async fn rejection_keeps_best_attempt() {
        let generator = MockGenerator::with_scores(vec![50, 65, 40]);
        let outcome = review_loop(&generator, content("hi"), &Recipient::new("a@b.com"), &ctx(), 70, 2)
            .await
            .unwrap();
        match outcome {
            ReviewOutcome::Rejected {
                content,
                best_score,
                reason,
            } => {
                assert_eq!(best_score, 65);
                assert!(content.body.ends_with("(rewrite 1)"));
                assert!(reason.starts_with("score 65 below 70 after 2 rewrites"), "{reason}");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        let calls = generator.calls().await;
        assert_eq!(calls.review, 3);
        assert_eq!(calls.rewrite, 2);
    }

    #[tokio::test]
    async fn zero_rewrites_reviews_once() {
        let generator = MockGenerator::with_scores(vec![10]);
        let outcome = review_loop(&generator, content("hi"), &Recipient::new("a@b.com"), &ctx(), 70, 0)
            .await
            .unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(generator.calls().await.review, 1);
    }

    #[tokio::test]
    async fn template_rules_repair_a_spammy_draft() {
        let generator = TemplateGenerator::default();
        let mut recipient = Recipient::new("ana@northwind.io");
        recipient.company = Some("Northwind".into());
        let spammy = DraftContent {
            subject: "Partnership opportunity".into(),
            body: "Ana,\n\nI hope this finds you well \u{2026} Northwind came up while I was \
                   researching teams in your space. We run outbound email infrastructure for \
                   agencies and it usually pays off in the first month.\n\nWorth a chat? \
                   Thoughts?\n\nSam"
                .into(),
            body_html: None,
        };
        let outcome = review_loop(&generator, spammy, &recipient, &ctx(), 70, 3)
            .await
            .unwrap();
        assert!(outcome.is_accepted(), "{outcome:?}");
    }
}
