// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock content generator for deterministic testing.
//!
//! `MockGenerator` implements `ContentGenerator` with scripted review
//! scores, so review-loop and producer tests can drive acceptance and
//! rejection without any real content rules.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use outbound_core::traits::{ContentGenerator, PluginAdapter};
use outbound_core::types::{
    AdapterType, CampaignContext, DraftContent, HealthStatus, PriorSend, Recipient, ReviewResult,
};
use outbound_core::OutboundError;

/// Score given when the script is empty.
pub const DEFAULT_SCORE: u32 = 85;

/// How the generator answers a `generate_*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Return content.
    Content,
    /// Return `Ok(None)`.
    Nothing,
    /// Return a generator error.
    Fail,
}

/// Counts of each call the generator received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorCalls {
    pub initial: usize,
    pub followup: usize,
    pub review: usize,
    pub rewrite: usize,
    /// Sequence numbers passed to `generate_followup`, in call order.
    pub followup_sequences: Vec<u32>,
}

/// A content generator whose review scores are popped from a FIFO queue.
pub struct MockGenerator {
    scores: Mutex<VecDeque<u32>>,
    mode: Mutex<GenerationMode>,
    calls: Mutex<GeneratorCalls>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_scores(Vec::new())
    }

    /// Pre-load review scores. Once exhausted, every review scores
    /// [`DEFAULT_SCORE`].
    pub fn with_scores(scores: Vec<u32>) -> Self {
        Self {
            scores: Mutex::new(VecDeque::from(scores)),
            mode: Mutex::new(GenerationMode::Content),
            calls: Mutex::new(GeneratorCalls::default()),
        }
    }

    pub async fn set_mode(&self, mode: GenerationMode) {
        *self.mode.lock().await = mode;
    }

    pub async fn push_score(&self, score: u32) {
        self.scores.lock().await.push_back(score);
    }

    pub async fn calls(&self) -> GeneratorCalls {
        self.calls.lock().await.clone()
    }

    async fn produce(&self, content: DraftContent) -> Result<Option<DraftContent>, OutboundError> {
        match *self.mode.lock().await {
            GenerationMode::Content => Ok(Some(content)),
            GenerationMode::Nothing => Ok(None),
            GenerationMode::Fail => Err(OutboundError::generator("mock generator failure")),
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate_initial(
        &self,
        recipient: &Recipient,
        ctx: &CampaignContext,
    ) -> Result<Option<DraftContent>, OutboundError> {
        self.calls.lock().await.initial += 1;
        self.produce(DraftContent {
            subject: format!("Hello {}", recipient.first_name().unwrap_or("there")),
            body: format!("{} for {}", ctx.name, recipient.email),
            body_html: None,
        })
        .await
    }

    async fn generate_followup(
        &self,
        recipient: &Recipient,
        _ctx: &CampaignContext,
        prior: &[PriorSend],
        sequence: u32,
    ) -> Result<Option<DraftContent>, OutboundError> {
        {
            let mut calls = self.calls.lock().await;
            calls.followup += 1;
            calls.followup_sequences.push(sequence);
        }
        let subject = prior
            .last()
            .map_or_else(|| "Following".to_string(), |p| format!("Re: {}", p.subject));
        self.produce(DraftContent {
            subject,
            body: format!("Follow-up {sequence} for {}", recipient.email),
            body_html: None,
        })
        .await
    }

    async fn review(
        &self,
        _content: &DraftContent,
        _recipient: &Recipient,
    ) -> Result<ReviewResult, OutboundError> {
        self.calls.lock().await.review += 1;
        let score = self.scores.lock().await.pop_front().unwrap_or(DEFAULT_SCORE);
        Ok(ReviewResult {
            score,
            must_rewrite: false,
            issues: if score < 70 {
                vec![format!("mock score {score}")]
            } else {
                Vec::new()
            },
        })
    }

    async fn rewrite(
        &self,
        content: &DraftContent,
        _review: &ReviewResult,
        _ctx: &CampaignContext,
    ) -> Result<DraftContent, OutboundError> {
        let n = {
            let mut calls = self.calls.lock().await;
            calls.rewrite += 1;
            calls.rewrite
        };
        Ok(DraftContent {
            subject: content.subject.clone(),
            body: format!("{} (rewrite {n})", content.body),
            body_html: content.body_html.clone(),
        })
    }
}
