// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Outbound integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without mail servers, webhooks or wall-clock waits.
//!
//! # Components
//!
//! - [`MockGenerator`] - content generator with scripted review scores
//! - [`MockLeadSource`] - fixed in-memory lead list
//! - [`MockTransport`] / [`MockInbox`] - capturing outbound and scripted inbound mail
//! - [`RecordingAlerter`] / [`ManualClock`] - alert capture and hand-driven time
//! - [`TestHarness`] - temp database plus pool, producer, worker and scanner wiring

pub mod harness;
pub mod mock_generator;
pub mod mock_leads;
pub mod mock_transport;
pub mod recording;

pub use harness::{
    TestHarness, TestHarnessBuilder, campaign_config, default_start, identity_config, lead,
    test_config,
};
pub use mock_generator::{DEFAULT_SCORE, GenerationMode, GeneratorCalls, MockGenerator};
pub use mock_leads::{LeadQuery, MockLeadSource};
pub use mock_transport::{MockInbox, MockTransport, SentMessage};
pub use recording::{ManualClock, RecordingAlerter};
