// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling and process lifecycle for Outbound.
//!
//! - **Orchestrator**: tick loop firing scans, reputation refreshes,
//!   scheduled campaign runs, the daily summary and heartbeats
//! - **Service**: startup sequence and the task set run by `outbound serve`
//! - **Shutdown**: signal handling and grace-period draining

pub mod orchestrator;
pub mod service;
pub mod shutdown;
pub mod summary;
pub mod trigger;

pub use orchestrator::{HEARTBEAT_COMPONENT, Orchestrator, OrchestratorSettings};
pub use service::Service;
pub use shutdown::{drain, install_signal_handler};
pub use summary::DailySummary;
pub use trigger::{CampaignSchedule, Trigger};
