// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sending side of the Outbound campaign engine: the queue-draining
//! [`SendWorker`] and the lettre-backed [`SmtpTransport`].

pub mod smtp;
pub mod worker;

pub use smtp::{SmtpTransport, build_message, new_message_id};
pub use worker::{IdleReason, SendStats, SendWorker, Tick, WorkerSettings};
