// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Outbound campaign engine.

use thiserror::Error;

/// The primary error type used across all Outbound crates.
#[derive(Debug, Error)]
pub enum OutboundError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, query failure, bad persisted value).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound mail transport errors (connect, auth, rejected envelope).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Inbound mailbox errors (IMAP connect, login, fetch).
    #[error("mailbox error: {message}")]
    Mailbox {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Lead source or content generator failures.
    #[error("generator error: {message}")]
    Generator {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Alert delivery failures. Never propagated out of an alerter.
    #[error("alert error: {message}")]
    Alert { message: String },

    /// A draft status change that the lifecycle does not allow, or that lost a race.
    #[error("draft {id}: invalid transition {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OutboundError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a mailbox error without an underlying source.
    pub fn mailbox(message: impl Into<String>) -> Self {
        Self::Mailbox {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a generator error without an underlying source.
    pub fn generator(message: impl Into<String>) -> Self {
        Self::Generator {
            message: message.into(),
            source: None,
        }
    }
}
