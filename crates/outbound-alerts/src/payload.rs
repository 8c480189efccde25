// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON bodies for each webhook flavor.

use chrono::{DateTime, Utc};
use outbound_core::types::AlertSeverity;
use serde_json::{Value, json};

const FOOTER: &str = "Outbound";

/// Heading shown above the alert body.
pub fn heading(severity: AlertSeverity) -> String {
    format!("Outbound {}", severity.to_string().to_uppercase())
}

fn slack_color(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => "#FF0000",
        AlertSeverity::Warning => "#FFA500",
        AlertSeverity::Info => "#36A64F",
    }
}

fn discord_color(severity: AlertSeverity) -> u32 {
    match severity {
        AlertSeverity::Critical => 0xFF0000,
        AlertSeverity::Warning => 0xFFA500,
        AlertSeverity::Info => 0x36A64F,
    }
}

/// Slack incoming-webhook attachment.
pub fn slack(message: &str, severity: AlertSeverity, now: DateTime<Utc>) -> Value {
    json!({
        "attachments": [{
            "color": slack_color(severity),
            "title": heading(severity),
            "text": message,
            "footer": FOOTER,
            "ts": now.timestamp(),
        }]
    })
}

/// Discord webhook embed.
pub fn discord(message: &str, severity: AlertSeverity, now: DateTime<Utc>) -> Value {
    json!({
        "embeds": [{
            "title": heading(severity),
            "description": message,
            "color": discord_color(severity),
            "timestamp": now.to_rfc3339(),
        }]
    })
}

/// Telegram `sendMessage` body.
pub fn telegram(chat_id: &str, message: &str, severity: AlertSeverity) -> Value {
    json!({
        "chat_id": chat_id,
        "text": format!("*{}*\n\n{message}", heading(severity)),
        "parse_mode": "Markdown",
    })
}
