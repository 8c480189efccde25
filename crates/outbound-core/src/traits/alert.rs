// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator alerting trait.

use async_trait::async_trait;

use crate::traits::adapter::PluginAdapter;
use crate::types::AlertSeverity;

/// Fire-and-forget operator notifications.
///
/// Implementations swallow and log their own failures: alert delivery must
/// never influence sending decisions.
#[async_trait]
pub trait Alerter: PluginAdapter {
    async fn notify(&self, message: &str, severity: AlertSeverity);
}
