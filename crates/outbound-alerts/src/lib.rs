// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator alert delivery.
//!
//! Alerts are fire-and-forget: a failed webhook is logged and swallowed so
//! that no alert path can stall sending or scanning.

pub mod payload;
pub mod webhook;

use async_trait::async_trait;
use outbound_core::types::{AdapterType, AlertSeverity, HealthStatus};
use outbound_core::{Alerter, OutboundError, PluginAdapter};

pub use webhook::{WebhookAlerter, WebhookTarget};

/// Alerter that only logs. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAlerter;

#[async_trait]
impl PluginAdapter for NullAlerter {
    fn name(&self) -> &str {
        "null-alerter"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Alerter
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl Alerter for NullAlerter {
    async fn notify(&self, message: &str, severity: AlertSeverity) {
        tracing::info!(%severity, message, "alert (no webhook configured)");
    }
}

/// Build the alerter described by the `[alerts]` section: a webhook alerter
/// when any target is configured, otherwise [`NullAlerter`].
pub fn from_config(
    config: &outbound_config::model::AlertsConfig,
) -> Result<std::sync::Arc<dyn Alerter>, OutboundError> {
    let alerter = WebhookAlerter::from_config(config)?;
    if alerter.targets().is_empty() {
        Ok(std::sync::Arc::new(NullAlerter))
    } else {
        Ok(std::sync::Arc::new(alerter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbound_config::model::AlertsConfig;

    #[test]
    fn unconfigured_alerts_fall_back_to_null() {
        let alerter = from_config(&AlertsConfig::default()).unwrap();
        assert_eq!(alerter.name(), "null-alerter");
    }

    #[test]
    fn configured_alerts_use_webhooks() {
        let config = AlertsConfig {
            discord_webhook: Some("https://discord.test/hook".into()),
            ..AlertsConfig::default()
        };
        let alerter = from_config(&config).unwrap();
        assert_eq!(alerter.name(), "webhook-alerter");
    }
}
