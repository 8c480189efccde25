// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook alerter posting to Slack, Discord and Telegram.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use outbound_config::model::AlertsConfig;
use outbound_core::types::{AdapterType, AlertSeverity, HealthStatus};
use outbound_core::{Alerter, OutboundError, PluginAdapter};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::payload;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// One configured alert destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTarget {
    Slack { url: String },
    Discord { url: String },
    Telegram { bot_token: String, chat_id: String },
}

impl WebhookTarget {
    fn label(&self) -> &'static str {
        match self {
            WebhookTarget::Slack { .. } => "slack",
            WebhookTarget::Discord { .. } => "discord",
            WebhookTarget::Telegram { .. } => "telegram",
        }
    }
}

/// Posts every alert to each configured target.
#[derive(Debug, Clone)]
pub struct WebhookAlerter {
    client: reqwest::Client,
    targets: Vec<WebhookTarget>,
    telegram_base: String,
}

impl WebhookAlerter {
    /// Create an alerter for an explicit list of targets.
    pub fn new(targets: Vec<WebhookTarget>, timeout: Duration) -> Result<Self, OutboundError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutboundError::Alert {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            targets,
            telegram_base: TELEGRAM_API_BASE.to_string(),
        })
    }

    /// Build from the `[alerts]` section. Telegram needs both token and chat id.
    pub fn from_config(config: &AlertsConfig) -> Result<Self, OutboundError> {
        let mut targets = Vec::new();
        if let Some(url) = non_empty(&config.slack_webhook) {
            targets.push(WebhookTarget::Slack { url });
        }
        if let Some(url) = non_empty(&config.discord_webhook) {
            targets.push(WebhookTarget::Discord { url });
        }
        match (
            non_empty(&config.telegram_bot_token),
            non_empty(&config.telegram_chat_id),
        ) {
            (Some(bot_token), Some(chat_id)) => {
                targets.push(WebhookTarget::Telegram { bot_token, chat_id });
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("telegram alerts need both telegram_bot_token and telegram_chat_id; skipping");
            }
            (None, None) => {}
        }

        Self::new(targets, Duration::from_secs(config.timeout_secs))
    }

    /// Configured destinations.
    pub fn targets(&self) -> &[WebhookTarget] {
        &self.targets
    }

    /// Overrides the Telegram API base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_telegram_base(mut self, url: String) -> Self {
        self.telegram_base = url;
        self
    }

    async fn post(
        &self,
        target: &WebhookTarget,
        message: &str,
        severity: AlertSeverity,
    ) -> Result<(), OutboundError> {
        let now = Utc::now();
        let (url, body) = match target {
            WebhookTarget::Slack { url } => (url.clone(), payload::slack(message, severity, now)),
            WebhookTarget::Discord { url } => {
                (url.clone(), payload::discord(message, severity, now))
            }
            WebhookTarget::Telegram { bot_token, chat_id } => (
                format!("{}/bot{bot_token}/sendMessage", self.telegram_base),
                payload::telegram(chat_id, message, severity),
            ),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OutboundError::Alert {
                message: format!("{} request failed: {e}", target.label()),
            })?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(OutboundError::Alert {
                message: format!("{} responded with {status}", target.label()),
            })
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl PluginAdapter for WebhookAlerter {
    fn name(&self) -> &str {
        "webhook-alerter"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Alerter
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        if self.targets.is_empty() {
            Ok(HealthStatus::Degraded("no alert targets configured".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    async fn notify(&self, message: &str, severity: AlertSeverity) {
        let sends = self
            .targets
            .iter()
            .map(|target| async move { (target, self.post(target, message, severity).await) });

        for (target, result) in futures::future::join_all(sends).await {
            match result {
                Ok(()) => debug!(target = target.label(), %severity, "alert delivered"),
                Err(e) => warn!(target = target.label(), error = %e, "alert delivery failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alerter(targets: Vec<WebhookTarget>) -> WebhookAlerter {
        WebhookAlerter::new(targets, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn slack_and_discord_receive_payloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slack"))
            .and(body_partial_json(serde_json::json!({
                "attachments": [{"color": "#FF0000", "text": "all identities blocked"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/discord"))
            .and(body_partial_json(serde_json::json!({
                "embeds": [{"description": "all identities blocked"}]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let alerter = alerter(vec![
            WebhookTarget::Slack {
                url: format!("{}/slack", server.uri()),
            },
            WebhookTarget::Discord {
                url: format!("{}/discord", server.uri()),
            },
        ]);
        alerter
            .notify("all identities blocked", AlertSeverity::Critical)
            .await;
    }

    #[tokio::test]
    async fn telegram_posts_to_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "parse_mode": "Markdown"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let alerter = alerter(vec![WebhookTarget::Telegram {
            bot_token: "TOKEN".into(),
            chat_id: "42".into(),
        }])
        .with_telegram_base(server.uri());
        alerter.notify("daily summary", AlertSeverity::Info).await;
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_delivery_is_logged_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let alerter = alerter(vec![WebhookTarget::Slack {
            url: format!("{}/slack", server.uri()),
        }]);
        alerter.notify("bounce rate high", AlertSeverity::Warning).await;

        assert!(logs_contain("alert delivery failed"));
    }

    #[tokio::test]
    async fn unreachable_target_does_not_panic() {
        let alerter = alerter(vec![WebhookTarget::Discord {
            url: "http://127.0.0.1:9/unreachable".into(),
        }]);
        alerter.notify("ignored", AlertSeverity::Info).await;
    }

    #[test]
    fn from_config_requires_complete_telegram_pair() {
        let config = AlertsConfig {
            slack_webhook: Some("https://hooks.slack.test/x".into()),
            discord_webhook: Some("   ".into()),
            telegram_bot_token: Some("token".into()),
            telegram_chat_id: None,
            timeout_secs: 10,
        };
        let alerter = WebhookAlerter::from_config(&config).unwrap();
        assert_eq!(
            alerter.targets(),
            &[WebhookTarget::Slack {
                url: "https://hooks.slack.test/x".into()
            }]
        );
    }

    #[test]
    fn empty_config_yields_no_targets() {
        let alerter = WebhookAlerter::from_config(&AlertsConfig::default()).unwrap();
        assert!(alerter.targets().is_empty());
    }
}
