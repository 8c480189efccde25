// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP transport over STARTTLS (or implicit TLS on port 465).

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use outbound_config::model::SmtpConfig;
use outbound_core::OutboundError;
use outbound_core::traits::{OutboundTransport, PluginAdapter};
use outbound_core::types::{
    AdapterType, HealthStatus, OutgoingMessage, SendOutcome, SendingIdentity, domain_of,
};
use tracing::{debug, warn};

const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends through one relay, authenticating as the leased identity.
pub struct SmtpTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SmtpTransport {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn mailer(
        &self,
        identity: &SendingIdentity,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, OutboundError> {
        let builder = if self.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
        }
        .map_err(|e| OutboundError::Transport {
            message: format!("invalid relay {}: {e}", self.host),
            source: Some(Box::new(e)),
        })?;

        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(
                identity.address.clone(),
                identity.password.clone(),
            ))
            .timeout(Some(self.timeout))
            .build())
    }
}

/// Globally unique Message-ID in the sender's domain.
pub fn new_message_id(from: &str) -> String {
    let domain = domain_of(from);
    let domain = if domain.is_empty() { "localhost".to_string() } else { domain };
    format!("<{}@{domain}>", uuid::Uuid::new_v4())
}

/// Build the RFC 5322 message for `outgoing`, sent as `identity`.
pub fn build_message(
    identity: &SendingIdentity,
    outgoing: &OutgoingMessage,
    message_id: &str,
) -> Result<Message, OutboundError> {
    let from: Address = identity
        .address
        .parse()
        .map_err(|e| OutboundError::transport(format!("bad sender {}: {e}", identity.address)))?;
    let to: Address = outgoing
        .to
        .parse()
        .map_err(|e| OutboundError::transport(format!("bad recipient {}: {e}", outgoing.to)))?;

    let display = Some(identity.display_name.clone()).filter(|n| !n.trim().is_empty());
    let mut builder = Message::builder()
        .from(Mailbox::new(display, from))
        .to(Mailbox::new(outgoing.to_name.clone(), to))
        .subject(outgoing.subject.clone())
        .message_id(Some(message_id.to_string()));
    if let Some(thread) = &outgoing.thread {
        builder = builder
            .in_reply_to(thread.in_reply_to.clone())
            .references(thread.references.clone());
    }

    let message = match &outgoing.body_html {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            outgoing.body.clone(),
            html.clone(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(outgoing.body.clone()),
    };
    message.map_err(|e| OutboundError::Transport {
        message: format!("cannot build message: {e}"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl PluginAdapter for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        if self.host.trim().is_empty() {
            Ok(HealthStatus::Unhealthy("no smtp host configured".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl OutboundTransport for SmtpTransport {
    async fn send(
        &self,
        identity: &SendingIdentity,
        message: &OutgoingMessage,
    ) -> Result<SendOutcome, OutboundError> {
        let message_id = new_message_id(&identity.address);
        let email = build_message(identity, message, &message_id)?;
        let mailer = self.mailer(identity)?;

        match mailer.send(email).await {
            Ok(response) => {
                debug!(
                    identity = %identity.address,
                    to = %message.to,
                    code = %response.code(),
                    "smtp accepted message"
                );
                Ok(SendOutcome::delivered(message_id))
            }
            Err(e) => {
                let code = e.status().and_then(|c| c.to_string().parse::<u16>().ok());
                warn!(identity = %identity.address, to = %message.to, ?code, error = %e, "smtp send failed");
                Ok(SendOutcome::failed(e.to_string(), code))
            }
        }
    }
}
