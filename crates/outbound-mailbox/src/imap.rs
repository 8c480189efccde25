// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IMAP inbox reader over implicit TLS.

use std::collections::HashMap;
use std::sync::Arc;

use async_imap::Session;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use mail_parser::MessageParser;
use outbound_config::model::ImapConfig;
use outbound_core::OutboundError;
use outbound_core::traits::{InboundTransport, PluginAdapter};
use outbound_core::types::{AdapterType, HealthStatus, InboundMessage, SendingIdentity};
use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

use crate::classifier::extract_address;

type ImapSession = Session<TlsStream<TcpStream>>;

const INBOX: &str = "INBOX";

fn mailbox_err(context: &str, e: impl std::fmt::Display) -> OutboundError {
    OutboundError::mailbox(format!("{context}: {e}"))
}

/// Reads identity inboxes over IMAP.
///
/// UIDs of fetched messages are remembered per identity so that
/// [`InboundTransport::mark_seen`] can flag them by message id later.
pub struct ImapTransport {
    host: String,
    port: u16,
    connector: TlsConnector,
    uids: Mutex<HashMap<String, HashMap<String, u32>>>,
}

impl ImapTransport {
    pub fn new(config: &ImapConfig) -> Self {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let tls = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            host: config.host.clone(),
            port: config.port,
            connector: TlsConnector::from(Arc::new(tls)),
            uids: Mutex::new(HashMap::new()),
        }
    }

    async fn connect(&self, identity: &SendingIdentity) -> Result<ImapSession, OutboundError> {
        debug!(host = %self.host, port = self.port, identity = %identity.address, "connecting to imap");
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| mailbox_err("tcp connect failed", e))?;
        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| mailbox_err("invalid imap host", e))?;
        let tls = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| mailbox_err("tls handshake failed", e))?;

        let client = async_imap::Client::new(tls);
        let mut session = client
            .login(&identity.address, &identity.password)
            .await
            .map_err(|(e, _)| mailbox_err("login failed", e))?;
        session
            .select(INBOX)
            .await
            .map_err(|e| mailbox_err("select failed", e))?;
        Ok(session)
    }

    async fn logout(session: &mut ImapSession) {
        if let Err(e) = session.logout().await {
            debug!(error = %e, "imap logout failed");
        }
    }

    async fn fetch(
        session: &mut ImapSession,
        lookback_days: u32,
    ) -> Result<Vec<(u32, InboundMessage)>, OutboundError> {
        let since = (Utc::now() - Duration::days(i64::from(lookback_days)))
            .format("%d-%b-%Y")
            .to_string();
        let found = session
            .uid_search(format!("UNSEEN SINCE {since}"))
            .await
            .map_err(|e| mailbox_err("search failed", e))?;
        if found.is_empty() {
            return Ok(Vec::new());
        }
        let mut uids: Vec<u32> = found.into_iter().collect();
        uids.sort_unstable();
        let uid_list = join_uids(&uids);

        let fetches: Vec<_> = session
            .uid_fetch(&uid_list, "(UID BODY.PEEK[])")
            .await
            .map_err(|e| mailbox_err("fetch failed", e))?
            .try_collect()
            .await
            .map_err(|e| mailbox_err("fetch stream failed", e))?;

        let parser = MessageParser::default();
        let mut out = Vec::with_capacity(fetches.len());
        for fetch in &fetches {
            let (Some(uid), Some(raw)) = (fetch.uid, fetch.body()) else {
                continue;
            };
            match parse_message(&parser, uid, raw) {
                Some(message) => out.push((uid, message)),
                None => warn!(uid, "unparseable message skipped"),
            }
        }
        Ok(out)
    }
}

fn join_uids(uids: &[u32]) -> String {
    uids.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}

fn bracketed(id: &str) -> String {
    let id = id.trim().trim_start_matches('<').trim_end_matches('>');
    format!("<{id}>")
}

/// Turn a raw RFC 5322 message into an [`InboundMessage`]. Messages without
/// a Message-ID are keyed by UID.
pub(crate) fn parse_message(parser: &MessageParser, uid: u32, raw: &[u8]) -> Option<InboundMessage> {
    let message = parser.parse(raw)?;
    let message_id = message
        .message_id()
        .map(bracketed)
        .unwrap_or_else(|| format!("uid:{uid}"));
    let from = message
        .from()
        .and_then(|a| a.first())
        .and_then(|a| a.address())
        .map(extract_address)
        .unwrap_or_default();
    Some(InboundMessage {
        message_id,
        from,
        subject: message.subject().unwrap_or_default().to_string(),
        body: message
            .body_text(0)
            .map(|b| b.into_owned())
            .unwrap_or_default(),
        in_reply_to: message.in_reply_to().as_text().map(bracketed),
    })
}

#[async_trait]
impl PluginAdapter for ImapTransport {
    fn name(&self) -> &str {
        "imap"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inbox
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        if self.host.trim().is_empty() {
            Ok(HealthStatus::Unhealthy("no imap host configured".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        self.uids.lock().await.clear();
        Ok(())
    }
}

#[async_trait]
impl InboundTransport for ImapTransport {
    async fn fetch_unseen_since(
        &self,
        identity: &SendingIdentity,
        lookback_days: u32,
    ) -> Result<Vec<InboundMessage>, OutboundError> {
        let mut session = self.connect(identity).await?;
        let fetched = Self::fetch(&mut session, lookback_days).await;
        Self::logout(&mut session).await;
        let fetched = fetched?;

        info!(identity = %identity.address, count = fetched.len(), "imap fetch complete");
        let mut uids = self.uids.lock().await;
        let known = uids.entry(identity.address.clone()).or_default();
        Ok(fetched
            .into_iter()
            .map(|(uid, message)| {
                known.insert(message.message_id.clone(), uid);
                message
            })
            .collect())
    }

    async fn mark_seen(
        &self,
        identity: &SendingIdentity,
        message_ids: &[String],
    ) -> Result<(), OutboundError> {
        let uids: Vec<u32> = {
            let mut known = self.uids.lock().await;
            let Some(known) = known.get_mut(&identity.address) else {
                return Ok(());
            };
            message_ids.iter().filter_map(|id| known.remove(id)).collect()
        };
        if uids.is_empty() {
            return Ok(());
        }

        let mut session = self.connect(identity).await?;
        let stored = match session
            .uid_store(join_uids(&uids), "+FLAGS (\\Seen)")
            .await
        {
            Ok(stream) => stream
                .try_collect::<Vec<_>>()
                .await
                .map(|_| ())
                .map_err(|e| mailbox_err("store stream failed", e)),
            Err(e) => Err(mailbox_err("store failed", e)),
        };
        Self::logout(&mut session).await;
        stored?;
        debug!(identity = %identity.address, count = uids.len(), "messages flagged seen");
        Ok(())
    }
}
