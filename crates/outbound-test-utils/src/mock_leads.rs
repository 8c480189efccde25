// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory lead source.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use outbound_core::traits::{LeadSource, PluginAdapter};
use outbound_core::types::{AdapterType, HealthStatus, Recipient};
use outbound_core::OutboundError;

/// One `fetch_candidates` call as the source saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadQuery {
    pub criteria: String,
    pub limit: usize,
    pub exclude: HashSet<String>,
}

/// Serves a fixed list of recipients.
///
/// Matching follows the stored-recipient rules: empty criteria match
/// everything, otherwise the recipient's campaign tag must equal it.
#[derive(Default)]
pub struct MockLeadSource {
    leads: Mutex<Vec<Recipient>>,
    queries: Mutex<Vec<LeadQuery>>,
}

impl MockLeadSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Recipient>) -> Self {
        Self {
            leads: Mutex::new(leads),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub async fn add_lead(&self, lead: Recipient) {
        self.leads.lock().await.push(lead);
    }

    pub async fn queries(&self) -> Vec<LeadQuery> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockLeadSource {
    fn name(&self) -> &str {
        "mock-leads"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::LeadSource
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl LeadSource for MockLeadSource {
    async fn fetch_candidates(
        &self,
        criteria: &str,
        limit: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Recipient>, OutboundError> {
        self.queries.lock().await.push(LeadQuery {
            criteria: criteria.to_string(),
            limit,
            exclude: exclude.clone(),
        });
        let leads = self.leads.lock().await;
        Ok(leads
            .iter()
            .filter(|r| {
                criteria.is_empty() || r.campaign_id.as_deref() == Some(criteria)
            })
            .filter(|r| !exclude.contains(&r.email.to_ascii_lowercase()))
            .take(limit)
            .cloned()
            .collect())
    }
}
