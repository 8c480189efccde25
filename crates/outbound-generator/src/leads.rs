// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead sources: a CSV file and the stored `recipients` table.
//!
//! Both apply the same matching rule. Empty criteria match every lead.
//! Otherwise a lead matches when its campaign tag equals the criteria, or
//! its company or title contains it (case-insensitive).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use outbound_core::traits::{LeadSource, PluginAdapter};
use outbound_core::types::{AdapterType, HealthStatus, Recipient};
use outbound_core::OutboundError;
use outbound_storage::queries::recipients;
use outbound_storage::Database;

/// One CSV row. Only `email` is required.
#[derive(Debug, Deserialize)]
struct LeadRow {
    #[serde(alias = "Email", alias = "EMAIL")]
    email: String,
    #[serde(default, alias = "Name", alias = "full_name")]
    name: Option<String>,
    #[serde(default, alias = "Company", alias = "organization")]
    company: Option<String>,
    #[serde(default, alias = "Title", alias = "job_title")]
    title: Option<String>,
    #[serde(default, alias = "Campaign", alias = "campaign_id")]
    campaign: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LeadRow {
    fn into_recipient(self) -> Option<Recipient> {
        let email = self.email.trim().to_ascii_lowercase();
        let (local, domain) = email.split_once('@')?;
        if local.is_empty() || !domain.contains('.') {
            return None;
        }
        Some(Recipient {
            email,
            name: non_empty(self.name),
            company: non_empty(self.company),
            title: non_empty(self.title),
            campaign_id: non_empty(self.campaign),
        })
    }
}

/// Parse leads from CSV text with a header row.
///
/// Rows without a usable address are skipped with a warning. Later rows for
/// an address already seen are dropped.
pub fn parse_leads(data: &[u8]) -> Result<Vec<Recipient>, OutboundError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let mut seen = HashSet::new();
    let mut leads = Vec::new();
    for (line, row) in reader.deserialize::<LeadRow>().enumerate() {
        let row = row.map_err(|e| OutboundError::Generator {
            message: format!("invalid lead on row {}", line + 2),
            source: Some(Box::new(e)),
        })?;
        let raw = row.email.clone();
        match row.into_recipient() {
            Some(lead) if seen.insert(lead.email.clone()) => leads.push(lead),
            Some(lead) => debug!(email = %lead.email, "duplicate lead dropped"),
            None => warn!(row = line + 2, email = %raw, "lead without a valid address skipped"),
        }
    }
    Ok(leads)
}

/// Read and parse a lead CSV file.
pub async fn read_leads(path: &Path) -> Result<Vec<Recipient>, OutboundError> {
    let data = tokio::fs::read(path).await.map_err(|e| OutboundError::Generator {
        message: format!("cannot read leads file {}", path.display()),
        source: Some(Box::new(e)),
    })?;
    parse_leads(&data)
}

/// Outcome of loading a lead file into the `recipients` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub read: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Load a lead CSV into the `recipients` table.
pub async fn import_leads(
    db: &Database,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<ImportReport, OutboundError> {
    let leads = read_leads(path).await?;
    let mut report = ImportReport {
        read: leads.len(),
        ..ImportReport::default()
    };
    for lead in &leads {
        if recipients::upsert(db, lead, now).await? {
            report.inserted += 1;
        } else {
            report.updated += 1;
        }
    }
    info!(
        path = %path.display(),
        read = report.read,
        inserted = report.inserted,
        "leads imported"
    );
    Ok(report)
}

fn matches(lead: &Recipient, criteria: &str) -> bool {
    if criteria.is_empty() {
        return true;
    }
    if lead.campaign_id.as_deref() == Some(criteria) {
        return true;
    }
    let needle = criteria.to_lowercase();
    [&lead.company, &lead.title]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Lead source that re-reads a CSV file on every fetch, so edits to the
/// file are picked up without a restart.
pub struct CsvLeadSource {
    path: PathBuf,
}

impl CsvLeadSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PluginAdapter for CsvLeadSource {
    fn name(&self) -> &str {
        "csv-leads"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::LeadSource
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a file",
                self.path.display()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl LeadSource for CsvLeadSource {
    async fn fetch_candidates(
        &self,
        criteria: &str,
        limit: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Recipient>, OutboundError> {
        let criteria = criteria.trim();
        let leads = read_leads(&self.path).await?;
        Ok(leads
            .into_iter()
            .filter(|lead| !exclude.contains(&lead.email) && matches(lead, criteria))
            .take(limit)
            .collect())
    }
}

/// Lead source backed by the `recipients` table (filled by `import-leads`).
/// Invalid, suppressed and already-drafted addresses are never returned.
pub struct TableLeadSource {
    db: Database,
}

impl TableLeadSource {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PluginAdapter for TableLeadSource {
    fn name(&self) -> &str {
        "table-leads"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::LeadSource
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        match recipients::count(&self.db).await {
            Ok(0) => Ok(HealthStatus::Degraded("no recipients imported".into())),
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl LeadSource for TableLeadSource {
    async fn fetch_candidates(
        &self,
        criteria: &str,
        limit: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Recipient>, OutboundError> {
        recipients::candidates(&self.db, criteria, limit, exclude).await
    }
}
