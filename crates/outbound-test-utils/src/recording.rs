// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording alerter and a hand-driven clock.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use outbound_core::traits::{Alerter, PluginAdapter};
use outbound_core::types::{AdapterType, AlertSeverity, HealthStatus};
use outbound_core::OutboundError;
use outbound_timing::Clock;

/// Alerter that keeps every notification in memory.
#[derive(Default)]
pub struct RecordingAlerter {
    alerts: Mutex<Vec<(String, AlertSeverity)>>,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<(String, AlertSeverity)> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn with_severity(&self, severity: AlertSeverity) -> Vec<String> {
        self.alerts()
            .into_iter()
            .filter(|(_, s)| *s == severity)
            .map(|(m, _)| m)
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for RecordingAlerter {
    fn name(&self) -> &str {
        "recording-alerter"
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
impl Alerter for RecordingAlerter {
    async fn notify(&self, message: &str, severity: AlertSeverity) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push((message.to_string(), severity));
        }
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut current) = self.now.lock() {
            *current = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut current) = self.now.lock() {
            *current += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|n| *n).unwrap_or_else(|e| *e.into_inner())
    }
}
