// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-based triggers evaluated on every orchestrator tick.
//!
//! Daily triggers follow a catch-up rule: once the configured local time has
//! passed, the trigger is due until it fires for that local date, so a late
//! or delayed tick still fires it.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use outbound_config::model::CampaignScheduleConfig;
use outbound_config::validation::{parse_hhmm, parse_weekday};
use outbound_core::OutboundError;

/// What a tick decided to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Scan,
    Reputation,
    Campaign { campaign: String, run_key: String },
    Summary,
    Heartbeat,
}

/// Fires every `every`, starting immediately.
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    every: chrono::Duration,
    last: Option<DateTime<Utc>>,
}

impl IntervalTrigger {
    pub fn new(every: chrono::Duration) -> Self {
        Self { every, last: None }
    }

    pub fn due(&self, now: DateTime<Utc>) -> bool {
        self.last.is_none_or(|last| now - last >= self.every)
    }

    pub fn mark(&mut self, now: DateTime<Utc>) {
        self.last = Some(now);
    }
}

/// Fires once per local date at or after `at`.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    name: &'static str,
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
}

impl DailyTrigger {
    pub fn new(name: &'static str, at: NaiveTime) -> Self {
        Self {
            name,
            at,
            last_fired: None,
        }
    }

    /// Parse `HH:MM`.
    pub fn parse(name: &'static str, at: &str) -> Result<Self, OutboundError> {
        let at = parse_hhmm(at)
            .ok_or_else(|| OutboundError::Config(format!("{name}: invalid time '{at}', expected HH:MM")))?;
        Ok(Self::new(name, at))
    }

    pub fn due(&self, local: NaiveDateTime) -> bool {
        local.time() >= self.at && self.last_fired != Some(local.date())
    }

    pub fn mark(&mut self, date: NaiveDate) {
        self.last_fired = Some(date);
    }

    /// Key persisted in `scheduler_runs` so restarts do not fire twice.
    pub fn run_key(&self, date: NaiveDate) -> String {
        format!("{}@{}", self.name, date.format("%Y-%m-%d"))
    }
}

/// Run keys already handled on the current local date. Keys from earlier
/// dates are dropped as soon as the date changes.
#[derive(Debug, Clone, Default)]
pub struct FiredToday {
    date: Option<NaiveDate>,
    keys: HashSet<String>,
}

impl FiredToday {
    pub fn contains(&mut self, date: NaiveDate, key: &str) -> bool {
        self.roll(date);
        self.keys.contains(key)
    }

    pub fn insert(&mut self, date: NaiveDate, key: String) {
        self.roll(date);
        self.keys.insert(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn roll(&mut self, date: NaiveDate) {
        if self.date != Some(date) {
            self.keys.clear();
            self.date = Some(date);
        }
    }
}

/// A configured `[[scheduler.campaigns]]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignSchedule {
    pub campaign: String,
    pub days: Vec<Weekday>,
    pub at: NaiveTime,
}

impl CampaignSchedule {
    pub fn from_config(config: &CampaignScheduleConfig) -> Result<Self, OutboundError> {
        let days = config
            .days
            .iter()
            .map(|d| {
                parse_weekday(d).ok_or_else(|| {
                    OutboundError::Config(format!(
                        "scheduled run for '{}': unknown day '{d}'",
                        config.campaign
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let at = parse_hhmm(&config.time).ok_or_else(|| {
            OutboundError::Config(format!(
                "scheduled run for '{}': invalid time '{}', expected HH:MM",
                config.campaign, config.time
            ))
        })?;
        Ok(Self {
            campaign: config.campaign.clone(),
            days,
            at,
        })
    }

    /// Scheduled for this weekday and the time has come.
    pub fn due(&self, local: NaiveDateTime) -> bool {
        self.days.contains(&local.weekday()) && local.time() >= self.at
    }

    /// `campaign@YYYY-MM-DD HH:MM`, unique per scheduled occurrence.
    pub fn run_key(&self, date: NaiveDate) -> String {
        format!(
            "{}@{} {}",
            self.campaign,
            date.format("%Y-%m-%d"),
            self.at.format("%H:%M")
        )
    }
}
