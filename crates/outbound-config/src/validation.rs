// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: ordered windows, probabilities in range, unique identities,
//! parseable schedule times.

use std::collections::HashSet;

use chrono::{NaiveTime, Weekday};

use crate::diagnostic::ConfigError;
use crate::model::OutboundConfig;

/// Parse a local `HH:MM` schedule time.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Parse a day-of-week name (`mon`, `Monday`, ...).
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    value.trim().parse::<Weekday>().ok()
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or every collected error
/// (does not fail fast).
pub fn validate_config(config: &OutboundConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    validate_sending(config, &mut errors);
    validate_thresholds(config, &mut errors);
    validate_identities(config, &mut errors);
    validate_schedule(config, &mut errors);

    if config.queue.workers == 0 {
        errors.push(ConfigError::invalid("queue.workers", "must be at least 1"));
    }

    let generator = &config.generator;
    if generator.followup_2_days <= generator.followup_1_days {
        errors.push(ConfigError::invalid(
            "generator.followup_2_days",
            format!(
                "must be later than followup_1_days ({} <= {})",
                generator.followup_2_days, generator.followup_1_days
            ),
        ));
    }
    if generator.max_followups > 2 {
        errors.push(ConfigError::invalid(
            "generator.max_followups",
            format!("at most 2 follow-ups are supported, got {}", generator.max_followups),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_sending(config: &OutboundConfig, errors: &mut Vec<ConfigError>) {
    let sending = &config.sending;

    if sending.window_end_hour > 24 {
        errors.push(ConfigError::invalid(
            "sending.window_end_hour",
            format!("must be at most 24, got {}", sending.window_end_hour),
        ));
    }
    if sending.window_start_hour >= sending.window_end_hour {
        errors.push(ConfigError::invalid(
            "sending.window_start_hour",
            format!(
                "window must be non-empty ({}:00 >= {}:00)",
                sending.window_start_hour, sending.window_end_hour
            ),
        ));
    }
    if !(-12..=14).contains(&sending.utc_offset_hours) {
        errors.push(ConfigError::invalid(
            "sending.utc_offset_hours",
            format!("must be within -12..=14, got {}", sending.utc_offset_hours),
        ));
    }
    if sending.session_count == 0 {
        errors.push(ConfigError::invalid("sending.session_count", "must be at least 1"));
    }
    if sending.min_delay_mins == 0 || sending.min_delay_mins > sending.max_delay_mins {
        errors.push(ConfigError::invalid(
            "sending.min_delay_mins",
            format!(
                "must be positive and not above max_delay_mins ({} > {})",
                sending.min_delay_mins, sending.max_delay_mins
            ),
        ));
    }
    if !(0.0..=1.0).contains(&sending.skip_probability) {
        errors.push(ConfigError::invalid(
            "sending.skip_probability",
            format!("must be within 0.0..=1.0, got {}", sending.skip_probability),
        ));
    }
    if !(0.0..=1.0).contains(&sending.jitter_pct) {
        errors.push(ConfigError::invalid(
            "sending.jitter_pct",
            format!("must be within 0.0..=1.0, got {}", sending.jitter_pct),
        ));
    }
}

fn validate_thresholds(config: &OutboundConfig, errors: &mut Vec<ConfigError>) {
    let rep = &config.reputation;
    for (key, value) in [
        ("reputation.pause_threshold", rep.pause_threshold),
        ("reputation.warning_threshold", rep.warning_threshold),
        ("generator.review_threshold", config.generator.review_threshold),
    ] {
        if value > 100 {
            errors.push(ConfigError::invalid(key, format!("must be within 0..=100, got {value}")));
        }
    }
    if rep.window_days == 0 {
        errors.push(ConfigError::invalid("reputation.window_days", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&rep.alert_bounce_rate) {
        errors.push(ConfigError::invalid(
            "reputation.alert_bounce_rate",
            format!("must be within 0.0..=1.0, got {}", rep.alert_bounce_rate),
        ));
    }

    let warmup = &config.warmup;
    if warmup.per_mailbox_limit > warmup.hard_cap {
        errors.push(ConfigError::invalid(
            "warmup.per_mailbox_limit",
            format!(
                "exceeds hard_cap ({} > {})",
                warmup.per_mailbox_limit, warmup.hard_cap
            ),
        ));
    }
    if config.throttle.max_per_domain == 0 {
        errors.push(ConfigError::invalid("throttle.max_per_domain", "must be at least 1"));
    }
}

fn validate_identities(config: &OutboundConfig, errors: &mut Vec<ConfigError>) {
    let mut seen = HashSet::new();
    for (i, identity) in config.identities.iter().enumerate() {
        let address = identity.address.trim().to_ascii_lowercase();
        if !address.contains('@') {
            errors.push(ConfigError::invalid(
                format!("identities[{i}].address"),
                format!("`{}` is not an email address", identity.address),
            ));
        }
        if !seen.insert(address.clone()) {
            errors.push(ConfigError::invalid(
                format!("identities[{i}].address"),
                format!("duplicate identity `{address}`"),
            ));
        }
        if let Some(limit) = identity.daily_limit
            && limit > config.warmup.hard_cap
        {
            errors.push(ConfigError::invalid(
                format!("identities[{i}].daily_limit"),
                format!("exceeds warmup.hard_cap ({limit} > {})", config.warmup.hard_cap),
            ));
        }
    }

    let mut campaign_ids = HashSet::new();
    for (i, campaign) in config.campaigns.iter().enumerate() {
        if campaign.id.trim().is_empty() {
            errors.push(ConfigError::invalid(format!("campaigns[{i}].id"), "must not be empty"));
        }
        if !campaign_ids.insert(campaign.id.as_str()) {
            errors.push(ConfigError::invalid(
                format!("campaigns[{i}].id"),
                format!("duplicate campaign id `{}`", campaign.id),
            ));
        }
    }
}

fn validate_schedule(config: &OutboundConfig, errors: &mut Vec<ConfigError>) {
    let scheduler = &config.scheduler;

    for (key, value) in [
        ("scheduler.reputation_time", &scheduler.reputation_time),
        ("scheduler.summary_time", &scheduler.summary_time),
    ] {
        if parse_hhmm(value).is_none() {
            errors.push(ConfigError::invalid(key, format!("`{value}` is not HH:MM")));
        }
    }
    if scheduler.tick_secs == 0 {
        errors.push(ConfigError::invalid("scheduler.tick_secs", "must be at least 1"));
    }

    let known: HashSet<&str> = config.campaigns.iter().map(|c| c.id.as_str()).collect();
    for (i, entry) in scheduler.campaigns.iter().enumerate() {
        if parse_hhmm(&entry.time).is_none() {
            errors.push(ConfigError::invalid(
                format!("scheduler.campaigns[{i}].time"),
                format!("`{}` is not HH:MM", entry.time),
            ));
        }
        if entry.days.is_empty() {
            errors.push(ConfigError::invalid(
                format!("scheduler.campaigns[{i}].days"),
                "must list at least one day",
            ));
        }
        for day in &entry.days {
            if parse_weekday(day).is_none() {
                errors.push(ConfigError::invalid(
                    format!("scheduler.campaigns[{i}].days"),
                    format!("`{day}` is not a day of the week"),
                ));
            }
        }
        if !known.contains(entry.campaign.as_str()) {
            errors.push(ConfigError::invalid(
                format!("scheduler.campaigns[{i}].campaign"),
                format!("no [[campaigns]] entry with id `{}`", entry.campaign),
            ));
        }
    }
}
