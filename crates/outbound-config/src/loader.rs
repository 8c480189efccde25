// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./outbound.toml` > `~/.config/outbound/outbound.toml`
//! > `/etc/outbound/outbound.toml` with environment variable overrides via the
//! `OUTBOUND_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::OutboundConfig;

/// Top-level sections that can be overridden from the environment.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "sending",
    "warmup",
    "reputation",
    "throttle",
    "queue",
    "generator",
    "mailbox",
    "scheduler",
    "alerts",
    "smtp",
    "imap",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/outbound/outbound.toml` (system-wide)
/// 3. `~/.config/outbound/outbound.toml` (user XDG config)
/// 4. `./outbound.toml` (local directory)
/// 5. `OUTBOUND_*` environment variables
pub fn load_config() -> Result<OutboundConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<OutboundConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OutboundConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<OutboundConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OutboundConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(OutboundConfig::default()))
        .merge(Toml::file("/etc/outbound/outbound.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("outbound/outbound.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("outbound.toml"))
        .merge(env_provider())
}

/// Map an env key (prefix stripped, lowercased) to a dotted config path.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `OUTBOUND_SMTP_TIMEOUT_SECS` maps to `smtp.timeout_secs`. Keys that do not
/// start with a known section are passed through unchanged.
pub fn map_env_key(key: &str) -> String {
    // Figment hands keys over in their original case.
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

/// Create the environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores themselves.
fn env_provider() -> Env {
    Env::prefixed("OUTBOUND_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_first_underscore_after_section() {
        assert_eq!(map_env_key("smtp_host"), "smtp.host");
        assert_eq!(map_env_key("smtp_timeout_secs"), "smtp.timeout_secs");
        assert_eq!(
            map_env_key("generator_max_rewrites_initial"),
            "generator.max_rewrites_initial"
        );
        assert_eq!(map_env_key("alerts_slack_webhook"), "alerts.slack_webhook");
    }

    #[test]
    fn upper_case_env_keys_are_mapped() {
        assert_eq!(
            map_env_key("REPUTATION_PAUSE_THRESHOLD"),
            "reputation.pause_threshold"
        );
        assert_eq!(map_env_key("SMTP_HOST"), "smtp.host");
    }

    #[test]
    fn unknown_env_section_passes_through() {
        assert_eq!(map_env_key("identities"), "identities");
    }
}
