// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Outbound campaign engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use outbound_core::types::SendingIdentity;

/// Top-level Outbound configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutboundConfig {
    /// Process-level settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sending window, timezone and human-like cadence.
    #[serde(default)]
    pub sending: SendingConfig,

    /// Warm-up quota ramp.
    #[serde(default)]
    pub warmup: WarmupConfig,

    /// Reputation scoring and pause thresholds.
    #[serde(default)]
    pub reputation: ReputationConfig,

    /// Recipient-domain concentration limits.
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Send worker and draft queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Draft producer settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Inbox scanning settings.
    #[serde(default)]
    pub mailbox: MailboxConfig,

    /// Orchestrator triggers.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Operator alert channels.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Outbound SMTP server.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Inbound IMAP server.
    #[serde(default)]
    pub imap: ImapConfig,

    /// Sending mailboxes.
    #[serde(default)]
    pub identities: Vec<IdentityConfig>,

    /// Campaign definitions synced into storage at startup.
    #[serde(default)]
    pub campaigns: Vec<CampaignConfig>,
}

impl OutboundConfig {
    /// The configured identities as core records.
    pub fn sending_identities(&self) -> Vec<SendingIdentity> {
        self.identities.iter().map(SendingIdentity::from).collect()
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, used in alerts and logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "outbound".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("outbound").join("outbound.db"))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "outbound.db".to_string())
}

fn default_true() -> bool {
    true
}

/// Sending window and cadence configuration.
///
/// Times are interpreted in the target recipients' local time, described by a
/// standard UTC offset and an optional US daylight-saving rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SendingConfig {
    /// Standard (winter) UTC offset of the target timezone, in hours.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    /// Apply the US daylight-saving rule to the offset.
    #[serde(default = "default_true")]
    pub observe_us_dst: bool,

    /// First local hour of the sending window.
    #[serde(default = "default_window_start")]
    pub window_start_hour: u32,

    /// Local hour at which the sending window closes.
    #[serde(default = "default_window_end")]
    pub window_end_hour: u32,

    /// Do not send on Saturdays and Sundays.
    #[serde(default = "default_true")]
    pub skip_weekends: bool,

    /// Do not send on US holidays.
    #[serde(default = "default_true")]
    pub skip_holidays: bool,

    /// Number of sending sessions per identity per day.
    #[serde(default = "default_session_count")]
    pub session_count: u32,

    /// Lower bound of the per-identity cooldown, in minutes.
    #[serde(default = "default_min_delay")]
    pub min_delay_mins: u32,

    /// Upper bound of the per-identity cooldown, in minutes.
    #[serde(default = "default_max_delay")]
    pub max_delay_mins: u32,

    /// Gaussian jitter applied to cooldowns, as a fraction of the base.
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: f64,

    /// Probability that a send cycle is skipped to simulate a break.
    #[serde(default = "default_skip_probability")]
    pub skip_probability: f64,

    /// How long an identity stays blocked after a policy rejection.
    #[serde(default = "default_block_hours")]
    pub block_hours: u32,
}

impl Default for SendingConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset(),
            observe_us_dst: true,
            window_start_hour: default_window_start(),
            window_end_hour: default_window_end(),
            skip_weekends: true,
            skip_holidays: true,
            session_count: default_session_count(),
            min_delay_mins: default_min_delay(),
            max_delay_mins: default_max_delay(),
            jitter_pct: default_jitter_pct(),
            skip_probability: default_skip_probability(),
            block_hours: default_block_hours(),
        }
    }
}

fn default_utc_offset() -> i32 {
    -5
}

fn default_window_start() -> u32 {
    9
}

fn default_window_end() -> u32 {
    17
}

fn default_session_count() -> u32 {
    3
}

fn default_min_delay() -> u32 {
    8
}

fn default_max_delay() -> u32 {
    14
}

fn default_jitter_pct() -> f64 {
    0.30
}

fn default_skip_probability() -> f64 {
    0.04
}

fn default_block_hours() -> u32 {
    24
}

/// Warm-up ramp configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WarmupConfig {
    /// Limit new identities by age.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Daily limit for identity age week 1, 2, 3, ... ; later weeks use `per_mailbox_limit`.
    #[serde(default = "default_weekly_limits")]
    pub weekly_limits: Vec<u32>,

    /// Daily limit of a fully warmed identity.
    #[serde(default = "default_per_mailbox_limit")]
    pub per_mailbox_limit: u32,

    /// Absolute ceiling on any identity's daily quota.
    #[serde(default = "default_hard_cap")]
    pub hard_cap: u32,

    /// Optional fleet-wide daily target, split evenly across active identities.
    #[serde(default)]
    pub daily_target: Option<u32>,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weekly_limits: default_weekly_limits(),
            per_mailbox_limit: default_per_mailbox_limit(),
            hard_cap: default_hard_cap(),
            daily_target: None,
        }
    }
}

fn default_weekly_limits() -> Vec<u32> {
    vec![5, 12, 25, 45]
}

fn default_per_mailbox_limit() -> u32 {
    50
}

fn default_hard_cap() -> u32 {
    500
}

/// Reputation scoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReputationConfig {
    /// Identities scoring below this are never allocated.
    #[serde(default = "default_pause_threshold")]
    pub pause_threshold: u32,

    /// Identities scoring below this raise a warning alert.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,

    /// Rolling window, in days, over which rates are computed.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Bounce rate above which a warning alert is raised.
    #[serde(default = "default_alert_bounce_rate")]
    pub alert_bounce_rate: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            pause_threshold: default_pause_threshold(),
            warning_threshold: default_warning_threshold(),
            window_days: default_window_days(),
            alert_bounce_rate: default_alert_bounce_rate(),
        }
    }
}

fn default_pause_threshold() -> u32 {
    40
}

fn default_warning_threshold() -> u32 {
    60
}

fn default_window_days() -> u32 {
    3
}

fn default_alert_bounce_rate() -> f64 {
    0.05
}

/// Recipient-domain concentration limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    /// Maximum sends per recipient domain per local day.
    #[serde(default = "default_max_per_domain")]
    pub max_per_domain: u32,

    /// Multiplier applied to the cap for webmail providers.
    #[serde(default = "default_webmail_multiplier")]
    pub webmail_multiplier: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_per_domain: default_max_per_domain(),
            webmail_multiplier: default_webmail_multiplier(),
        }
    }
}

fn default_max_per_domain() -> u32 {
    5
}

fn default_webmail_multiplier() -> u32 {
    10
}

/// Send worker and queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Number of concurrent send workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Claimed drafts older than this are returned to `ready`.
    #[serde(default = "default_stale_claim_mins")]
    pub stale_claim_mins: u32,

    /// Upper bound on a single send.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    /// Sleep on holidays and outside sending days.
    #[serde(default = "default_holiday_sleep")]
    pub holiday_sleep_secs: u64,

    /// Sleep after a simulated break.
    #[serde(default = "default_skip_sleep")]
    pub skip_sleep_secs: u64,

    /// Sleep when every identity is exhausted for the day.
    #[serde(default = "default_exhausted_sleep")]
    pub exhausted_sleep_secs: u64,

    /// Sleep when no draft is ready.
    #[serde(default = "default_no_draft_sleep")]
    pub no_draft_sleep_secs: u64,

    /// Cap on cooldown-driven waits.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,

    /// Sleep after an unexpected error.
    #[serde(default = "default_error_sleep")]
    pub error_sleep_secs: u64,

    /// Minimum spacing between stale-claim sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            stale_claim_mins: default_stale_claim_mins(),
            send_timeout_secs: default_send_timeout(),
            holiday_sleep_secs: default_holiday_sleep(),
            skip_sleep_secs: default_skip_sleep(),
            exhausted_sleep_secs: default_exhausted_sleep(),
            no_draft_sleep_secs: default_no_draft_sleep(),
            max_wait_secs: default_max_wait(),
            error_sleep_secs: default_error_sleep(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_workers() -> usize {
    1
}

fn default_stale_claim_mins() -> u32 {
    30
}

fn default_send_timeout() -> u64 {
    60
}

fn default_holiday_sleep() -> u64 {
    3600
}

fn default_skip_sleep() -> u64 {
    120
}

fn default_exhausted_sleep() -> u64 {
    300
}

fn default_no_draft_sleep() -> u64 {
    30
}

fn default_max_wait() -> u64 {
    300
}

fn default_error_sleep() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    300
}

/// Draft producer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Run the background producer.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum review score for a draft to become `ready`.
    #[serde(default = "default_review_threshold")]
    pub review_threshold: u32,

    /// Rewrite attempts for first-contact drafts.
    #[serde(default = "default_max_rewrites_initial")]
    pub max_rewrites_initial: u32,

    /// Rewrite attempts for follow-ups.
    #[serde(default = "default_max_rewrites_followup")]
    pub max_rewrites_followup: u32,

    /// Stop topping up once this many drafts are `ready`.
    #[serde(default = "default_target_ready")]
    pub target_ready: u32,

    /// Recipients requested per campaign per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Days after the initial send before follow-up 1.
    #[serde(default = "default_followup_1_days")]
    pub followup_1_days: u32,

    /// Days after the initial send before follow-up 2.
    #[serde(default = "default_followup_2_days")]
    pub followup_2_days: u32,

    /// Maximum follow-ups per recipient.
    #[serde(default = "default_max_followups")]
    pub max_followups: u32,

    /// Sleep after a cycle that created drafts.
    #[serde(default = "default_productive_sleep")]
    pub productive_sleep_secs: u64,

    /// Sleep after a cycle that created nothing.
    #[serde(default = "default_idle_sleep")]
    pub idle_sleep_secs: u64,

    /// CSV file of leads (`email,name,company,title`).
    #[serde(default)]
    pub leads_csv: Option<String>,

    /// Sender name used by the template generator.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Sender company used by the template generator.
    #[serde(default = "default_company")]
    pub company: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            review_threshold: default_review_threshold(),
            max_rewrites_initial: default_max_rewrites_initial(),
            max_rewrites_followup: default_max_rewrites_followup(),
            target_ready: default_target_ready(),
            batch_size: default_batch_size(),
            followup_1_days: default_followup_1_days(),
            followup_2_days: default_followup_2_days(),
            max_followups: default_max_followups(),
            productive_sleep_secs: default_productive_sleep(),
            idle_sleep_secs: default_idle_sleep(),
            leads_csv: None,
            sender_name: default_sender_name(),
            company: default_company(),
        }
    }
}

fn default_review_threshold() -> u32 {
    70
}

fn default_max_rewrites_initial() -> u32 {
    3
}

fn default_max_rewrites_followup() -> u32 {
    2
}

fn default_target_ready() -> u32 {
    50
}

fn default_batch_size() -> u32 {
    10
}

fn default_followup_1_days() -> u32 {
    3
}

fn default_followup_2_days() -> u32 {
    6
}

fn default_max_followups() -> u32 {
    2
}

fn default_productive_sleep() -> u64 {
    30
}

fn default_idle_sleep() -> u64 {
    300
}

fn default_sender_name() -> String {
    "Alex".to_string()
}

fn default_company() -> String {
    "Outbound".to_string()
}

/// Inbox scanning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MailboxConfig {
    /// Scan identity inboxes for replies and bounces.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minutes between periodic scans.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_mins: u32,

    /// Per-identity scan timeout.
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,

    /// Overall bound on the scan performed at startup.
    #[serde(default = "default_startup_scan_timeout")]
    pub startup_scan_timeout_secs: u64,

    /// How far back each scan looks.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Processed-message ids older than this are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_mins: default_scan_interval(),
            scan_timeout_secs: default_scan_timeout(),
            startup_scan_timeout_secs: default_startup_scan_timeout(),
            lookback_days: default_lookback_days(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_scan_interval() -> u32 {
    30
}

fn default_scan_timeout() -> u64 {
    30
}

fn default_startup_scan_timeout() -> u64 {
    60
}

fn default_lookback_days() -> u32 {
    7
}

fn default_retention_days() -> u32 {
    14
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between trigger evaluations.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Local `HH:MM` at which reputation is recomputed.
    #[serde(default = "default_reputation_time")]
    pub reputation_time: String,

    /// Local `HH:MM` at which the daily summary is sent.
    #[serde(default = "default_summary_time")]
    pub summary_time: String,

    /// Minutes between heartbeats.
    #[serde(default = "default_heartbeat_mins")]
    pub heartbeat_mins: u32,

    /// How long in-flight work may run after a shutdown signal.
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Scheduled campaign runs.
    #[serde(default)]
    pub campaigns: Vec<CampaignScheduleConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            reputation_time: default_reputation_time(),
            summary_time: default_summary_time(),
            heartbeat_mins: default_heartbeat_mins(),
            grace_period_secs: default_grace_period(),
            campaigns: Vec::new(),
        }
    }
}

fn default_tick_secs() -> u64 {
    60
}

fn default_reputation_time() -> String {
    "08:00".to_string()
}

fn default_summary_time() -> String {
    "17:00".to_string()
}

fn default_heartbeat_mins() -> u32 {
    5
}

fn default_grace_period() -> u64 {
    15
}

/// One scheduled campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignScheduleConfig {
    /// Campaign id to run.
    pub campaign: String,

    /// Days of week (`mon`, `tue`, ...).
    pub days: Vec<String>,

    /// Local `HH:MM`.
    pub time: String,
}

/// Alert channel configuration. Every channel is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    /// Slack incoming-webhook URL.
    #[serde(default)]
    pub slack_webhook: Option<String>,

    /// Discord webhook URL.
    #[serde(default)]
    pub discord_webhook: Option<String>,

    /// Telegram bot token.
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat id receiving alerts.
    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    /// HTTP timeout for a single webhook call.
    #[serde(default = "default_alert_timeout")]
    pub timeout_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            slack_webhook: None,
            discord_webhook: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            timeout_secs: default_alert_timeout(),
        }
    }
}

fn default_alert_timeout() -> u64 {
    10
}

/// Outbound SMTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// SMTP relay host (STARTTLS).
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP submission port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Connect and transmit timeout.
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            timeout_secs: default_send_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.zoho.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

/// Inbound IMAP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImapConfig {
    /// IMAP host (implicit TLS).
    #[serde(default = "default_imap_host")]
    pub host: String,

    /// IMAP port.
    #[serde(default = "default_imap_port")]
    pub port: u16,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: default_imap_host(),
            port: default_imap_port(),
        }
    }
}

fn default_imap_host() -> String {
    "imap.zoho.com".to_string()
}

fn default_imap_port() -> u16 {
    993
}

/// One sending mailbox.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Mailbox address, also the login.
    pub address: String,

    /// Display name on the From header.
    #[serde(default)]
    pub display_name: String,

    /// Mailbox password (app password).
    #[serde(default)]
    pub password: String,

    /// Per-identity daily cap.
    #[serde(default)]
    pub daily_limit: Option<u32>,

    /// Start date of warm-up (`YYYY-MM-DD`).
    #[serde(default)]
    pub warmup_start: Option<NaiveDate>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("address", &self.address)
            .field("display_name", &self.display_name)
            .field("password", &"[REDACTED]")
            .field("daily_limit", &self.daily_limit)
            .field("warmup_start", &self.warmup_start)
            .finish()
    }
}

impl From<&IdentityConfig> for SendingIdentity {
    fn from(cfg: &IdentityConfig) -> Self {
        SendingIdentity {
            address: cfg.address.trim().to_ascii_lowercase(),
            display_name: cfg.display_name.clone(),
            password: cfg.password.clone(),
            daily_limit: cfg.daily_limit,
            warmup_start: cfg.warmup_start,
        }
    }
}

/// One campaign definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    /// Stable campaign id.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Pitch summary handed to the content generator.
    #[serde(default)]
    pub description: String,

    /// Opaque lead-source criteria.
    #[serde(default)]
    pub target: String,

    /// Maximum number of first-contact drafts for this campaign.
    #[serde(default = "default_max_recipients")]
    pub max_recipients: u32,

    /// Whether the producer should fill drafts for this campaign continuously.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_max_recipients() -> u32 {
    100
}
