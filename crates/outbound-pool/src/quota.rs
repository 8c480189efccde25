// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily send quota: warm-up tiers, warm-down after a block, global target
//! and the provider hard cap.

use outbound_config::model::WarmupConfig;

/// Reduced limits on the days right after a block expires.
const WARM_DOWN: [u32; 3] = [3, 5, 10];

/// Where an identity stands relative to its most recent block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Never blocked.
    Clear,
    /// Still blocked.
    Active,
    /// Block expired this many whole days ago.
    ExpiredDaysAgo(i64),
}

/// Limits applied to every identity.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaPolicy {
    pub warmup_enabled: bool,
    pub weekly_limits: Vec<u32>,
    pub per_mailbox_limit: u32,
    pub hard_cap: u32,
    pub daily_target: Option<u32>,
}

impl From<&WarmupConfig> for QuotaPolicy {
    fn from(config: &WarmupConfig) -> Self {
        Self {
            warmup_enabled: config.enabled,
            weekly_limits: config.weekly_limits.clone(),
            per_mailbox_limit: config.per_mailbox_limit,
            hard_cap: config.hard_cap,
            daily_target: config.daily_target,
        }
    }
}

/// Warm-down limit for a block state, if one applies.
pub fn warm_down_limit(block: BlockState) -> Option<u32> {
    match block {
        BlockState::Clear => None,
        BlockState::Active => Some(0),
        BlockState::ExpiredDaysAgo(days) => usize::try_from(days)
            .ok()
            .and_then(|d| WARM_DOWN.get(d).copied()),
    }
}

impl QuotaPolicy {
    /// Warm-up tier for an identity `age_days` old, or `None` once past the
    /// last tier.
    pub fn warmup_limit(&self, age_days: i64) -> Option<u32> {
        if !self.warmup_enabled {
            return None;
        }
        let week = usize::try_from(age_days.max(0) / 7).unwrap_or(usize::MAX);
        self.weekly_limits.get(week).copied()
    }

    /// Effective daily quota: the smallest applicable limit. Warm-down wins
    /// outright while it applies.
    pub fn daily_quota(
        &self,
        age_days: i64,
        identity_limit: Option<u32>,
        block: BlockState,
        active_identities: usize,
    ) -> u32 {
        if let Some(limit) = warm_down_limit(block) {
            return limit;
        }

        let mut quota = match self.daily_target {
            Some(target) if active_identities > 0 => {
                let active = u32::try_from(active_identities).unwrap_or(u32::MAX);
                target.div_ceil(active)
            }
            Some(_) => 0,
            None => self.per_mailbox_limit,
        };
        if let Some(limit) = identity_limit {
            quota = quota.min(limit);
        }
        if let Some(limit) = self.warmup_limit(age_days) {
            quota = quota.min(limit);
        }
        quota.min(self.hard_cap)
    }
}
