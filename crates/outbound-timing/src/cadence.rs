// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send spacing: cooldowns, random skips and post-reply pauses.

use std::time::Duration;

use rand::Rng;

/// Lower bound for [`cooldown_minutes`].
pub const MIN_COOLDOWN: Duration = Duration::from_secs(60);

/// Lower bound for [`human_cooldown`].
pub const HUMAN_COOLDOWN_FLOOR: Duration = Duration::from_secs(5 * 60);

/// Per-hour delay multipliers for local hours 7..=18. Higher means slower:
/// lunch and end of day are quieter.
const TIME_OF_DAY: [(u32, f64); 12] = [
    (7, 1.1),
    (8, 1.05),
    (9, 1.0),
    (10, 1.0),
    (11, 1.05),
    (12, 1.15),
    (13, 1.05),
    (14, 1.0),
    (15, 1.0),
    (16, 1.05),
    (17, 1.1),
    (18, 1.15),
];

/// Delay multiplier for a local hour. Hours outside 7..=18 are neutral.
pub fn time_of_day_multiplier(local_hour: u32) -> f64 {
    TIME_OF_DAY
        .iter()
        .find(|(h, _)| *h == local_hour)
        .map_or(1.0, |(_, m)| *m)
}

/// Slow-down applied when an identity's recent bounce rate is elevated.
pub fn bounce_slowdown(bounce_rate: f64) -> f64 {
    if bounce_rate >= 0.10 {
        3.0
    } else if bounce_rate >= 0.05 {
        2.0
    } else if bounce_rate >= 0.03 {
        1.5
    } else {
        1.0
    }
}

fn uniform_minutes(base_min: u32, base_max: u32, rng: &mut impl Rng) -> f64 {
    let (lo, hi) = if base_min <= base_max {
        (base_min, base_max)
    } else {
        (base_max, base_min)
    };
    f64::from(rng.gen_range(lo..=hi))
}

fn minutes(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0) * 60.0)
}

/// A uniform draw in `[base_min, base_max]` minutes, scaled by
/// [`bounce_slowdown`], never below [`MIN_COOLDOWN`].
pub fn cooldown_minutes(
    base_min: u32,
    base_max: u32,
    bounce_rate: f64,
    rng: &mut impl Rng,
) -> Duration {
    let drawn = uniform_minutes(base_min, base_max, rng) * bounce_slowdown(bounce_rate);
    minutes(drawn).max(MIN_COOLDOWN)
}

/// Standard normal sample (Box-Muller).
fn standard_normal(rng: &mut impl Rng) -> f64 {
    // 1 - u keeps the argument of ln in (0, 1].
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Cooldown that mimics a person working through a list.
///
/// Draws a uniform base, applies the time-of-day multiplier and the bounce
/// slowdown, then Gaussian jitter with `sigma = adjusted * jitter_pct / 2`.
/// The result is whole minutes, never below [`HUMAN_COOLDOWN_FLOOR`].
pub fn human_cooldown(
    base_min: u32,
    base_max: u32,
    bounce_rate: f64,
    local_hour: u32,
    jitter_pct: f64,
    rng: &mut impl Rng,
) -> Duration {
    let adjusted = uniform_minutes(base_min, base_max, rng)
        * time_of_day_multiplier(local_hour)
        * bounce_slowdown(bounce_rate);
    let sigma = adjusted * jitter_pct.max(0.0) / 2.0;
    let jittered = (adjusted + sigma * standard_normal(rng)).round();
    let result = minutes(jittered).max(HUMAN_COOLDOWN_FLOOR);
    tracing::trace!(adjusted, jittered, secs = result.as_secs(), "human cooldown");
    result
}

/// Bernoulli draw: skip this send opportunity.
pub fn should_skip(probability: f64, rng: &mut impl Rng) -> bool {
    let p = probability.clamp(0.0, 1.0);
    p > 0.0 && rng.gen_bool(p)
}

/// How long an identity rests after receiving a genuine reply: 30-90 minutes.
pub fn reply_pause(rng: &mut impl Rng) -> Duration {
    Duration::from_secs(rng.gen_range(30u64..=90) * 60)
}
