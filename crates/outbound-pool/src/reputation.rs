// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity reputation scoring over a rolling window of send outcomes.

use outbound_storage::models::WindowStats;
use serde::{Deserialize, Serialize};

/// Bounce and failure rates tolerated before the score is penalized.
const TOLERATED_RATE: f64 = 0.05;

/// A computed reputation with its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    /// 0..=100.
    pub score: u32,
    pub sends: u64,
    pub bounce_rate: f64,
    pub reply_rate: f64,
    pub fail_rate: f64,
    pub blocks: u64,
}

impl Reputation {
    /// Reputation of an identity with no recent activity.
    pub fn pristine() -> Self {
        Self {
            score: 100,
            sends: 0,
            bounce_rate: 0.0,
            reply_rate: 0.0,
            fail_rate: 0.0,
            blocks: 0,
        }
    }
}

/// Score an identity from its window statistics and block count.
///
/// Starts at 100, loses `(bounce - 5%) * 1000` and `(fail - 5%) * 300` above
/// the tolerated rates, gains `reply * 1000`, and loses 10 per block. Rates
/// are over every record in the window. No activity scores 100.
pub fn compute(stats: &WindowStats, blocks: u64) -> Reputation {
    if stats.sends == 0 {
        return Reputation {
            blocks,
            ..Reputation::pristine()
        };
    }

    let total = stats.sends as f64;
    let bounce_rate = stats.bounces as f64 / total;
    let reply_rate = stats.replies as f64 / total;
    let fail_rate = stats.failures as f64 / total;

    let mut score = 100.0;
    if bounce_rate > TOLERATED_RATE {
        score -= (bounce_rate - TOLERATED_RATE) * 1000.0;
    }
    if fail_rate > TOLERATED_RATE {
        score -= (fail_rate - TOLERATED_RATE) * 300.0;
    }
    score += reply_rate * 1000.0;
    score -= blocks as f64 * 10.0;

    Reputation {
        score: score.clamp(0.0, 100.0).round() as u32,
        sends: stats.sends,
        bounce_rate,
        reply_rate,
        fail_rate,
        blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(sends: u64, bounces: u64, replies: u64, failures: u64) -> WindowStats {
        WindowStats {
            sends,
            bounces,
            replies,
            failures,
        }
    }

    #[test]
    fn no_activity_is_perfect() {
        assert_eq!(compute(&stats(0, 0, 0, 0), 0).score, 100);
    }

    #[test]
    fn bounce_rate_above_five_percent_penalizes() {
        // 7% bounce -> -20
        let rep = compute(&stats(100, 7, 0, 0), 0);
        assert_eq!(rep.score, 80);
        assert!((rep.bounce_rate - 0.07).abs() < 1e-9);
    }

    #[test]
    fn failures_penalize_lightly() {
        // 8% fail -> -9
        assert_eq!(compute(&stats(100, 0, 0, 8), 0).score, 91);
    }

    #[test]
    fn replies_offset_bounces() {
        // 10% bounce (-50) and 2% reply (+20)
        assert_eq!(compute(&stats(100, 10, 2, 0), 0).score, 70);
    }

    #[test]
    fn blocks_cost_ten_each_and_score_clamps() {
        assert_eq!(compute(&stats(10, 0, 0, 0), 2).score, 80);
        assert_eq!(compute(&stats(10, 5, 0, 0), 3).score, 0);
        assert_eq!(compute(&stats(10, 0, 5, 0), 0).score, 100);
    }
}
