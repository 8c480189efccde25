// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily sending sessions.
//!
//! The sending window is cut into contiguous sessions and the daily quota is
//! spread across them in proportion to their length, so an identity cannot
//! burn its whole quota in the first hour of the day.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// One contiguous sending window, in minutes from local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Inclusive start.
    pub start: u32,
    /// Exclusive end. May be 1440 for a window ending at midnight.
    pub end: u32,
    /// Sends allowed in this session.
    pub allocation: u32,
}

impl Session {
    pub fn len_minutes(&self) -> u32 {
        self.end - self.start
    }

    pub fn contains(&self, minute_of_day: u32) -> bool {
        (self.start..self.end).contains(&minute_of_day)
    }

    /// Session start as a wall-clock time.
    pub fn start_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.start / 60, self.start % 60, 0)
    }
}

/// Split `[window_start_hour, window_end_hour)` into `session_count`
/// sessions and spread `daily_limit` across them.
///
/// Sessions are contiguous and ascending; leftover minutes go to the earliest
/// sessions. Allocations are proportional to session length using the
/// largest-remainder method, ties going to the earliest session, and always
/// sum to `daily_limit`. Degenerate input yields an empty plan.
pub fn plan_sessions(
    session_count: u32,
    daily_limit: u32,
    window_start_hour: u32,
    window_end_hour: u32,
) -> Vec<Session> {
    if session_count == 0 || window_end_hour <= window_start_hour || window_end_hour > 24 {
        return Vec::new();
    }
    let window_start = window_start_hour * 60;
    let total = (window_end_hour - window_start_hour) * 60;
    let count = session_count.min(total);
    let base = total / count;
    let extra = total % count;

    let mut sessions = Vec::with_capacity(count as usize);
    let mut cursor = window_start;
    for i in 0..count {
        let len = base + u32::from(i < extra);
        sessions.push(Session {
            start: cursor,
            end: cursor + len,
            allocation: 0,
        });
        cursor += len;
    }

    let limit = u64::from(daily_limit);
    let total = u64::from(total);
    let mut remainders: Vec<(usize, u64)> = Vec::with_capacity(sessions.len());
    let mut assigned = 0u64;
    for (i, session) in sessions.iter_mut().enumerate() {
        let share = limit * u64::from(session.len_minutes());
        let whole = share / total;
        session.allocation = whole as u32;
        assigned += whole;
        remainders.push((i, share % total));
    }
    // Stable sort keeps earlier sessions first among equal remainders.
    remainders.sort_by(|a, b| b.1.cmp(&a.1));
    for (i, _) in remainders.into_iter().take((limit - assigned) as usize) {
        sessions[i].allocation += 1;
    }
    sessions
}

/// A day's sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub sessions: Vec<Session>,
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

impl SessionPlan {
    pub fn new(session_count: u32, daily_limit: u32, window_start_hour: u32, window_end_hour: u32) -> Self {
        Self {
            sessions: plan_sessions(session_count, daily_limit, window_start_hour, window_end_hour),
        }
    }

    /// The session containing `now_local`.
    pub fn current(&self, now_local: NaiveTime) -> Option<&Session> {
        let m = minute_of_day(now_local);
        self.sessions.iter().find(|s| s.contains(m))
    }

    /// Whether an identity that has sent `sent_today` messages may send now.
    ///
    /// `now_local` must fall inside a session, and `sent_today` must be below
    /// the cumulative allocation up to and including that session.
    pub fn allows(&self, now_local: NaiveTime, sent_today: u32) -> bool {
        let m = minute_of_day(now_local);
        let mut cumulative = 0u32;
        for session in &self.sessions {
            cumulative += session.allocation;
            if session.contains(m) {
                return sent_today < cumulative;
            }
        }
        false
    }

    /// Start of the first session beginning after `now_local`.
    pub fn next_start(&self, now_local: NaiveTime) -> Option<NaiveTime> {
        let m = minute_of_day(now_local);
        self.sessions
            .iter()
            .find(|s| s.start > m)
            .and_then(Session::start_time)
    }

    /// Whether `now_local` is before the first session starts.
    pub fn before_window(&self, now_local: NaiveTime) -> bool {
        self.sessions
            .first()
            .is_some_and(|s| minute_of_day(now_local) < s.start)
    }

    /// Whether every session has ended at `now_local`.
    pub fn after_window(&self, now_local: NaiveTime) -> bool {
        self.sessions
            .last()
            .is_none_or(|s| minute_of_day(now_local) >= s.end)
    }

    pub fn total_allocation(&self) -> u32 {
        self.sessions.iter().map(|s| s.allocation).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn three_sessions_over_business_day() {
        let sessions = plan_sessions(3, 30, 9, 17);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].start, 9 * 60);
        assert_eq!(sessions[2].end, 17 * 60);
        // 480 minutes split 160/160/160.
        assert!(sessions.iter().all(|s| s.len_minutes() == 160));
        assert_eq!(sessions.iter().map(|s| s.allocation).sum::<u32>(), 30);
        assert!(sessions.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn remainders_go_to_earliest() {
        let sessions = plan_sessions(3, 10, 9, 17);
        let allocs: Vec<u32> = sessions.iter().map(|s| s.allocation).collect();
        assert_eq!(allocs, vec![4, 3, 3]);

        // 420 minutes over 8 sessions: four of 53, four of 52.
        let uneven = plan_sessions(8, 0, 9, 16);
        assert_eq!(uneven[0].len_minutes(), 53);
        assert_eq!(uneven[7].len_minutes(), 52);
    }

    #[test]
    fn degenerate_input_is_empty() {
        assert!(plan_sessions(0, 10, 9, 17).is_empty());
        assert!(plan_sessions(3, 10, 17, 9).is_empty());
        assert!(plan_sessions(3, 10, 9, 9).is_empty());
    }

    #[test]
    fn allows_uses_cumulative_allocation() {
        let plan = SessionPlan::new(3, 30, 9, 17);
        assert!(!plan.allows(t(8, 59), 0));
        assert!(plan.allows(t(9, 0), 9));
        assert!(!plan.allows(t(9, 30), 10));
        // Second session: cumulative 20.
        assert!(plan.allows(t(12, 0), 19));
        assert!(!plan.allows(t(12, 0), 20));
        assert!(!plan.allows(t(17, 0), 0));
    }

    #[test]
    fn next_start_and_window_edges() {
        let plan = SessionPlan::new(3, 30, 9, 17);
        assert_eq!(plan.next_start(t(7, 0)), Some(t(9, 0)));
        assert_eq!(plan.next_start(t(9, 0)), Some(t(11, 40)));
        assert_eq!(plan.next_start(t(15, 0)), None);
        assert!(plan.before_window(t(8, 0)));
        assert!(plan.after_window(t(17, 0)));
        assert!(!plan.after_window(t(16, 59)));
    }

    proptest! {
        #[test]
        fn plans_tile_the_window_and_sum_exactly(
            count in 1u32..12,
            limit in 0u32..600,
            start in 0u32..23,
            len in 1u32..12,
        ) {
            let end = (start + len).min(24);
            let sessions = plan_sessions(count, limit, start, end);
            prop_assert_eq!(sessions.len() as u32, count);
            prop_assert_eq!(sessions.first().unwrap().start, start * 60);
            prop_assert_eq!(sessions.last().unwrap().end, end * 60);
            prop_assert!(sessions.windows(2).all(|w| w[0].end == w[1].start));
            prop_assert!(sessions.windows(2).all(|w| w[0].len_minutes() >= w[1].len_minutes()));
            prop_assert_eq!(sessions.iter().map(|s| s.allocation).sum::<u32>(), limit);
        }

        #[test]
        fn allows_never_exceeds_total(limit in 0u32..200, minute in 0u32..1440) {
            let plan = SessionPlan::new(3, limit, 9, 17);
            let now = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap();
            prop_assert!(!plan.allows(now, plan.total_allocation()));
        }
    }
}
