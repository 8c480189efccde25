// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time sources and conversion to the campaign's local time.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc,
    Weekday,
};

use crate::calendar::nth_weekday;

/// Source of the current instant. Injected everywhere time matters.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Converts UTC instants to the target local time.
///
/// Uses a fixed standard offset plus, optionally, the US daylight-saving
/// rule: from the second Sunday of March at 02:00 standard time until the
/// first Sunday of November at 02:00 daylight time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    standard_offset_hours: i32,
    observe_us_dst: bool,
}

impl Default for LocalClock {
    /// America/New_York.
    fn default() -> Self {
        Self::new(-5, true)
    }
}

impl LocalClock {
    pub fn new(standard_offset_hours: i32, observe_us_dst: bool) -> Self {
        Self {
            standard_offset_hours,
            observe_us_dst,
        }
    }

    fn standard(&self) -> Duration {
        Duration::hours(i64::from(self.standard_offset_hours))
    }

    /// DST bounds for `year`, expressed in local standard time.
    fn dst_bounds(year: i32) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let two = NaiveTime::from_hms_opt(2, 0, 0)?;
        let one = NaiveTime::from_hms_opt(1, 0, 0)?;
        let start = nth_weekday(year, 3, Weekday::Sun, 2)?.and_time(two);
        // 02:00 daylight time is 01:00 standard time.
        let end = nth_weekday(year, 11, Weekday::Sun, 1)?.and_time(one);
        Some((start, end))
    }

    /// Whether daylight time is in effect at `utc`.
    pub fn is_dst(&self, utc: DateTime<Utc>) -> bool {
        if !self.observe_us_dst {
            return false;
        }
        let local_standard = utc.naive_utc() + self.standard();
        Self::dst_bounds(local_standard.year())
            .is_some_and(|(start, end)| local_standard >= start && local_standard < end)
    }

    /// UTC offset in effect at `utc`.
    pub fn offset_at(&self, utc: DateTime<Utc>) -> FixedOffset {
        let hours = self.standard_offset_hours + i32::from(self.is_dst(utc));
        FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Local wall-clock time at `utc`.
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.offset_at(utc)).naive_local()
    }

    /// Local calendar day at `utc`.
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        self.to_local(utc).date()
    }

    /// The UTC instant at which local `date` begins.
    pub fn day_start_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        let mut offset = self.standard();
        // Midnight never falls inside a DST transition, so checking whether
        // standard-time midnight is already in DST is enough.
        if self.observe_us_dst
            && let Some((start, end)) = Self::dst_bounds(date.year())
            && midnight >= start
            && midnight < end
        {
            offset += Duration::hours(1);
        }
        (midnight - offset).and_utc()
    }

    /// The UTC instant of local `time` on local `date`.
    pub fn at_local(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let start = self.day_start_utc(date);
        let guess = start + (time - NaiveTime::MIN);
        // Correct for a transition between midnight and `time`.
        let drift = self.to_local(guess) - date.and_time(time);
        guess - drift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn new_york_winter_and_summer() {
        let clock = LocalClock::default();
        // January: UTC-5.
        assert_eq!(
            clock.to_local(utc(2026, 1, 15, 14, 0)).time(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        // July: UTC-4.
        assert_eq!(
            clock.to_local(utc(2026, 7, 15, 13, 0)).time(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn dst_transitions_2026() {
        let clock = LocalClock::default();
        // 2026-03-08 02:00 EST = 07:00 UTC.
        assert!(!clock.is_dst(utc(2026, 3, 8, 6, 59)));
        assert!(clock.is_dst(utc(2026, 3, 8, 7, 0)));
        // 2026-11-01 02:00 EDT = 06:00 UTC.
        assert!(clock.is_dst(utc(2026, 11, 1, 5, 59)));
        assert!(!clock.is_dst(utc(2026, 11, 1, 6, 0)));
    }

    #[test]
    fn fixed_offset_without_dst() {
        let clock = LocalClock::new(1, false);
        assert!(!clock.is_dst(utc(2026, 7, 1, 0, 0)));
        assert_eq!(clock.local_date(utc(2026, 7, 1, 23, 30)), NaiveDate::from_ymd_opt(2026, 7, 2).unwrap());
    }

    #[test]
    fn day_start_matches_local_midnight() {
        let clock = LocalClock::default();
        let summer = NaiveDate::from_ymd_opt(2026, 7, 15).unwrap();
        assert_eq!(clock.day_start_utc(summer), utc(2026, 7, 15, 4, 0));
        let winter = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(clock.day_start_utc(winter), utc(2026, 1, 15, 5, 0));
        // Day of the spring transition starts in standard time.
        let spring = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert_eq!(clock.day_start_utc(spring), utc(2026, 3, 8, 5, 0));
    }

    #[test]
    fn at_local_handles_transition_day() {
        let clock = LocalClock::default();
        let spring = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(clock.at_local(spring, nine), utc(2026, 3, 8, 13, 0));
        let winter = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(clock.at_local(winter, nine), utc(2026, 1, 15, 14, 0));
    }
}
