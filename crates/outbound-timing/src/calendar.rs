// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! US business-holiday calendar and sending-day rules.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// The `n`th (1-based) `weekday` of a month.
pub(crate) fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n as u8)
}

/// The last `weekday` of a month.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(i64::from(back)))
}

/// Observed US holidays for `year`, in calendar order.
pub fn us_holidays(year: i32) -> Vec<(NaiveDate, &'static str)> {
    let fixed = |month, day| NaiveDate::from_ymd_opt(year, month, day);
    let thanksgiving = nth_weekday(year, 11, Weekday::Thu, 4);

    let mut days: Vec<(Option<NaiveDate>, &'static str)> = vec![
        (fixed(1, 1), "New Year's Day"),
        (nth_weekday(year, 1, Weekday::Mon, 3), "Martin Luther King Jr. Day"),
        (nth_weekday(year, 2, Weekday::Mon, 3), "Presidents' Day"),
        (last_weekday(year, 5, Weekday::Mon), "Memorial Day"),
        (fixed(6, 19), "Juneteenth"),
        (fixed(7, 4), "Independence Day"),
        (nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day"),
        (fixed(11, 11), "Veterans Day"),
        (thanksgiving, "Thanksgiving"),
        (thanksgiving.and_then(|d| d.succ_opt()), "Day After Thanksgiving"),
        (fixed(12, 24), "Christmas Eve"),
        (fixed(12, 25), "Christmas Day"),
        (fixed(12, 31), "New Year's Eve"),
    ];
    days.sort_by_key(|(d, _)| *d);
    days.into_iter()
        .filter_map(|(d, name)| d.map(|d| (d, name)))
        .collect()
}

/// The holiday name if `date` is a US holiday.
pub fn is_holiday(date: NaiveDate) -> Option<&'static str> {
    us_holidays(date.year())
        .into_iter()
        .find(|(d, _)| *d == date)
        .map(|(_, name)| name)
}

/// Whether mail may go out on `date`. Holidays are always excluded; weekends
/// only when `skip_weekends` is set.
pub fn is_sending_day(date: NaiveDate, skip_weekends: bool) -> bool {
    SendingCalendar {
        skip_weekends,
        skip_holidays: true,
    }
    .is_sending_day(date)
}

/// Sending-day policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendingCalendar {
    pub skip_weekends: bool,
    pub skip_holidays: bool,
}

impl SendingCalendar {
    /// Why `date` is not a sending day, or `None` if it is.
    pub fn closed_reason(&self, date: NaiveDate) -> Option<String> {
        if self.skip_holidays
            && let Some(name) = is_holiday(date)
        {
            return Some(format!("holiday: {name}"));
        }
        if self.skip_weekends && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Some(format!("weekend: {}", date.weekday()));
        }
        None
    }

    pub fn is_sending_day(&self, date: NaiveDate) -> bool {
        self.closed_reason(date).is_none()
    }
}

impl Default for SendingCalendar {
    fn default() -> Self {
        Self {
            skip_weekends: true,
            skip_holidays: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn floating_holidays_2026() {
        assert_eq!(is_holiday(d(2026, 1, 19)), Some("Martin Luther King Jr. Day"));
        assert_eq!(is_holiday(d(2026, 2, 16)), Some("Presidents' Day"));
        assert_eq!(is_holiday(d(2026, 5, 25)), Some("Memorial Day"));
        assert_eq!(is_holiday(d(2026, 9, 7)), Some("Labor Day"));
        assert_eq!(is_holiday(d(2026, 11, 26)), Some("Thanksgiving"));
        assert_eq!(is_holiday(d(2026, 11, 27)), Some("Day After Thanksgiving"));
    }

    #[test]
    fn fixed_holidays() {
        assert_eq!(is_holiday(d(2025, 7, 4)), Some("Independence Day"));
        assert_eq!(is_holiday(d(2025, 12, 24)), Some("Christmas Eve"));
        assert_eq!(is_holiday(d(2025, 12, 31)), Some("New Year's Eve"));
        assert_eq!(is_holiday(d(2025, 6, 19)), Some("Juneteenth"));
        assert_eq!(is_holiday(d(2025, 7, 7)), None);
    }

    #[test]
    fn memorial_day_when_may_ends_on_monday() {
        // May 31, 2027 is a Monday.
        assert_eq!(is_holiday(d(2027, 5, 31)), Some("Memorial Day"));
    }

    #[test]
    fn thirteen_holidays_every_year() {
        for year in 2024..2035 {
            assert_eq!(us_holidays(year).len(), 13, "year {year}");
        }
    }

    #[test]
    fn weekends_follow_flag() {
        let saturday = d(2026, 3, 7);
        assert!(!is_sending_day(saturday, true));
        assert!(is_sending_day(saturday, false));
        assert!(!is_sending_day(d(2026, 12, 25), false));

        let open = SendingCalendar {
            skip_weekends: false,
            skip_holidays: false,
        };
        assert!(open.is_sending_day(d(2026, 12, 25)));
        assert!(
            SendingCalendar::default()
                .closed_reason(d(2026, 12, 25))
                .unwrap()
                .contains("Christmas")
        );
    }
}
