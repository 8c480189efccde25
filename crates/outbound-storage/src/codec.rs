// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between domain values and SQLite column values.
//!
//! Timestamps are stored as fixed-width UTC text so that string comparison in
//! SQL orders them chronologically.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a UTC timestamp for storage.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Format a calendar day for storage.
pub fn fmt_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Parse a stored timestamp column.
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| conversion_error(idx, e))
}

/// Read a non-null timestamp column.
pub fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

/// Read a nullable timestamp column.
pub fn opt_ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

/// Read a strum-encoded enum column.
pub fn enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Read a nullable strum-encoded enum column.
pub fn opt_enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| T::from_str(&r).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Format an optional timestamp for storage.
pub fn fmt_opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(fmt_ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_round_trip_with_millis() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap()
            + chrono::Duration::milliseconds(250);
        let raw = fmt_ts(ts);
        assert_eq!(raw, "2026-03-09T14:05:07.250Z");
        assert_eq!(parse_ts(0, &raw).unwrap(), ts);
    }

    #[test]
    fn stored_timestamps_sort_chronologically() {
        let a = fmt_ts(Utc.with_ymd_and_hms(2026, 1, 9, 23, 0, 0).unwrap());
        let b = fmt_ts(Utc.with_ymd_and_hms(2026, 1, 10, 1, 0, 0).unwrap());
        assert!(a < b);
    }

    #[test]
    fn malformed_timestamp_is_conversion_failure() {
        let err = parse_ts(3, "yesterday").unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(3, _, _)));
    }
}
