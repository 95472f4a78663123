//! Calendar date utilities
//!
//! Attendance is keyed by calendar day. Callers submit either a bare date
//! (`2024-03-01`) or a full RFC 3339 timestamp; both collapse to the same
//! `NaiveDate` so repeated marks on one day hit the same record.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Normalize a submitted date to calendar-day granularity
///
/// Accepted forms:
/// - `YYYY-MM-DD`
/// - RFC 3339 (`2024-03-01T14:30:00+05:30`): the date as written in the given offset
/// - `YYYY-MM-DDTHH:MM:SS` without offset
pub fn normalize_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("date is required".to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Ok(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }

    Err(Error::InvalidInput(format!("malformed date: {}", trimmed)))
}

/// Render a date in storage format
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_plain_date_accepted() {
        let date = normalize_date("2024-03-01").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_time_of_day_is_discarded() {
        let morning = normalize_date("2024-03-01T08:05:00Z").unwrap();
        let evening = normalize_date("2024-03-01T21:40:12.345Z").unwrap();
        assert_eq!(morning, evening);
        assert_eq!(format_date(morning), "2024-03-01");
    }

    #[test]
    fn test_offset_date_is_kept_as_written() {
        // 00:30 local in +05:30 is still the 1st, even though UTC is the 29th of Feb
        let date = normalize_date("2024-03-01T00:30:00+05:30").unwrap();
        assert_eq!(format_date(date), "2024-03-01");
    }

    #[test]
    fn test_naive_datetime_accepted() {
        let date = normalize_date("2024-03-01T10:00:00").unwrap();
        assert_eq!(format_date(date), "2024-03-01");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert!(normalize_date("  2024-03-01 ").is_ok());
    }

    #[test]
    fn test_malformed_dates_rejected() {
        assert!(matches!(normalize_date(""), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize_date("yesterday"), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize_date("2024-02-30"), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize_date("01/03/2024"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, Duration::from_secs(1));
    }
}
