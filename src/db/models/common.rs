//! Timestamp helpers shared across models.
//!
//! Timestamps are stored as RFC 3339 UTC strings with millisecond precision,
//! the same shape SQLite produces with `strftime('%Y-%m-%dT%H:%M:%fZ')`, so
//! they sort lexicographically in SQL comparisons.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp the way it is stored in the database
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp; `None` for malformed values
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_matches_sqlite_shape() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(format_timestamp(at), "2026-03-07T09:05:01.000Z");
    }

    #[test]
    fn test_parse_round_trips_and_rejects_garbage() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_stored_timestamps_sort_chronologically() {
        let earlier = format_timestamp(Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap());
        let later = format_timestamp(Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap());
        assert!(earlier < later);
    }
}
