use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The timezone every date bucket and artifact signature is expressed in.
pub const DISPLAY_TZ: Tz = chrono_tz::Asia::Tokyo;

/// Offset suffix appended to signatures. Fixed text, never recomputed from the zone.
const SIGNATURE_OFFSET_SUFFIX: &str = "0900";

pub fn to_display<T: TimeZone>(instant: &DateTime<T>) -> DateTime<Tz> {
    instant.with_timezone(&DISPLAY_TZ)
}

/// `YYYYMMDD` of the instant's calendar day in the display timezone.
pub fn day_prefix<T: TimeZone>(instant: &DateTime<T>) -> String {
    to_display(instant).format("%Y%m%d").to_string()
}

/// `YYYYMMDD_HHMMSS_0900` in the display timezone.
pub fn signature<T: TimeZone>(instant: &DateTime<T>) -> String {
    format!(
        "{}_{}",
        to_display(instant).format("%Y%m%d_%H%M%S"),
        SIGNATURE_OFFSET_SUFFIX
    )
}

/// Number of calendar days (UTC dates) from `earlier` to `later`.
pub fn diff_days(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later.date_naive() - earlier.date_naive()).num_days()
}

/// Parses an ISO-8601 / RFC 3339 instant. Timestamps without an offset are taken as UTC.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_uses_display_timezone() {
        let dt = Utc.with_ymd_and_hms(2025, 2, 8, 15, 45, 0).unwrap();
        assert_eq!(signature(&dt), "20250209_004500_0900");
    }

    #[test]
    fn test_day_prefix_crosses_midnight() {
        let before = Utc.with_ymd_and_hms(2025, 2, 8, 14, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 2, 8, 15, 0, 0).unwrap();
        assert_eq!(day_prefix(&before), "20250208");
        assert_eq!(day_prefix(&after), "20250209");
    }

    #[test]
    fn test_diff_days_counts_calendar_days() {
        let a = Utc.with_ymd_and_hms(2025, 2, 10, 0, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 2, 2, 23, 55, 0).unwrap();
        assert_eq!(diff_days(a, b), 8);
        assert_eq!(diff_days(b, b), 0);
    }

    #[test]
    fn test_parse_instant_with_offset() {
        let dt = parse_instant("2025-02-11T12:00:00+09:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 2, 11, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_instant_naive_is_utc() {
        let dt = parse_instant("2025-02-11T12:00:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 2, 11, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(parse_instant("yesterday").is_err());
    }
}
