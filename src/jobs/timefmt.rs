//! Display helpers for vendor timestamps.
//!
//! Vendor times are UTC; operators read them in UTC+8.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};

const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;
const SECS_PER_DAY: i64 = 86_400;

fn display_zone() -> FixedOffset {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECS).unwrap_or(Utc.fix())
}

/// Parse a vendor timestamp as UTC.
///
/// Accepts RFC 3339, the minute-precision `2025-01-01T16:00Z` form and a
/// zone-less `2025-01-01T16:00:00` (taken as UTC).
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `YYYY-MM-DD HH:MM:SS` in the display zone, or `None` if unparseable.
pub fn to_display_time(utc: Option<&str>) -> Option<String> {
    let dt = parse_utc(utc?)?;
    Some(
        dt.with_timezone(&display_zone())
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    )
}

/// Whole days from now until `utc`; negative once the instant has passed.
pub fn days_left(utc: Option<&str>) -> Option<i64> {
    days_left_at(utc, Utc::now())
}

/// [`days_left`] against an explicit current instant.
pub fn days_left_at(utc: Option<&str>, now: DateTime<Utc>) -> Option<i64> {
    let end = parse_utc(utc?)?;
    Some((end - now).num_seconds().div_euclid(SECS_PER_DAY))
}

/// Wall-clock `HH:MM:SS` in the display zone, used to stamp log lines.
pub fn display_clock(now: DateTime<Utc>) -> String {
    now.with_timezone(&display_zone()).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const END: &str = "2025-03-01T16:00:00Z";

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 16, 0, 0).unwrap()
    }

    #[test]
    fn test_display_time_shifts_to_utc_plus_8() {
        assert_eq!(to_display_time(Some(END)).as_deref(), Some("2025-03-02 00:00:00"));
        assert_eq!(
            to_display_time(Some("2025-03-01T16:00Z")).as_deref(),
            Some("2025-03-02 00:00:00")
        );
        assert_eq!(
            to_display_time(Some("2025-03-01T18:00:00+02:00")).as_deref(),
            Some("2025-03-02 00:00:00")
        );
    }

    #[test]
    fn test_display_time_never_fails() {
        assert_eq!(to_display_time(None), None);
        assert_eq!(to_display_time(Some("")), None);
        assert_eq!(to_display_time(Some("next tuesday")), None);
    }

    #[test]
    fn test_days_left_counts_whole_days() {
        let now = end() - Duration::days(3) - Duration::hours(1);
        assert_eq!(days_left_at(Some(END), now), Some(3));
        let now = end() - Duration::hours(23);
        assert_eq!(days_left_at(Some(END), now), Some(0));
    }

    #[test]
    fn test_days_left_goes_negative_at_end_time() {
        assert_eq!(days_left_at(Some(END), end()), Some(0));
        assert_eq!(days_left_at(Some(END), end() + Duration::seconds(1)), Some(-1));
        assert_eq!(days_left_at(Some(END), end() + Duration::days(2)), Some(-2));
    }

    #[test]
    fn test_days_left_is_monotonic() {
        let mut previous = i64::MAX;
        let mut now = end() - Duration::days(5);
        while now < end() + Duration::days(5) {
            let d = days_left_at(Some(END), now).unwrap();
            assert!(d <= previous);
            previous = d;
            now += Duration::hours(5);
        }
    }

    #[test]
    fn test_days_left_invalid_input() {
        assert_eq!(days_left(None), None);
        assert_eq!(days_left(Some("garbage")), None);
    }

    #[test]
    fn test_display_clock() {
        assert_eq!(display_clock(end()), "00:00:00");
    }
}
