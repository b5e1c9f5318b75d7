use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const NAIVE_DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a reading timestamp into epoch milliseconds.
///
/// Accepts RFC 3339, RFC 2822, ISO-8601 date-times without an offset (taken as UTC) and
/// bare ISO-8601 dates (UTC midnight).
pub fn parse_timestamp_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.timestamp_millis());
    }
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
}

/// Index score for a reading: its event time, or `now` when the timestamp is unparsable.
///
/// The fallback differs between deliveries of the same entry, so a reprocessed entry with
/// an unparsable timestamp lands at a different position.
pub fn score_for(raw_timestamp: &str, now: DateTime<Utc>) -> f64 {
    parse_timestamp_millis(raw_timestamp).unwrap_or_else(|| now.timestamp_millis()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAN_15_1030_UTC: i64 = 1_705_314_600_000;

    #[test]
    fn test_rfc3339_with_zulu() {
        assert_eq!(parse_timestamp_millis("2024-01-15T10:30:00Z"), Some(JAN_15_1030_UTC));
    }

    #[test]
    fn test_rfc3339_with_offset_and_fraction() {
        assert_eq!(
            parse_timestamp_millis("2024-01-15T12:30:00.250+02:00"),
            Some(JAN_15_1030_UTC + 250)
        );
    }

    #[test]
    fn test_rfc2822() {
        assert_eq!(
            parse_timestamp_millis("Mon, 15 Jan 2024 10:30:00 +0000"),
            Some(JAN_15_1030_UTC)
        );
    }

    #[test]
    fn test_naive_date_time_is_utc() {
        assert_eq!(parse_timestamp_millis("2024-01-15T10:30:00"), Some(JAN_15_1030_UTC));
        assert_eq!(parse_timestamp_millis("2024-01-15 10:30:00"), Some(JAN_15_1030_UTC));
    }

    #[test]
    fn test_date_only_is_utc_midnight() {
        assert_eq!(
            parse_timestamp_millis("2024-01-15"),
            Some(JAN_15_1030_UTC - (10 * 60 + 30) * 60 * 1000)
        );
    }

    #[test]
    fn test_unparsable_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(parse_timestamp_millis("yesterday-ish"), None);
        assert_eq!(score_for("yesterday-ish", now), now.timestamp_millis() as f64);
    }

    #[test]
    fn test_score_preserves_chronological_order() {
        let now = Utc::now();
        assert!(score_for("2024-01-15T10:30:00Z", now) < score_for("2024-01-15T10:31:00Z", now));
    }
}
