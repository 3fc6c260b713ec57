use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parses an ISO-8601 timestamp into a zone-aware value.
///
/// - trailing `Z`: the rest is read as a naive time in UTC
/// - explicit offset: kept as-is
/// - no offset: assumed UTC
///
/// Returns `None` when nothing matches.
pub fn parse(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();

    if let Some(naive) = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        return parse_naive(naive).map(assume_utc);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_naive(raw).map(assume_utc))
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn assume_utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn zulu_suffix_is_utc() {
        let dt = parse("2025-04-21T17:21:47Z").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!(dt, utc(2025, 4, 21, 17, 21, 47));
    }

    #[test]
    fn zulu_with_fraction() {
        let dt = parse("2025-04-21T17:21:47.250Z").unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn explicit_offset_is_kept() {
        let dt = parse("2025-04-21T13:21:47-04:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -4 * 3600);
        assert_eq!(dt, utc(2025, 4, 21, 17, 21, 47));
    }

    #[test]
    fn compact_offset_is_kept() {
        let dt = parse("2025-04-21T19:21:47+0200").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(dt, utc(2025, 4, 21, 17, 21, 47));
    }

    #[test]
    fn missing_offset_assumes_utc() {
        let dt = parse("2025-04-21T17:21:47").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!(dt, utc(2025, 4, 21, 17, 21, 47));
    }

    #[test]
    fn space_separator_and_minutes_only() {
        assert_eq!(parse("2025-04-21 17:21:47").unwrap(), utc(2025, 4, 21, 17, 21, 47));
        assert_eq!(parse("2025-04-21T17:21").unwrap(), utc(2025, 4, 21, 17, 21, 0));
    }

    #[test]
    fn bare_date_is_midnight_utc() {
        assert_eq!(parse("2025-04-21").unwrap(), utc(2025, 4, 21, 0, 0, 0));
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse("yesterday").is_none());
        assert!(parse("2025-13-40T00:00:00Z").is_none());
        assert!(parse("Z").is_none());
    }
}
