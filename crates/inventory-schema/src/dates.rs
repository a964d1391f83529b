//! Permissive date parsing shared by validation and the reader.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"];

/// Parses the date shapes found in submissions and stored values.
///
/// Accepts RFC 3339, `YYYY-MM-DD[ HH:MM:SS]`, `DD.MM.YYYY`, `YYYY-MM` and a
/// bare `YYYY`. Values without a zone are taken as UTC.
pub fn parse_permissive(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
    }
    if let Some((year, month)) = s.split_once('-') {
        if let (Some(year), Ok(month)) = (parse_year_digits(year), month.parse::<u32>()) {
            return ymd(year, month, 1);
        }
    }
    parse_year_digits(s).and_then(|year| ymd(year, 1, 1))
}

/// Parses input at year granularity: the result is always January 1st.
pub fn parse_year(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if let Some(year) = parse_year_digits(s) {
        return ymd(year, 1, 1);
    }
    parse_permissive(s).and_then(|dt| ymd(dt.year(), 1, 1))
}

/// Storage representation (RFC 3339, `Z` suffix). Fractional seconds are
/// kept when present so stored values match what was validated.
pub fn to_storage(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_year_digits(s: &str) -> Option<i32> {
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| Utc.from_utc_datetime(&n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_shapes() {
        let expected = ymd(2021, 3, 4).unwrap();
        assert_eq!(parse_permissive("2021-03-04"), Some(expected));
        assert_eq!(parse_permissive("04.03.2021"), Some(expected));
        assert_eq!(parse_permissive("2021-03-04T00:00:00Z"), Some(expected));
        assert_eq!(parse_permissive("2021-03-04 00:00:00"), Some(expected));
        assert_eq!(parse_permissive("2021-03"), ymd(2021, 3, 1));
        assert_eq!(parse_permissive("2021"), ymd(2021, 1, 1));
        assert_eq!(parse_permissive("next tuesday"), None);
    }

    #[test]
    fn year_granularity() {
        assert_eq!(parse_year("1998"), ymd(1998, 1, 1));
        assert_eq!(parse_year("1998-07-02"), ymd(1998, 1, 1));
        assert_eq!(parse_year("98"), None);
    }

    #[test]
    fn storage_format_round_trips() {
        let dt = ymd(2020, 12, 31).unwrap();
        assert_eq!(to_storage(&dt), "2020-12-31T00:00:00Z");
        assert_eq!(parse_permissive(&to_storage(&dt)), Some(dt));
    }

    #[test]
    fn storage_format_keeps_fractional_seconds() {
        let dt = parse_permissive("2020-01-01T10:00:00.5Z").unwrap();
        assert_eq!(to_storage(&dt), "2020-01-01T10:00:00.500Z");
        assert_eq!(parse_permissive(&to_storage(&dt)), Some(dt));
    }
}
