//! HL7 `DTM` and `DT` values and their ISO 8601 counterparts
//!
//! Timestamps are accepted at 8, 10, 12 or 14 digits of precision with an
//! optional fractional second and `+ZZZZ`/`-ZZZZ` offset, both of which are
//! dropped. They are always emitted at 14 digits.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

/// Formats a timestamp as `YYYYMMDDHHMMSS`; sub-second parts are dropped
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Formats a date as `YYYYMMDD`
pub fn format_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

/// Parses a `DTM` value
///
/// Missing time parts default to zero; a date-only value is midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let digits = strip_offset_and_fraction(value.trim());
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let padded = match digits.len() {
        8 => format!("{digits}000000"),
        10 => format!("{digits}0000"),
        12 => format!("{digits}00"),
        14 => digits.to_string(),
        _ => return None,
    };
    NaiveDateTime::parse_from_str(&padded, TIMESTAMP_FORMAT).ok()
}

/// Parses a `DT` value, ignoring any time portion
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date = value.get(..8)?;
    if value.len() > 8 && parse_timestamp(value).is_none() {
        return None;
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// HL7 date with optional precision (`YYYY`, `YYYYMM`, `YYYYMMDD[...]`) to ISO
///
/// Returns `None` for values that are not valid dates.
pub fn hl7_date_to_iso(value: &str) -> Option<String> {
    let value = value.trim();
    match value.len() {
        4 if is_digits(value) => Some(value.to_string()),
        6 if is_digits(value) => {
            let month: u32 = value[4..6].parse().ok()?;
            (1..=12)
                .contains(&month)
                .then(|| format!("{}-{}", &value[..4], &value[4..6]))
        }
        _ => parse_date(value).map(|d| d.format("%Y-%m-%d").to_string()),
    }
}

/// ISO date (`YYYY`, `YYYY-MM`, `YYYY-MM-DD`, or a full date-time) to HL7 `DT`
pub fn iso_date_to_hl7(value: &str) -> Option<String> {
    let value = value.trim();
    let date = value.split('T').next().unwrap_or(value);
    match date.len() {
        4 if is_digits(date) => Some(date.to_string()),
        7 => {
            let (year, month) = date.split_once('-')?;
            let month_num: u32 = month.parse().ok()?;
            (is_digits(year) && is_digits(month) && (1..=12).contains(&month_num))
                .then(|| format!("{year}{month}"))
        }
        _ => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .map(|d| format_date(&d)),
    }
}

/// HL7 timestamp to ISO `YYYY-MM-DDTHH:MM:SS`
pub fn hl7_timestamp_to_iso(value: &str) -> Option<String> {
    parse_timestamp(value).map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// ISO date or date-time to an HL7 timestamp
///
/// Accepts RFC 3339 values (the offset is dropped, local wall time kept),
/// naive `YYYY-MM-DDTHH:MM[:SS]` values and plain dates.
pub fn iso_to_hl7_timestamp(value: &str) -> Option<String> {
    parse_iso_datetime(value).map(|ts| format_timestamp(&ts))
}

/// Parses an ISO date or date-time into a naive timestamp
pub fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn strip_offset_and_fraction(value: &str) -> &str {
    let end = value.find(['+', '-']).unwrap_or(value.len());
    let value = &value[..end];
    let end = value.find('.').unwrap_or(value.len());
    &value[..end]
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("20240305", "2024-03-05T00:00:00" ; "date only")]
    #[test_case("2024030508", "2024-03-05T08:00:00" ; "hour precision")]
    #[test_case("202403050830", "2024-03-05T08:30:00" ; "minute precision")]
    #[test_case("20240305083015", "2024-03-05T08:30:15" ; "second precision")]
    #[test_case("20240305083015.1234", "2024-03-05T08:30:15" ; "fraction dropped")]
    #[test_case("20240305083015-0500", "2024-03-05T08:30:15" ; "offset dropped")]
    #[test_case("20240305083015.12+0100", "2024-03-05T08:30:15" ; "fraction and offset")]
    fn test_parse_timestamp(raw: &str, iso: &str) {
        assert_eq!(hl7_timestamp_to_iso(raw).as_deref(), Some(iso));
    }

    #[test_case("" ; "empty")]
    #[test_case("2024" ; "too short")]
    #[test_case("20241305" ; "bad month")]
    #[test_case("2024030X" ; "non digit")]
    fn test_rejects_invalid_timestamps(raw: &str) {
        assert!(parse_timestamp(raw).is_none());
    }

    #[test]
    fn test_format_round_trip() {
        let ts = parse_timestamp("20240305083015").unwrap();
        assert_eq!(format_timestamp(&ts), "20240305083015");
        let date = parse_date("19900512").unwrap();
        assert_eq!(format_date(&date), "19900512");
    }

    #[test_case("19800101", Some("1980-01-01") ; "full date")]
    #[test_case("198001011230", Some("1980-01-01") ; "date with time")]
    #[test_case("198001", Some("1980-01") ; "year month")]
    #[test_case("1980", Some("1980") ; "year")]
    #[test_case("198013", None ; "bad month")]
    #[test_case("19800230", None ; "bad day")]
    #[test_case("", None ; "empty")]
    fn test_hl7_date_to_iso(raw: &str, expected: Option<&str>) {
        assert_eq!(hl7_date_to_iso(raw).as_deref(), expected);
    }

    #[test_case("1990-05-12", Some("19900512") ; "full date")]
    #[test_case("1990-05", Some("199005") ; "year month")]
    #[test_case("1990", Some("1990") ; "year")]
    #[test_case("1990-05-12T10:00:00Z", Some("19900512") ; "date time")]
    #[test_case("12/05/1990", None ; "foreign format")]
    fn test_iso_date_to_hl7(raw: &str, expected: Option<&str>) {
        assert_eq!(iso_date_to_hl7(raw).as_deref(), expected);
    }

    #[test]
    fn test_iso_to_hl7_timestamp() {
        assert_eq!(
            iso_to_hl7_timestamp("2024-03-05T08:30:15+01:00").as_deref(),
            Some("20240305083015")
        );
        assert_eq!(
            iso_to_hl7_timestamp("2024-03-05T08:30").as_deref(),
            Some("20240305083000")
        );
        assert_eq!(
            iso_to_hl7_timestamp("2024-03-05").as_deref(),
            Some("20240305000000")
        );
        assert!(iso_to_hl7_timestamp("yesterday").is_none());
    }
}
