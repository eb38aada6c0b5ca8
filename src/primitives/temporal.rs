//! Time and date content codecs.
//!
//! GeneralizedTime and UTCTime accept the `Z`, `±HHMM`, and zoneless
//! layouts on decode and always emit the canonical UTC (`Z`) form.
//! DATE, DATE-TIME, and TIME-OF-DAY use the ISO 8601 basic layouts.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};

use crate::error::{intern, Error, PrimitiveErrorKind, Result};
use crate::types::{Date, GeneralizedTime, TimeOfDay, UtcTime};

fn invalid(msg: &str) -> Error {
    PrimitiveErrorKind::InvalidDate { msg: intern(msg) }.into()
}

fn content_str(contents: &[u8]) -> Result<&str> {
    core::str::from_utf8(contents).map_err(|_| invalid("time value is not ASCII"))
}

/// Fractional seconds are truncated to microsecond precision on format.
fn format_fraction(micros: u32) -> String {
    if micros == 0 {
        return String::new();
    }
    let mut fraction = format!(".{micros:06}");
    while fraction.ends_with('0') {
        fraction.pop();
    }
    fraction
}

/// `YYYYMMDDhhmmss[.ffffff]Z`, always in UTC.
pub(crate) fn encode_generalized_time(value: &GeneralizedTime) -> Vec<u8> {
    let utc = value.naive_utc();
    let fraction = format_fraction(utc.and_utc().timestamp_subsec_micros());
    format!("{}{}Z", utc.format("%Y%m%d%H%M%S"), fraction).into_bytes()
}

/// Parses `YYYYMMDDhhmmss[.fff][Z|±HHMM]`; a zoneless value is taken as
/// UTC.
pub(crate) fn decode_generalized_time(contents: &[u8]) -> Result<GeneralizedTime> {
    let text = content_str(contents)?;

    if let Some(body) = text.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(body, "%Y%m%d%H%M%S%.f")
            .map_err(|_| invalid("malformed GeneralizedTime"))?;
        return Ok(utc_offset().from_utc_datetime(&naive));
    }

    if has_numeric_zone(text) {
        return DateTime::parse_from_str(text, "%Y%m%d%H%M%S%.f%z")
            .map_err(|_| invalid("malformed GeneralizedTime offset"));
    }

    let naive = NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.f")
        .map_err(|_| invalid("malformed GeneralizedTime"))?;
    Ok(utc_offset().from_utc_datetime(&naive))
}

fn utc_offset() -> FixedOffset {
    FixedOffset::east_opt(0).expect("zero offset is valid")
}

fn has_numeric_zone(text: &str) -> bool {
    text.len() > 5
        && matches!(text.as_bytes()[text.len() - 5], b'+' | b'-')
        && text.as_bytes()[text.len() - 4..]
            .iter()
            .all(u8::is_ascii_digit)
}

/// `YYMMDDhhmmssZ`, always in UTC with seconds present.
pub(crate) fn encode_utc_time(value: &UtcTime) -> Vec<u8> {
    value
        .naive_utc()
        .format("%y%m%d%H%M%SZ")
        .to_string()
        .into_bytes()
}

/// Parses `YYMMDDhh[mm][ss][Z|±HHMM]`. Two-digit years 50–99 map to 19xx
/// and 00–49 to 20xx.
pub(crate) fn decode_utc_time(contents: &[u8]) -> Result<UtcTime> {
    let text = content_str(contents)?;

    let (body, offset_minutes) = if let Some(body) = text.strip_suffix('Z') {
        (body, 0i32)
    } else if has_numeric_zone(text) {
        let (body, zone) = text.split_at(text.len() - 5);
        let sign = if zone.starts_with('-') { -1 } else { 1 };
        let hours: i32 = zone[1..3].parse().map_err(|_| invalid("malformed zone"))?;
        let minutes: i32 = zone[3..5].parse().map_err(|_| invalid("malformed zone"))?;
        (body, sign * (hours * 60 + minutes))
    } else {
        (text, 0i32)
    };

    if !body.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid("malformed UTCTime"));
    }

    if body.len() < 6 {
        return Err(invalid("UTCTime too short"));
    }
    let (date_digits, time_digits) = body.split_at(6);

    let year: i32 = date_digits[0..2].parse().map_err(|_| invalid("bad year"))?;
    let year = if year >= 50 { 1900 + year } else { 2000 + year };
    let month: u32 = date_digits[2..4].parse().map_err(|_| invalid("bad month"))?;
    let day: u32 = date_digits[4..6].parse().map_err(|_| invalid("bad day"))?;

    let (hour, minute, second) = match time_digits.len() {
        2 => (parse_two(&time_digits[0..2])?, 0, 0),
        4 => (
            parse_two(&time_digits[0..2])?,
            parse_two(&time_digits[2..4])?,
            0,
        ),
        6 => (
            parse_two(&time_digits[0..2])?,
            parse_two(&time_digits[2..4])?,
            parse_two(&time_digits[4..6])?,
        ),
        _ => return Err(invalid("malformed UTCTime time component")),
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| invalid("UTCTime out of range"))?;

    let adjusted = naive - chrono::Duration::minutes(i64::from(offset_minutes));
    Ok(Utc.from_utc_datetime(&adjusted))
}

fn parse_two(digits: &str) -> Result<u32> {
    digits.parse().map_err(|_| invalid("malformed UTCTime digits"))
}

/// `YYYYMMDD`.
pub(crate) fn encode_date(value: &Date) -> Vec<u8> {
    value.format("%Y%m%d").to_string().into_bytes()
}

pub(crate) fn decode_date(contents: &[u8]) -> Result<Date> {
    NaiveDate::parse_from_str(content_str(contents)?, "%Y%m%d")
        .map_err(|_| invalid("malformed DATE"))
}

/// `YYYYMMDDhhmmss`.
pub(crate) fn encode_date_time(value: &NaiveDateTime) -> Vec<u8> {
    value.format("%Y%m%d%H%M%S").to_string().into_bytes()
}

pub(crate) fn decode_date_time(contents: &[u8]) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(content_str(contents)?, "%Y%m%d%H%M%S")
        .map_err(|_| invalid("malformed DATE-TIME"))
}

/// `hhmmss`.
pub(crate) fn encode_time_of_day(value: &TimeOfDay) -> Vec<u8> {
    format!(
        "{:02}{:02}{:02}",
        value.hour(),
        value.minute(),
        value.second()
    )
    .into_bytes()
}

pub(crate) fn decode_time_of_day(contents: &[u8]) -> Result<TimeOfDay> {
    NaiveTime::parse_from_str(content_str(contents)?, "%H%M%S")
        .map_err(|_| invalid("malformed TIME-OF-DAY"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn generalized(text: &str) -> GeneralizedTime {
        decode_generalized_time(text.as_bytes()).unwrap()
    }

    #[test]
    fn generalized_time_forms() {
        let plain = generalized("20180122132900Z");
        assert_eq!(b"20180122132900Z".to_vec(), encode_generalized_time(&plain));

        let fractional = generalized("20001231205959.999Z");
        assert_eq!(
            b"20001231205959.999Z".to_vec(),
            encode_generalized_time(&fractional)
        );

        // An explicit offset converts to the canonical UTC form.
        let offset = generalized("20230122130000-0500");
        assert_eq!(
            b"20230122180000Z".to_vec(),
            encode_generalized_time(&offset)
        );

        // Zoneless implies UTC.
        let local = generalized("20230122130000");
        assert_eq!(b"20230122130000Z".to_vec(), encode_generalized_time(&local));
    }

    #[test]
    fn generalized_time_truncates_to_micros() {
        let value = generalized("20180122132900.1234569Z");
        assert_eq!(
            b"20180122132900.123456Z".to_vec(),
            encode_generalized_time(&value)
        );
    }

    #[test]
    fn generalized_time_rejects_garbage() {
        assert!(decode_generalized_time(b"+51615  052409402Z").is_err());
        assert!(decode_generalized_time(b"20181322132900Z").is_err());
    }

    #[test]
    fn utc_time_century_split() {
        let nineties = decode_utc_time(b"980122132900Z").unwrap();
        assert_eq!(1998, nineties.naive_utc().date().year());

        let twenties = decode_utc_time(b"490122132900Z").unwrap();
        assert_eq!(2049, twenties.naive_utc().date().year());

        let edge = decode_utc_time(b"500101000000Z").unwrap();
        assert_eq!(1950, edge.naive_utc().date().year());
    }

    #[test]
    fn utc_time_optional_components_and_zones() {
        let no_seconds = decode_utc_time(b"1801221329Z").unwrap();
        assert_eq!(b"180122132900Z".to_vec(), encode_utc_time(&no_seconds));

        let offset = decode_utc_time(b"230122130000-0500").unwrap();
        assert_eq!(b"230122180000Z".to_vec(), encode_utc_time(&offset));
    }

    #[test]
    fn date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2012, 12, 21).unwrap();
        let bytes = encode_date(&date);
        assert_eq!(b"20121221".to_vec(), bytes);
        assert_eq!(date, decode_date(&bytes).unwrap());
    }

    #[test]
    fn date_time_round_trip() {
        let value = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let bytes = encode_date_time(&value);
        assert_eq!(b"20240229235959".to_vec(), bytes);
        assert_eq!(value, decode_date_time(&bytes).unwrap());
    }

    #[test]
    fn time_of_day_round_trip() {
        let value = NaiveTime::from_hms_opt(13, 0, 5).unwrap();
        let bytes = encode_time_of_day(&value);
        assert_eq!(b"130005".to_vec(), bytes);
        assert_eq!(value, decode_time_of_day(&bytes).unwrap());
    }
}
