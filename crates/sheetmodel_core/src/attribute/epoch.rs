//! Spreadsheet serial-day encoding of dates and times.
//!
//! Day `1.0` is 1900-01-01; the fractional part is the time of day.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

fn epoch_base() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 31).unwrap_or(NaiveDate::MIN)
}

pub fn date_to_serial(date: NaiveDate) -> f64 {
    (date - epoch_base()).num_days() as f64
}

pub fn serial_to_date(days: i64) -> Option<NaiveDate> {
    epoch_base().checked_add_signed(Duration::try_days(days)?)
}

pub fn time_to_fraction(time: NaiveTime) -> f64 {
    f64::from(time.num_seconds_from_midnight()) / SECONDS_PER_DAY
}

/// Converts a day fraction into a time rounded to whole seconds.
///
/// Returns `None` outside `[0, 1)` day.
pub fn fraction_to_time(fraction: f64) -> Option<NaiveTime> {
    let seconds = (fraction * SECONDS_PER_DAY).round();
    if !(0.0..SECONDS_PER_DAY).contains(&seconds) {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)
}

pub fn datetime_to_serial(value: NaiveDateTime) -> f64 {
    date_to_serial(value.date()) + time_to_fraction(value.time())
}

/// Splits a serial number into a date and a whole-second time.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let days = serial.floor();
    let date = serial_to_date(days as i64)?;
    let time = fraction_to_time(serial - days)?;
    Some(date.and_time(time))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

/// Parses common date and date-time spellings; dates map to midnight.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in DATETIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
            return Some(value);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(value) = NaiveDate::parse_from_str(text, format) {
            return value.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}

/// Whether `time` is exactly midnight, including sub-seconds.
pub fn is_midnight(time: NaiveTime) -> bool {
    time.num_seconds_from_midnight() == 0 && time.nanosecond() == 0
}

#[cfg(test)]
mod tests {
    use super::{
        date_to_serial, datetime_to_serial, fraction_to_time, parse_datetime, serial_to_date,
        serial_to_datetime,
    };
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn first_day_of_1900_is_serial_one() {
        let date = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        assert_eq!(date_to_serial(date), 1.0);
        assert_eq!(serial_to_date(1), Some(date));
    }

    #[test]
    fn datetime_serial_carries_time_fraction() {
        let value = NaiveDate::from_ymd_opt(2000, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let serial = datetime_to_serial(value);
        assert_eq!(serial.fract(), 0.5);
        assert_eq!(serial_to_datetime(serial), Some(value));
    }

    #[test]
    fn fraction_outside_one_day_is_rejected() {
        assert_eq!(fraction_to_time(0.25), NaiveTime::from_hms_opt(6, 0, 0));
        assert_eq!(fraction_to_time(1.0), None);
        assert_eq!(fraction_to_time(-0.1), None);
    }

    #[test]
    fn parse_accepts_iso_like_spellings() {
        assert!(parse_datetime("2017-03-04").is_some());
        assert!(parse_datetime("2017-03-04 10:11:12").is_some());
        assert!(parse_datetime("2017-03-04T10:11").is_some());
        assert!(parse_datetime("not a date").is_none());
    }
}
