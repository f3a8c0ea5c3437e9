//! Date and time epochs and unit conversions.
//!
//! `DATE`, `SHORTDATE` and `DATETIME` count days from 1900-01-01.
//! `BIGDATETIMEN` counts microseconds from 0000-01-01, `BIGTIMEN`
//! microseconds from midnight. Classic `TIME` and the time part of
//! `DATETIME` count 1/300 second ticks.

// Allow expect() for chrono date construction with known-valid constant dates
#![allow(clippy::expect_used)]

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::TypeError;

/// Microseconds per day.
pub const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Ticks per second used by `TIME` and `DATETIME`.
pub const TICKS_PER_SECOND: i64 = 300;

/// Reference date of `DATE`, `SHORTDATE` and `DATETIME`.
#[must_use]
pub fn epoch_1900() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).expect("valid date")
}

/// Reference date of `BIGDATETIMEN`.
#[must_use]
pub fn epoch_year_zero() -> NaiveDate {
    NaiveDate::from_ymd_opt(0, 1, 1).expect("valid date")
}

fn midnight() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 0, 0).expect("valid time")
}

/// Add a number of days to a reference date.
pub fn date_from_days(epoch: NaiveDate, days: i64) -> Result<NaiveDate, TypeError> {
    Duration::try_days(days)
        .and_then(|d| epoch.checked_add_signed(d))
        .ok_or_else(|| TypeError::InvalidDateTime(format!("{days} days from {epoch}")))
}

/// Days between a reference date and a date.
#[must_use]
pub fn days_since(epoch: NaiveDate, date: NaiveDate) -> i64 {
    date.signed_duration_since(epoch).num_days()
}

/// Time of day from 1/300 second ticks.
pub fn time_from_ticks(ticks: i64) -> Result<NaiveTime, TypeError> {
    let millis = ticks * 1000 / TICKS_PER_SECOND;
    time_from_micros(millis * 1000)
}

/// 1/300 second ticks since midnight, rounded to the nearest tick.
#[must_use]
pub fn ticks_from_time(time: NaiveTime) -> i64 {
    let millis = micros_from_time(time) / 1000;
    (millis * TICKS_PER_SECOND + 500) / 1000
}

/// Time of day from microseconds since midnight.
pub fn time_from_micros(micros: i64) -> Result<NaiveTime, TypeError> {
    if !(0..MICROS_PER_DAY).contains(&micros) {
        return Err(TypeError::InvalidDateTime(format!(
            "{micros} microseconds is not a time of day"
        )));
    }
    Ok(midnight() + Duration::microseconds(micros))
}

/// Microseconds since midnight.
#[must_use]
pub fn micros_from_time(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) * 1_000_000 + i64::from(time.nanosecond() / 1000)
}

/// Date and time from microseconds since a reference date.
pub fn datetime_from_micros(epoch: NaiveDate, micros: i64) -> Result<NaiveDateTime, TypeError> {
    let date = date_from_days(epoch, micros.div_euclid(MICROS_PER_DAY))?;
    let time = time_from_micros(micros.rem_euclid(MICROS_PER_DAY))?;
    Ok(date.and_time(time))
}

/// Microseconds between a reference date and a date and time.
#[must_use]
pub fn micros_since(epoch: NaiveDate, datetime: NaiveDateTime) -> i64 {
    days_since(epoch, datetime.date()) * MICROS_PER_DAY + micros_from_time(datetime.time())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks() {
        let time = time_from_ticks(300).unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(0, 0, 1).unwrap());
        assert_eq!(ticks_from_time(time), 300);

        let time = NaiveTime::from_hms_milli_opt(23, 59, 59, 990).unwrap();
        assert_eq!(time_from_ticks(ticks_from_time(time)).unwrap(), time);
    }

    #[test]
    fn test_micros_out_of_range() {
        assert!(time_from_micros(MICROS_PER_DAY).is_err());
        assert!(time_from_micros(-1).is_err());
    }

    #[test]
    fn test_datetime_micros() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(13, 14, 15, 123_456)
            .unwrap();
        let micros = micros_since(epoch_year_zero(), dt);
        assert_eq!(datetime_from_micros(epoch_year_zero(), micros).unwrap(), dt);
    }

    #[test]
    fn test_days() {
        let date = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
        assert_eq!(days_since(epoch_1900(), date), -1);
        assert_eq!(date_from_days(epoch_1900(), -1).unwrap(), date);
    }
}
