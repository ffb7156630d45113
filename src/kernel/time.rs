// src/kernel/time.rs
//! Timestamp bridge
//!
//! Converts the firmware calendar record (`EFI_TIME`) into POSIX epoch
//! seconds. The firmware reports local time together with its offset from
//! UTC in minutes (`UTC = local + timezone`), or the unspecified marker.

use r_efi::efi::{Time, UNSPECIFIED_TIMEZONE};

use crate::errors::TimeError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Days elapsed before each month, for common and leap years.
/// The thirteenth entry is the length of the year.
static CUMULATIVE_DAYS: [[u16; 13]; 2] = [
    [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365],
    [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366],
];

#[inline]
const fn is_leap(year: u16) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

#[inline]
fn year_table(year: u16) -> &'static [u16; 13] {
    &CUMULATIVE_DAYS[usize::from(is_leap(year))]
}

/// Check a record against the accepted calendar ranges
///
/// # Errors
///
/// Returns the first field found out of range.
pub fn validate(time: &Time) -> Result<(), TimeError> {
    if !(1998..=2099).contains(&time.year) {
        return Err(TimeError::YearOutOfRange(time.year));
    }
    if !(1..=12).contains(&time.month) {
        return Err(TimeError::MonthOutOfRange(time.month));
    }
    if !(1..=31).contains(&time.day) {
        return Err(TimeError::DayOutOfRange(time.day));
    }
    if time.hour > 23 {
        return Err(TimeError::HourOutOfRange(time.hour));
    }
    if time.minute > 59 {
        return Err(TimeError::MinuteOutOfRange(time.minute));
    }
    if time.second > 59 {
        return Err(TimeError::SecondOutOfRange(time.second));
    }
    if time.timezone != UNSPECIFIED_TIMEZONE && !(-1440..=1440).contains(&time.timezone) {
        return Err(TimeError::TimeZoneOutOfRange(time.timezone));
    }
    Ok(())
}

/// Convert a calendar record to epoch seconds
///
/// # Errors
///
/// Returns a [`TimeError`] when the record fails validation.
pub fn try_epoch(time: &Time) -> Result<i64, TimeError> {
    validate(time)?;

    let days_in_years: i64 = (1970..time.year)
        .map(|y| i64::from(year_table(y)[12]))
        .sum();
    let days_in_months = i64::from(year_table(time.year)[usize::from(time.month - 1)]);
    let days = days_in_years + days_in_months + i64::from(time.day - 1);

    let mut seconds = days * SECONDS_PER_DAY
        + i64::from(time.hour) * 3600
        + i64::from(time.minute) * 60
        + i64::from(time.second);
    if time.timezone != UNSPECIFIED_TIMEZONE {
        seconds += i64::from(time.timezone) * 60;
    }
    Ok(seconds)
}

/// Convert a calendar record to epoch seconds, or 0 when it is invalid
///
/// Use [`try_epoch`] to tell an invalid record apart from the epoch itself.
#[must_use]
pub fn epoch(time: &Time) -> i64 {
    try_epoch(time).unwrap_or(0)
}
