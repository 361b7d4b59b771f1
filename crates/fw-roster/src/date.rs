//! Birth/target date parsing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RosterError;

/// Leap year used to validate month/day pairs so that February 29 is accepted.
const LEAP_REFERENCE_YEAR: i32 = 2000;

/// A recurring calendar day, independent of year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    #[must_use]
    pub const fn is_leap_day(self) -> bool {
        self.month == 2 && self.day == 29
    }
}

/// Split `YYYY-MM-DD` into its numeric parts without validating the calendar.
fn split_ymd(input: &str) -> Option<(i32, u32, u32)> {
    let bytes = input.as_bytes();
    if !input.is_ascii() || bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| {
        let part = &input[range];
        if part.bytes().all(|b| b.is_ascii_digit()) {
            Some(part)
        } else {
            None
        }
    };
    let year = digits(0..4)?.parse().ok()?;
    let month = digits(5..7)?.parse().ok()?;
    let day = digits(8..10)?.parse().ok()?;
    Some((year, month, day))
}

/// Parse a `YYYY-MM-DD` birth date into its month/day pair.
///
/// The year only has to be four digits; February 29 is accepted for any year
/// since leap handling happens when the occurrence is computed.
///
/// # Errors
///
/// Returns [`RosterError::InvalidDateFormat`] for any other shape or for a
/// month/day pair that never exists (month 13, April 31, ...).
pub fn normalize(input: &str) -> Result<MonthDay, RosterError> {
    let invalid = || RosterError::InvalidDateFormat(input.to_string());
    let (_, month, day) = split_ymd(input).ok_or_else(invalid)?;
    NaiveDate::from_ymd_opt(LEAP_REFERENCE_YEAR, month, day).ok_or_else(invalid)?;
    Ok(MonthDay { month, day })
}

/// Parse a full `YYYY-MM-DD` date, including the year check for February 29.
///
/// # Errors
///
/// Returns [`RosterError::InvalidDateFormat`] if the string is malformed or the
/// date does not exist.
pub fn parse_calendar_date(input: &str) -> Result<NaiveDate, RosterError> {
    let invalid = || RosterError::InvalidDateFormat(input.to_string());
    let (year, month, day) = split_ymd(input).ok_or_else(invalid)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}
