//! Calendar date handling for dashboard records
//!
//! Dates arrive as day/month/year strings, sometimes with a trailing time
//! (`18/10/2026 14:03` or `18/10/2026, 14:03:00`). Only the calendar date is
//! significant; it is interpreted at local midnight.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

const SECONDS_PER_DAY: i64 = 86_400;

/// Error parsing a record date
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    /// The field was empty or whitespace
    #[error("date is empty")]
    Empty,

    /// The date part did not match `dd/mm/yyyy` or is not a real calendar day
    #[error("invalid date {0:?}, expected dd/mm/yyyy")]
    Invalid(String),
}

/// Parse a `dd/mm/yyyy` date, ignoring any time suffix
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    let date_part = raw
        .split_whitespace()
        .next()
        .map(|part| part.trim_end_matches(','))
        .ok_or(DateParseError::Empty)?;

    NaiveDate::parse_from_str(date_part, "%d/%m/%Y")
        .map_err(|_| DateParseError::Invalid(raw.to_string()))
}

/// Whole days between local midnight of `date` and `now`, floored
///
/// Partial days never round up, so a record entered yesterday at any hour
/// counts as one day old for the whole of today.
pub fn days_elapsed(now: NaiveDateTime, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    (now - midnight).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Format a date the way dashboard records store it
pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
