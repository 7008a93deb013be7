//! The `date` filter

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::value::Value;

use super::{to_string, FilterArgs, FilterError, FilterResult};

/// Formats tried, in order, for dates without an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

/// Format a date or time with a `strftime` style format string
///
/// The left value can be a timestamp, a date string, or `now` or `today`.
/// Values that are not dates are returned unchanged.
pub fn date(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(1)?;
    let format = match args.required(0, "format")? {
        Value::Nil => return Ok(left.clone()),
        format => to_string(format),
    };
    if format.is_empty() {
        return Ok(left.clone());
    }

    match parse_date(left) {
        Some(date) => format_date(&date, &format).map(Value::String),
        None => Ok(left.clone()),
    }
}

/// Interpret a value as a point in time
pub fn parse_date(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::Int(timestamp) => from_timestamp(*timestamp),
        Value::Float(timestamp) => from_timestamp(timestamp.trunc() as i64),
        Value::String(s) | Value::Markup(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<FixedOffset>> {
    match s {
        "now" | "today" => return Some(Local::now().fixed_offset()),
        _ => {}
    }

    if let Ok(timestamp) = s.parse::<i64>() {
        return from_timestamp(timestamp);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date);
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(s) {
        return Some(date);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|date| date.fixed_offset())
}

fn from_timestamp(timestamp: i64) -> Option<DateTime<FixedOffset>> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|date| date.fixed_offset())
}

/// Format `date`, reporting a bad format string as an argument error
fn format_date(date: &DateTime<FixedOffset>, format: &str) -> Result<String, FilterError> {
    let mut formatted = String::new();
    write!(formatted, "{}", date.format(format))
        .map_err(|_| FilterError::argument(format!("invalid date format '{}'", format)))?;
    Ok(formatted)
}
