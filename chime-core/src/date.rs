//! Date and time-of-day parsing
//!
//! Dates accept the same loose human forms a task list would:
//! - Relative: "today", "tomorrow", "yesterday"
//! - Weekdays: "friday", "next monday"
//! - Offset: "in 3 days", "in 2 weeks"
//! - Absolute: "2026-01-25", "25/01/2026", "Jan 25", "25 January 2026"
//!
//! Times of day accept "14:30", "14:30:15", "9am", "9:30pm", "noon" and
//! "midnight". A reminder instant is the combination of both in the local
//! timezone, see [`local_instant`].

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use regex::Regex;

use crate::error::{CoreError, Result};

// Regex pattern is a compile-time constant - an invalid pattern is a programming error
static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?(?::(\d{2}))?\s*(am|pm)?$")
        .expect("Invalid time-of-day regex pattern")
});

/// Formats tried when a date is not relative, year included
const DATED_FORMATS: [&str; 6] = [
    "%Y-%m-%d", // 2026-01-25
    "%d/%m/%Y", // 25/01/2026
    "%b %d %Y", // Jan 25 2026
    "%B %d %Y", // January 25 2026
    "%d %b %Y", // 25 Jan 2026
    "%d %B %Y", // 25 January 2026
];

/// Formats without a year; the next occurrence is used
const YEARLESS_FORMATS: [&str; 5] = ["%d/%m", "%b %d", "%B %d", "%d %b", "%d %B"];

/// Parse a date relative to the local calendar day
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    parse_date_relative_to(input, Local::now().date_naive())
}

/// Parse a date string, resolving relative forms against `today`
pub fn parse_date_relative_to(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim().to_lowercase();

    let parsed = relative_day(&input, today)
        .or_else(|| weekday(&input, today))
        .or_else(|| offset(&input, today))
        .or_else(|| {
            DATED_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&input, fmt).ok())
        })
        .or_else(|| yearless(&input, today));

    parsed.ok_or_else(|| {
        CoreError::parse(format!(
            "Could not parse date '{}'. Try formats like: 'tomorrow', 'friday', 'in 3 days', '25/01/2026', 'Jan 25'",
            input
        ))
    })
}

fn relative_day(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    match input {
        "today" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        _ => None,
    }
}

/// "friday" and "next friday" both mean the next Friday strictly after today
fn weekday(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let name = input.strip_prefix("next ").unwrap_or(input).trim();

    let target = match name {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };

    let ahead = (7 + target.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today.checked_add_days(Days::new(u64::from(ahead)))
}

fn offset(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let rest = input.strip_prefix("in ")?;
    let mut parts = rest.split_whitespace();
    let count: u64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    match unit {
        "day" | "days" => today.checked_add_days(Days::new(count)),
        "week" | "weeks" => today.checked_add_days(Days::new(count.checked_mul(7)?)),
        _ => None,
    }
}

/// Yearless dates land on this year, or next year once they have passed
fn yearless(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    // chrono refuses to build a date without a year, so pin one in
    let with_year = format!("{} {}", input, today.year());
    YEARLESS_FORMATS.iter().find_map(|fmt| {
        let date = NaiveDate::parse_from_str(&with_year, &format!("{fmt} %Y")).ok()?;
        if date < today {
            date.with_year(today.year() + 1)
        } else {
            Some(date)
        }
    })
}

/// Parse a time of day
///
/// 24-hour input needs minutes ("9:00", not "9"); 12-hour input needs a
/// meridiem ("9am"). Out-of-range components are rejected rather than
/// wrapped.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    let input = input.trim().to_lowercase();

    match input.as_str() {
        "noon" | "midday" => return Ok(NaiveTime::MIN + chrono::Duration::hours(12)),
        "midnight" => return Ok(NaiveTime::MIN),
        _ => {}
    }

    let caps = TIME_REGEX.captures(&input).ok_or_else(|| {
        CoreError::parse(format!(
            "Could not parse time '{}'. Try formats like: '14:30', '9am', '9:30pm', 'noon'",
            input
        ))
    })?;

    let number = |idx: usize| -> Result<i64> {
        caps.get(idx).map_or(Ok(0), |m| {
            m.as_str()
                .parse::<i64>()
                .map_err(|e| CoreError::parse_with_source("Invalid time component", e))
        })
    };

    let mut hour = number(1)?;
    let minute = CoreError::check_range("minute", number(2)?, 0, 59)?;
    let second = CoreError::check_range("second", number(3)?, 0, 59)?;

    match caps.get(4).map(|m| m.as_str()) {
        Some(meridiem) => {
            hour = CoreError::check_range("hour", hour, 1, 12)? % 12;
            if meridiem == "pm" {
                hour += 12;
            }
        }
        None => {
            if caps.get(2).is_none() {
                return Err(CoreError::validation(
                    "time",
                    format!("'{}' is ambiguous, use '{}:00' or '{}am'/'{}pm'", input, hour, hour, hour),
                ));
            }
            hour = CoreError::check_range("hour", hour, 0, 23)?;
        }
    }

    // All three components were range-checked above
    NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)
        .ok_or_else(|| CoreError::validation("time", format!("'{}' is not a valid time", input)))
}

/// Combine a calendar date and an optional time of day into a local instant
///
/// A missing time means start of day. When a DST change makes the local
/// time ambiguous the earlier instant wins; when it makes it nonexistent
/// the combination is rejected.
pub fn local_instant(date: NaiveDate, time: Option<NaiveTime>) -> Result<DateTime<Local>> {
    instant_in(&Local, date, time)
}

/// [`local_instant`] for an explicit timezone
pub fn instant_in<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
    time: Option<NaiveTime>,
) -> Result<DateTime<Tz>> {
    let naive = date.and_time(time.unwrap_or(NaiveTime::MIN));
    tz.from_local_datetime(&naive).earliest().ok_or_else(|| {
        CoreError::validation(
            "time",
            format!("{} does not exist in the local timezone", naive.format("%d/%m/%Y %H:%M")),
        )
    })
}

/// Format a date for display relative to `today`
///
/// Returns strings like: "Today", "Tomorrow", "Fri", "3 days ago" or "25/01/2026"
pub fn format_date_human(date: NaiveDate, today: NaiveDate) -> String {
    let diff = date.signed_duration_since(today).num_days();

    match diff {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        2..=6 => date.format("%a").to_string(),
        -6..=-2 => format!("{} days ago", -diff),
        _ => date.format("%d/%m/%Y").to_string(),
    }
}
