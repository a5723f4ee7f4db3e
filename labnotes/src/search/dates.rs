//! Relative date phrases
//!
//! Extractors may report dates as phrases like "2 weeks ago". Every such
//! value is rewritten against the current day before it reaches a query.

use chrono::{Days, Local, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn iso_date_re() -> &'static Regex {
    static ISO_DATE_RE: OnceLock<Regex> = OnceLock::new();
    ISO_DATE_RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"))
}

fn number_re() -> &'static Regex {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
    NUMBER_RE.get_or_init(|| Regex::new(r"\d+").expect("valid number regex"))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn is_iso_date(value: &str) -> bool {
    iso_date_re().is_match(value)
}

/// `date` moved back by `days`, or `None` when that leaves the calendar
pub fn days_before(date: NaiveDate, days: u64) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(days))
}

/// Resolve a relative date phrase to `YYYY-MM-DD`.
///
/// ISO dates are returned unchanged, so resolving twice is the same as
/// resolving once. Phrases that are not recognised are passed through as
/// given.
pub fn resolve_relative_date(value: &str, today: NaiveDate) -> String {
    let trimmed = value.trim();
    if is_iso_date(trimmed) {
        return trimmed.to_string();
    }

    let phrase = trimmed.to_lowercase();
    let count = || {
        number_re()
            .find(&phrase)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(1)
    };

    let days_back = if phrase.contains("month") && phrase.contains("ago") {
        count().checked_mul(30)
    } else if phrase.contains("week") && phrase.contains("ago") {
        count().checked_mul(7)
    } else if phrase.contains("day") && phrase.contains("ago") {
        Some(count())
    } else {
        match phrase.as_str() {
            "yesterday" => Some(1),
            "last week" => Some(7),
            "last month" => Some(30),
            "today" => Some(0),
            _ => None,
        }
    };

    match days_back.and_then(|days| days_before(today, days)) {
        Some(date) => format_date(date),
        None => {
            tracing::debug!("Leaving unrecognised date '{}' as given", value);
            value.to_string()
        }
    }
}
