//! Cell-level casts and formatting.
//!
//! Every cast here is total: a value that cannot be interpreted resolves to
//! `None` instead of an error, so a bad cell nulls itself without dropping
//! the row it lives in. Timestamps outside a sane calendar window are
//! treated as unavailable rather than surfaced.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

pub const MIN_CALENDAR_YEAR: i32 = 1900;
pub const MAX_CALENDAR_YEAR: i32 = 2100;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Interprets a raw cell as a float, tolerating currency symbols, thousands
/// separators, and accounting-style parenthesized negatives.
pub fn cast_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut body = trimmed;
    let mut negative = false;
    if body.starts_with('(') && body.ends_with(')') && body.len() > 2 {
        negative = true;
        body = body[1..body.len() - 1].trim();
    }
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '$' | '€' | '£' | '¥'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Interprets a raw cell as a timestamp. Date-only inputs resolve to
/// midnight. Values outside [`MIN_CALENDAR_YEAR`], [`MAX_CALENDAR_YEAR`]
/// are unavailable.
pub fn cast_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = parse_datetime(trimmed)
        .or_else(|| parse_date(trimmed).map(|date| date.and_time(NaiveTime::MIN)))?;
    in_calendar_range(&parsed).then_some(parsed)
}

/// Passes a text cell through untouched apart from trimming; blank cells
/// become null so they never form their own group downstream.
pub fn cast_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn in_calendar_range(ts: &NaiveDateTime) -> bool {
    (MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&ts.date().year())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

pub fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

pub fn format_ratio(value: Option<f64>) -> String {
    value
        .map(|ratio| format!("{:+.1}%", ratio * 100.0))
        .unwrap_or_default()
}

/// ISO-8601 rendering for timestamps crossing the output boundary.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}
