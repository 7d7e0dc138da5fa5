//! The scraper's only output shape (spec §4.6).

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct NormalizedJob {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: String,
    pub url: String,
    pub posted_date: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
}

/// Best-effort string coercion for a field value extracted from JSON or
/// HTML. Numbers and bools render via their natural `Display`; arrays and
/// objects are rejected (return `None`) since no field is expected to hold
/// structured data.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces a numeric timestamp (epoch seconds or milliseconds) or an
/// already-ISO-8601 string into ISO-8601 (spec §4.6 "coercing numeric
/// timestamps to ISO-8601"). Values that are neither pass through
/// unchanged — the caller treats an unparsable date as "unknown", not a
/// scrape failure.
pub fn coerce_date(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            let millis = n.as_i64()?;
            let seconds_scale = if millis > 10_000_000_000 { millis / 1000 } else { millis };
            Utc.timestamp_opt(seconds_scale, 0)
                .single()
                .map(|dt: DateTime<Utc>| dt.to_rfc3339())
        }
        _ => None,
    }
}
