//! Display formatting shared by the CLI output and the PDF exporter.

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::analytics::parse_record_date;

/// Format a monetary amount with two decimals. Missing values print as
/// `0.00`; non-numeric strings are passed through unchanged.
pub fn format_amount(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "0.00".to_string(),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| n.to_string()),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => format!("{v:.2}"),
            _ => s.clone(),
        },
        Some(other) => other.to_string(),
    }
}

/// Same as [`format_amount`] for an already-parsed decimal.
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.2}")
    } else {
        "0.00".to_string()
    }
}

/// `Jan 14, 2024` style date, or `-` when the value is missing or invalid.
pub fn format_date(value: Option<&Value>) -> String {
    value
        .and_then(parse_record_date)
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Minute-resolution timestamp used in export file names (`2024-01-15-09-30`).
pub fn export_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d-%H-%M").to_string()
}

/// First `len` characters of a hash (char-boundary safe).
pub fn short_hash(hash: &str, len: usize) -> String {
    hash.chars().take(len).collect()
}
