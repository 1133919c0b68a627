//! Lenient numeric parsing for table cells.
//!
//! Exported tables carry values such as `"40"`, `"12.5%"` or nothing at all.
//! A run never fails on a bad number: the longest leading numeric prefix is
//! used, and anything else falls back to a caller-chosen default.

use regex::Regex;
use std::sync::OnceLock;

fn float_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid float regex")
    })
}

fn int_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?\d+").expect("valid int regex"))
}

/// Parse the leading number of `cell`, or return `fallback`.
pub fn parse_number_or(cell: &str, fallback: f64) -> f64 {
    let cell = cell.trim();
    float_prefix()
        .find(cell)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
}

/// Parse the leading integer of `cell`.
pub fn parse_int_prefix(cell: &str) -> Option<i64> {
    int_prefix()
        .find(cell.trim())
        .and_then(|m| m.as_str().parse::<i64>().ok())
}
