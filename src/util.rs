// Parsing and formatting helpers.
//
// Upstream cells arrive as strings; everything here turns them into typed
// values (or `None`) so the loader can decide what a failure means.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

use crate::pages::ShortLabel;

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok()
}

/// Reference periods come as `YYYY-MM-DD`, `YYYY-MM` (monthly/quarterly
/// tables) or `YYYY` (annual tables). Partial dates resolve to the first day
/// of the period.
pub fn parse_ref_date(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    match s.len() {
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok(),
        4 => NaiveDate::parse_from_str(&format!("{s}-01-01"), "%Y-%m-%d").ok(),
        _ => None,
    }
}

pub fn parse_date_input(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| "date must use YYYY-MM-DD format".to_string())
}

pub fn short_label(name: &str, mode: ShortLabel) -> String {
    match mode {
        ShortLabel::Full => name.to_string(),
        ShortLabel::LastWord => name
            .split_whitespace()
            .last()
            .unwrap_or(name)
            .to_string(),
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // NaN and infinities are shown as-is so they stay visible in reports.
    if !n.is_finite() {
        return format!("{}", n);
    }
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    // First, format to a plain fixed-decimal string like `1234567.89`.
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // Use `num-format` to insert commas into the integer portion.
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_optional(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals)).unwrap_or_default()
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
