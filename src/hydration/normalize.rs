//! Identifier normalization.
//!
//! Keys are compared after normalization so that datasets maintained by
//! different people still join: `"007"`, `"7"` and `7` are the same key,
//! while `"user_007"` only matches another `"user_007"`.
//!
//! Rule: trim; if any alphabetic character remains the text is the key
//! verbatim; otherwise strip every non-digit and read the digits as an
//! integer (leading zeros dropped). Null and empty input normalize to `""`,
//! which never matches anything.

use serde_json::{Number, Value};

/// Normalize a cell value into a join key.
#[must_use]
pub fn normalize_id(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => normalize_text(text),
        Value::Number(number) => normalize_text(&number_text(number)),
        Value::Bool(flag) => flag.to_string(),
        // Nested values are never keys
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Normalize raw key text; see the module docs for the rule.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().any(char::is_alphabetic) {
        return trimmed.to_string();
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return String::new();
    }

    match digits.trim_start_matches('0') {
        "" => "0".to_string(),
        significant => significant.to_string(),
    }
}

/// Shortest textual form of a number; integral floats print without a fraction.
#[must_use]
pub(crate) fn number_text(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        int.to_string()
    } else if let Some(uint) = number.as_u64() {
        uint.to_string()
    } else {
        number.as_f64().map(|float| float.to_string()).unwrap_or_default()
    }
}

/// Text of a scalar cell, or `None` for null and nested values.
#[must_use]
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number_text(number)),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
