//! Lenient value coercion used at every ingress boundary.
//!
//! # Responsibility
//! - Turn loosely typed JSON values into the scalar shapes `Item` needs.
//!
//! # Invariants
//! - Every function here is total: malformed input yields a default, never
//!   an error.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Coerces a value into a finite number.
///
/// Numbers pass through, numeric strings are parsed after trimming, booleans
/// map to `0/1`, and an empty string or `null` maps to `0`. Anything else is
/// `None`.
pub fn to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => return None,
    };
    number.is_finite().then_some(number)
}

/// Coerces a quantity: truncate toward zero, floor at 1.
///
/// Non-numeric input falls back to `1`.
pub fn to_qty(value: Option<&Value>) -> u32 {
    let Some(number) = value.and_then(to_number) else {
        return 1;
    };
    let truncated = number.trunc();
    if truncated < 1.0 {
        1
    } else if truncated >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        truncated as u32
    }
}

/// Coerces a cost: finite and floored at `0`.
///
/// Non-numeric input falls back to `0`.
pub fn to_cost(value: Option<&Value>) -> f64 {
    match value.and_then(to_number) {
        Some(number) if number > 0.0 => number,
        _ => 0.0,
    }
}

/// JavaScript-style truthiness.
pub fn to_flag(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Coerces a free-text field. Scalars are stringified, `null` is empty.
pub fn to_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

/// Parses a timestamp from RFC 3339 text or epoch milliseconds.
pub fn to_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(number) => DateTime::from_timestamp_millis(number.as_i64()?),
        _ => None,
    }
}

/// Truncates a timestamp to millisecond precision.
///
/// Storage keeps epoch milliseconds, so every timestamp entering an `Item`
/// is truncated first to keep in-memory and persisted values identical.
pub fn to_millis_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or(value)
}
