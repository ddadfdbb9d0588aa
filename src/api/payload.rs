//! Typed access to vendor field maps.
//!
//! The vendor reports most numbers as strings, sometimes as JSON numbers, and drops fields
//! freely depending on device type and time of day. Every accessor here returns `None` for a
//! missing field and for a value that does not convert, so a single bad field never poisons the
//! rest of a record.

use crate::model::RawSource;
use serde_json::Value;

/// Finite numeric value of `key`, parsing numeric strings.
pub fn number(source: &RawSource, key: &str) -> Option<f64> {
    match source.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Like [`number`], but a reported zero counts as "not reported".
pub fn nonzero(source: &RawSource, key: &str) -> Option<f64> {
    number(source, key).filter(|v| *v != 0.0)
}

/// Integral code such as a direction or status indicator.
pub fn code(source: &RawSource, key: &str) -> Option<i64> {
    number(source, key)
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i64)
}

pub fn text<'a>(source: &'a RawSource, key: &str) -> Option<&'a str> {
    source.get(key).and_then(Value::as_str)
}

/// Vendor boolean: `"1"`/`1`/`true` or `"0"`/`0`/`false`.
pub fn flag(source: &RawSource, key: &str) -> Option<bool> {
    match source.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().and_then(bit),
        Value::String(s) => s.trim().parse::<i64>().ok().and_then(bit),
        _ => None,
    }
}

fn bit(v: i64) -> Option<bool> {
    match v {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// Converts a JSON value into a field map; anything but an object is treated as empty.
pub fn object(value: Value) -> RawSource {
    match value {
        Value::Object(map) => map,
        _ => RawSource::new(),
    }
}
