//! Best-effort typed view over upstream JSON.
//!
//! Upstream records have no fixed schema. Instead of poking at
//! `serde_json::Value` everywhere, callers look at a `RawValue`, which names the
//! shapes we know how to use and maps everything else onto `Missing`/`Null`.

use serde_json::{Map, Number, Value};

/// A borrowed view of one JSON node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    /// The path did not resolve
    Missing,
    /// Explicit JSON null
    Null,
    Bool(bool),
    Number(&'a Number),
    Text(&'a str),
    List(&'a [Value]),
    Map(&'a Map<String, Value>),
}

impl<'a> From<&'a Value> for RawValue<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => RawValue::Number(n),
            Value::String(s) => RawValue::Text(s),
            Value::Array(items) => RawValue::List(items),
            Value::Object(map) => RawValue::Map(map),
        }
    }
}

impl<'a> From<Option<&'a Value>> for RawValue<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        value.map(RawValue::from).unwrap_or(RawValue::Missing)
    }
}

impl<'a> RawValue<'a> {
    /// Neither missing nor null
    pub fn is_present(&self) -> bool {
        !matches!(self, RawValue::Missing | RawValue::Null)
    }

    /// Child by key. Anything other than a map yields `Missing`.
    pub fn get(&self, key: &str) -> RawValue<'a> {
        match *self {
            RawValue::Map(map) => map.get(key).into(),
            _ => RawValue::Missing,
        }
    }

    pub fn as_map(&self) -> Option<&'a Map<String, Value>> {
        match *self {
            RawValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Trimmed, non-empty text
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            RawValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// Integer from a JSON number or a numeric string.
    ///
    /// Floats count only when they have no fractional part. Booleans never count.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            RawValue::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            RawValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Stable identifier: non-empty text or an integer number
    pub fn as_identifier(&self) -> Option<String> {
        match *self {
            RawValue::Text(_) => self.as_text().map(str::to_string),
            RawValue::Number(n) => n
                .as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string())),
            _ => None,
        }
    }
}
