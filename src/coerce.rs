//! Scalar coercions and bound comparisons.
//!
//! Inputs arrive as loosely typed JSON or form values. These functions give
//! each declared scalar type one fixed, lenient interpretation.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::rule::Bound;
use crate::value::FieldValue;

/// Whole numbers print without a fractional part: `3`, not `3.0`.
pub(crate) fn number_to_string(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        n.to_string()
    }
}

pub(crate) fn to_string(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => number_to_string(f),
            None => n.to_string(),
        },
        Value::Array(items) => items.iter().map(to_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => raw.to_string(),
    }
}

/// `None` means "not a number". Empty strings are not numbers.
pub(crate) fn to_number(raw: &Value) -> Option<f64> {
    let n = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_number(s)?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Strings: `"0"`, `""` and `"false"` (any case) are false, anything else
/// true. Other values follow ordinary truthiness.
pub(crate) fn to_boolean(raw: &Value) -> bool {
    match raw {
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS[.fff]` (read as UTC), `YYYY-MM-DD`, or
/// epoch milliseconds.
pub(crate) fn to_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => parse_date(s.trim()),
        Value::Number(n) => {
            let ms = n.as_f64()?;
            if !ms.is_finite() {
                return None;
            }
            DateTime::from_timestamp_millis(ms as i64)
        }
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(d.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

pub(crate) fn iso(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Limits ────────────────────────────────────────────────────────────────────

/// A `min`/`max` bound converted, at compile time, to the type of the field
/// it limits.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Limit {
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl Limit {
    /// String fields: text bounds compare lexicographically, date bounds
    /// against their ISO form, number bounds numerically.
    pub(crate) fn for_text(bound: &Bound) -> Self {
        match bound {
            Bound::Number(n) => Self::Number(*n),
            Bound::Text(t) => Self::Text(t.clone()),
            Bound::Date(d) => Self::Text(iso(d)),
        }
    }

    /// `None` when the bound is not a number.
    pub(crate) fn for_number(bound: &Bound) -> Option<Self> {
        let n = match bound {
            Bound::Number(n) => *n,
            Bound::Text(t) => parse_number(t)?,
            Bound::Date(d) => d.timestamp_millis() as f64,
        };
        n.is_finite().then_some(Self::Number(n))
    }

    /// `None` when the bound is not a date.
    pub(crate) fn for_date(bound: &Bound) -> Option<Self> {
        let d = match bound {
            Bound::Date(d) => *d,
            Bound::Text(t) => parse_date(t.trim())?,
            Bound::Number(n) if n.is_finite() => DateTime::from_timestamp_millis(*n as i64)?,
            Bound::Number(_) => return None,
        };
        Some(Self::Date(d))
    }

    /// `None` means the value cannot be ordered against this limit, e.g. a
    /// non-numeric string under a number bound.
    pub(crate) fn compare(&self, value: &FieldValue) -> Option<Ordering> {
        match (value, self) {
            (FieldValue::String(s), Self::Text(t)) => Some(s.as_str().cmp(t.as_str())),
            (FieldValue::String(s), Self::Number(n)) => parse_number(s)?.partial_cmp(n),
            (FieldValue::Number(v), Self::Number(n)) => v.partial_cmp(n),
            (FieldValue::Date(v), Self::Date(d)) => Some(v.cmp(d)),
            _ => None,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&number_to_string(*n)),
            Self::Text(t) => f.write_str(t),
            Self::Date(d) => f.write_str(&iso(d)),
        }
    }
}
