//! Typed output of a compiled filter.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// One coerced field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// An explicit `null` that the rule allowed through.
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Model(Instance),
    /// Untyped passthrough: user filters, constructors, untemplated arrays.
    Raw(Value),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => s.serialize_unit(),
            Self::String(v) => s.serialize_str(v),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => s.serialize_i64(*n as i64),
            Self::Number(n) => s.serialize_f64(*n),
            Self::Boolean(b) => s.serialize_bool(*b),
            Self::Date(d) => d.serialize(s),
            Self::Array(items) => items.serialize(s),
            Self::Model(m) => m.serialize(s),
            Self::Raw(v) => v.serialize(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { Self::String(s.to_owned()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { Self::String(s) }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self { Self::Number(n) }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self { Self::Boolean(b) }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self { Self::Raw(v) }
}

/// A populated model: only the fields that were declared and passed.
///
/// Field order follows declaration order (input order for rule-less models).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Instance {
    model: String,
    fields: Vec<(String, FieldValue)>,
}

impl Instance {
    pub(crate) fn new(model: &str) -> Self {
        Self { model: model.to_owned(), fields: Vec::new() }
    }

    /// Builds an instance by hand. Used by custom model filters.
    pub fn with_fields<I, K>(model: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        let mut instance = Self::new(model);
        for (k, v) in fields {
            instance.set(k, v);
        }
        instance
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.get(name)? {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn array(&self, name: &str) -> Option<&[FieldValue]> {
        match self.get(name)? {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn nested(&self, name: &str) -> Option<&Instance> {
        match self.get(name)? {
            FieldValue::Model(m) => Some(m),
            _ => None,
        }
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
