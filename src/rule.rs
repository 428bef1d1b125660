//! Per-field rule data.
//!
//! A [`FilterRule`] is plain storage. It does nothing until a
//! [`ModelBuilder`](crate::ModelBuilder) hands it to the compiler together
//! with the field's [`FieldType`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;

use crate::error::BoxError;
use crate::registry::ModelId;
use crate::value::FieldValue;

type UserFn = dyn Fn(&Value) -> Result<FieldValue, BoxError> + Send + Sync;

/// A user transform that replaces every built-in check of one field.
///
/// Must be synchronous and free of side effects: it runs on every request.
#[derive(Clone)]
pub struct FieldFilter(Arc<UserFn>);

impl FieldFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<FieldValue, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) fn apply(&self, raw: &Value) -> Result<FieldValue, BoxError> {
        (self.0)(raw)
    }
}

impl fmt::Debug for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldFilter(..)")
    }
}

/// Escape hatch for types kite does not know: build the value from the raw
/// input yourself (identifiers, money amounts, third-party date types...).
#[derive(Clone)]
pub struct Constructor {
    name: Arc<str>,
    f: Arc<UserFn>,
}

impl Constructor {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&Value) -> Result<FieldValue, BoxError> + Send + Sync + 'static,
    {
        Self { name: Arc::from(name), f: Arc::new(f) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn construct(&self, raw: &Value) -> Result<FieldValue, BoxError> {
        (self.f)(raw)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constructor({})", self.name)
    }
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// The declared static type of a field. Picks the coercion branch.
#[derive(Clone, Debug)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    /// A registered model, validated recursively.
    Model(ModelId),
    Construct(Constructor),
}

/// Leaf type of an array field.
#[derive(Clone, Debug)]
pub enum ElementType {
    String,
    Number,
    Boolean,
    Date,
    Model(ModelId),
    Construct(Constructor),
}

impl ElementType {
    /// Resolves a built-in leaf name as written in a template.
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "String"  => Some(Self::String),
            "Number"  => Some(Self::Number),
            "Boolean" => Some(Self::Boolean),
            "Date"    => Some(Self::Date),
            _         => None,
        }
    }
}

/// Element typing for array fields, e.g. `Array<Array<Number>>`.
#[derive(Clone, Debug, Default)]
pub struct ArrayType {
    pub template: Option<String>,
    pub element: Option<ElementType>,
}

impl ArrayType {
    pub fn template(template: impl Into<String>) -> Self {
        Self { template: Some(template.into()), element: None }
    }

    /// One level deep, every item coerced as `element`.
    pub fn of(element: ElementType) -> Self {
        Self { template: None, element: Some(element) }
    }

    pub fn element(mut self, element: ElementType) -> Self {
        self.element = Some(element);
        self
    }
}

/// A `min`/`max` limit. How it compares depends on the field's type.
#[derive(Clone, Debug, PartialEq)]
pub enum Bound {
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&crate::coerce::number_to_string(*n)),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl From<f64> for Bound {
    fn from(n: f64) -> Self { Self::Number(n) }
}

impl From<i64> for Bound {
    fn from(n: i64) -> Self { Self::Number(n as f64) }
}

impl From<i32> for Bound {
    fn from(n: i32) -> Self { Self::Number(f64::from(n)) }
}

impl From<&str> for Bound {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Bound {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<DateTime<Utc>> for Bound {
    fn from(d: DateTime<Utc>) -> Self { Self::Date(d) }
}

// ── FilterRule ────────────────────────────────────────────────────────────────

/// The validation rule set of one field.
///
/// Every setting is optional so a model-wide default rule can sit underneath
/// field rules: see [`FilterRule::over`].
///
/// ```rust
/// use kite::FilterRule;
///
/// let name = FilterRule::new().required().min_len(3).max_len(40);
/// let age = FilterRule::new().min(0).max(150);
/// # let _ = (name, age);
/// ```
#[derive(Clone, Debug, Default)]
pub struct FilterRule {
    pub(crate) required: Option<bool>,
    pub(crate) allow_empty: Option<bool>,
    pub(crate) values: Option<Vec<Value>>,
    pub(crate) min: Option<Bound>,
    pub(crate) max: Option<Bound>,
    pub(crate) min_len: Option<usize>,
    pub(crate) max_len: Option<usize>,
    pub(crate) len: Option<usize>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) filter: Option<FieldFilter>,
    pub(crate) group: Option<Vec<String>>,
    pub(crate) no_trim: Option<bool>,
    pub(crate) array_type: Option<ArrayType>,
}

impl FilterRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    /// Let `""`, whitespace, `null` and `[]` through.
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = Some(true);
        self
    }

    /// Restrict the value to an enumeration. Disables `pattern`, `min` and
    /// `max` for strings and numbers.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn min(mut self, bound: impl Into<Bound>) -> Self {
        self.min = Some(bound.into());
        self
    }

    pub fn max(mut self, bound: impl Into<Bound>) -> Self {
        self.max = Some(bound.into());
        self
    }

    pub fn min_len(mut self, n: usize) -> Self {
        self.min_len = Some(n);
        self
    }

    pub fn max_len(mut self, n: usize) -> Self {
        self.max_len = Some(n);
        self
    }

    /// Exact length. Wins over `min_len`/`max_len`.
    pub fn len(mut self, n: usize) -> Self {
        self.len = Some(n);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Replace all built-in checks of this field with `filter`.
    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// At least one of this field and `other` must be present.
    pub fn group(mut self, other: &str) -> Self {
        self.group = Some(vec![other.to_owned()]);
        self
    }

    /// At least one of this field and every name in `others` must be present.
    pub fn group_of<I, S>(mut self, others: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group = Some(others.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_trim(mut self) -> Self {
        self.no_trim = Some(true);
        self
    }

    pub fn array_type(mut self, array_type: ArrayType) -> Self {
        self.array_type = Some(array_type);
        self
    }

    /// Shallow merge: every setting this rule leaves unset is taken from
    /// `defaults`.
    pub fn over(self, defaults: &FilterRule) -> FilterRule {
        FilterRule {
            required: self.required.or(defaults.required),
            allow_empty: self.allow_empty.or(defaults.allow_empty),
            values: self.values.or_else(|| defaults.values.clone()),
            min: self.min.or_else(|| defaults.min.clone()),
            max: self.max.or_else(|| defaults.max.clone()),
            min_len: self.min_len.or(defaults.min_len),
            max_len: self.max_len.or(defaults.max_len),
            len: self.len.or(defaults.len),
            pattern: self.pattern.or_else(|| defaults.pattern.clone()),
            filter: self.filter.or_else(|| defaults.filter.clone()),
            group: self.group.or_else(|| defaults.group.clone()),
            no_trim: self.no_trim.or(defaults.no_trim),
            array_type: self.array_type.or_else(|| defaults.array_type.clone()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn allows_empty(&self) -> bool {
        self.allow_empty.unwrap_or(false)
    }

    pub(crate) fn trims(&self) -> bool {
        !self.no_trim.unwrap_or(false)
    }
}
