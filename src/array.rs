//! `Array<...>` templates.
//!
//! A template fixes how deep an array field nests and what its leaves are:
//! `Array<Array<Number>>` is a list of lists of numbers. Any level that
//! receives a single value instead of a list wraps it first.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::coerce;
use crate::compiler::ModelFilter;
use crate::error::FilterError;
use crate::rule::Constructor;
use crate::validation::{ErrorCode, ValidationError};
use crate::value::FieldValue;

/// Splits a template into its nesting depth and leaf name.
///
/// `"Array<Array<Number>>"` → `(2, "Number")`. Returns `None` for anything
/// that is not one or more well-formed `Array<...>` layers around a name.
pub(crate) fn parse_template(template: &str) -> Option<(usize, &str)> {
    let mut rest = template.trim();
    let mut depth = 0;
    while let Some(inner) = rest.strip_prefix("Array<").and_then(|r| r.strip_suffix('>')) {
        depth += 1;
        rest = inner.trim();
    }
    let is_name = !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric() || c == '_');
    (depth > 0 && is_name).then_some((depth, rest))
}

/// Coercion applied to the innermost items.
#[derive(Clone, Debug)]
pub(crate) enum Leaf {
    Raw,
    String,
    Number,
    Boolean,
    Date,
    Model(Arc<ModelFilter>),
    Construct(Constructor),
}

/// A compiled array layout.
#[derive(Clone, Debug)]
pub(crate) struct ArrayShape {
    pub(crate) depth: usize,
    pub(crate) leaf: Leaf,
}

impl ArrayShape {
    pub(crate) fn apply(
        &self,
        field: &str,
        items: &[Value],
    ) -> Result<Vec<FieldValue>, FilterError> {
        self.level(field, items, self.depth.max(1))
    }

    fn level(
        &self,
        field: &str,
        items: &[Value],
        depth: usize,
    ) -> Result<Vec<FieldValue>, FilterError> {
        items
            .iter()
            .map(|item| {
                if depth > 1 {
                    Ok(FieldValue::Array(self.level(field, as_items(item), depth - 1)?))
                } else {
                    self.leaf(field, item)
                }
            })
            .collect()
    }

    fn leaf(&self, field: &str, item: &Value) -> Result<FieldValue, FilterError> {
        Ok(match &self.leaf {
            Leaf::Raw => FieldValue::Raw(item.clone()),
            Leaf::String => FieldValue::String(coerce::to_string(item)),
            Leaf::Number => match coerce::to_number(item) {
                Some(n) => FieldValue::Number(n),
                None => return Err(ValidationError::field(ErrorCode::NotNumber, field).into()),
            },
            Leaf::Boolean => FieldValue::Boolean(coerce::to_boolean(item)),
            Leaf::Date => match coerce::to_date(item) {
                Some(d) => FieldValue::Date(d),
                None => return Err(ValidationError::field(ErrorCode::NotDate, field).into()),
            },
            Leaf::Model(filter) => FieldValue::Model(filter.apply(as_object(item))?),
            Leaf::Construct(ctor) => ctor.construct(item).map_err(FilterError::Custom)?,
        })
    }
}

/// A list as-is; any other value as a one-item list.
pub(crate) fn as_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// Nested models read keys from objects only; anything else has no keys.
pub(crate) fn as_object(value: &Value) -> &Map<String, Value> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    match value {
        Value::Object(map) => map,
        _ => EMPTY.get_or_init(Map::new),
    }
}
