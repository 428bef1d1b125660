//! The filter compiler.
//!
//! # Compile once, run many
//!
//! A model's fields and rules are turned, once, into a flat program: the
//! merged group preconditions followed by one [`FieldProgram`] per field in
//! declaration order. Each field program is a presence test, one coercion
//! and a short list of checks, all decided ahead of time:
//!
//! ```text
//! ModelFilter
//!   ├─ GroupCheck [phone, email]           ← runs first, against raw input
//!   ├─ FieldProgram name   String  [MinLength(3)]
//!   ├─ FieldProgram age    Number  [Min(0)]
//!   └─ FieldProgram tags   Array(depth 1, String)
//! ```
//!
//! Regexes, bounds and nested filters are all resolved here, so running a
//! filter does no parsing or lookups. The first failing check ends the run.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::array::{self, ArrayShape, Leaf};
use crate::coerce::{self, Limit};
use crate::error::{DefinitionError, FilterError};
use crate::group::GroupCheck;
use crate::registry::{FieldSpec, Registry};
use crate::rule::{Bound, Constructor, ElementType, FieldFilter, FieldType};
use crate::validation::{ErrorCode, ValidationError};
use crate::value::{FieldValue, Instance};

type ModelFn = dyn Fn(&Map<String, Value>) -> Result<Instance, FilterError> + Send + Sync;

/// A hand-written filter for a whole model. When a model carries one, its
/// declared field rules are ignored.
#[derive(Clone)]
pub struct CustomFilter(Arc<ModelFn>);

impl CustomFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Instance, FilterError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomFilter(..)")
    }
}

// ── Program ───────────────────────────────────────────────────────────────────

/// The compiled filter of one model.
#[derive(Debug)]
pub struct ModelFilter {
    name: String,
    body: Body,
}

#[derive(Debug)]
enum Body {
    Compiled { groups: Vec<GroupCheck>, fields: Vec<FieldProgram> },
    /// No rules at all: copy every input key.
    Identity,
    Custom(CustomFilter),
}

impl ModelFilter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates `raw` and builds a fresh instance. `raw` is only read.
    pub fn apply(&self, raw: &Map<String, Value>) -> Result<Instance, FilterError> {
        match &self.body {
            Body::Custom(f) => (f.0)(raw),
            Body::Identity => Ok(Instance::with_fields(
                &self.name,
                raw.iter().map(|(k, v)| (k.clone(), FieldValue::Raw(v.clone()))),
            )),
            Body::Compiled { groups, fields } => {
                for group in groups {
                    group.check(raw)?;
                }
                let mut out = Instance::new(&self.name);
                for field in fields {
                    field.run(raw, &mut out)?;
                }
                Ok(out)
            }
        }
    }
}

#[derive(Debug)]
struct FieldProgram {
    name: String,
    required: bool,
    allow_empty: bool,
    coercion: Coercion,
    checks: Vec<Check>,
}

impl FieldProgram {
    fn run(&self, raw: &Map<String, Value>, out: &mut Instance) -> Result<(), FilterError> {
        let value = match raw.get(&self.name) {
            None if self.required => return Err(self.fail(ErrorCode::Required).into()),
            None => return Ok(()),
            Some(Value::Null) if !self.allow_empty => {
                if self.required {
                    return Err(self.fail(ErrorCode::Required).into());
                }
                return Ok(());
            }
            Some(v) => v,
        };

        if self.allow_empty && self.coercion.stores_as_null(value) {
            out.set(self.name.as_str(), FieldValue::Null);
            return Ok(());
        }

        let coerced = self.coercion.apply(&self.name, value)?;
        for check in &self.checks {
            check.run(&self.name, &coerced)?;
        }
        out.set(self.name.as_str(), coerced);
        Ok(())
    }

    fn fail(&self, code: ErrorCode) -> ValidationError {
        ValidationError::field(code, &self.name)
    }
}

#[derive(Debug)]
enum Coercion {
    Custom(FieldFilter),
    String { trim: bool, reject_empty: bool },
    Number,
    Boolean,
    Date,
    Array { allow_empty: bool, shape: ArrayShape },
    Model(Arc<ModelFilter>),
    Construct(Constructor),
}

impl Coercion {
    /// An allowed empty value skips coercion and is stored as null. Strings,
    /// booleans and arrays read empties themselves; user code sees them raw.
    fn stores_as_null(&self, value: &Value) -> bool {
        match self {
            Self::Custom(_) | Self::Construct(_) => false,
            _ if value.is_null() => true,
            Self::Number | Self::Date | Self::Model(_) => {
                value.as_str().is_some_and(|s| s.trim().is_empty())
            }
            _ => false,
        }
    }

    fn apply(&self, field: &str, raw: &Value) -> Result<FieldValue, FilterError> {
        let fail = |code| FilterError::from(ValidationError::field(code, field));
        Ok(match self {
            Self::Custom(f) => f.apply(raw).map_err(FilterError::Custom)?,
            Self::String { trim, reject_empty } => {
                let mut s = coerce::to_string(raw);
                if *trim {
                    s = s.trim().to_owned();
                }
                if *reject_empty && s.is_empty() {
                    return Err(fail(ErrorCode::Empty));
                }
                FieldValue::String(s)
            }
            Self::Number => {
                let n = coerce::to_number(raw).ok_or_else(|| fail(ErrorCode::NotNumber))?;
                FieldValue::Number(n)
            }
            Self::Boolean => FieldValue::Boolean(coerce::to_boolean(raw)),
            Self::Date => {
                let d = coerce::to_date(raw).ok_or_else(|| fail(ErrorCode::NotDate))?;
                FieldValue::Date(d)
            }
            Self::Array { allow_empty, shape } => {
                let items = array::as_items(raw);
                if !allow_empty && items.is_empty() {
                    return Err(fail(ErrorCode::EmptyArray));
                }
                FieldValue::Array(shape.apply(field, items)?)
            }
            Self::Model(filter) => FieldValue::Model(filter.apply(array::as_object(raw))?),
            Self::Construct(ctor) => ctor.construct(raw).map_err(FilterError::Custom)?,
        })
    }
}

#[derive(Debug)]
enum Check {
    Enum(Vec<Value>),
    Pattern(Regex),
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    Min(Limit),
    Max(Limit),
}

impl Check {
    fn run(&self, field: &str, value: &FieldValue) -> Result<(), ValidationError> {
        use std::cmp::Ordering::{Greater, Less};

        let chars = || match value {
            FieldValue::String(s) => s.chars().count(),
            _ => 0,
        };

        match self {
            Self::Enum(values) => {
                let listed = match value {
                    FieldValue::String(s) => values.iter().any(|v| coerce::to_string(v) == *s),
                    FieldValue::Number(n) => {
                        values.iter().any(|v| coerce::to_number(v) == Some(*n))
                    }
                    _ => true,
                };
                if !listed {
                    let list: Vec<String> = values.iter().map(coerce::to_string).collect();
                    let list = list.join(",");
                    return Err(ValidationError::with_limit(ErrorCode::Enum, field, list));
                }
            }
            Self::Pattern(re) => {
                if let FieldValue::String(s) = value {
                    if !re.is_match(s) {
                        let pattern = re.as_str();
                        return Err(ValidationError::with_limit(ErrorCode::Pattern, field, pattern));
                    }
                }
            }
            Self::Length(n) if chars() != *n => {
                return Err(ValidationError::with_limit(ErrorCode::Length, field, n));
            }
            Self::MinLength(n) if chars() < *n => {
                return Err(ValidationError::with_limit(ErrorCode::TooShort, field, n));
            }
            Self::MaxLength(n) if chars() > *n => {
                return Err(ValidationError::with_limit(ErrorCode::TooLong, field, n));
            }
            Self::Min(limit) if limit.compare(value) == Some(Less) => {
                return Err(ValidationError::with_limit(ErrorCode::Min, field, limit));
            }
            Self::Max(limit) if limit.compare(value) == Some(Greater) => {
                return Err(ValidationError::with_limit(ErrorCode::Max, field, limit));
            }
            _ => {}
        }
        Ok(())
    }
}

// ── Compilation ───────────────────────────────────────────────────────────────

pub(crate) fn compile(
    name: &str,
    fields: &[FieldSpec],
    groups: &[GroupCheck],
    custom: Option<&CustomFilter>,
    registry: &Registry,
) -> Result<ModelFilter, DefinitionError> {
    let body = match custom {
        Some(f) => Body::Custom(f.clone()),
        None if fields.is_empty() => Body::Identity,
        None => Body::Compiled {
            groups: groups.to_vec(),
            fields: fields
                .iter()
                .map(|spec| compile_field(name, spec, registry))
                .collect::<Result<_, _>>()?,
        },
    };
    debug!(
        model = name,
        fields = fields.len(),
        groups = groups.len(),
        "compiled model filter"
    );
    Ok(ModelFilter { name: name.to_owned(), body })
}

fn compile_field(
    model: &str,
    spec: &FieldSpec,
    registry: &Registry,
) -> Result<FieldProgram, DefinitionError> {
    let rule = &spec.rule;
    let required = rule.is_required();
    let allow_empty = rule.allows_empty();

    let (coercion, checks) = match (&rule.filter, &spec.ty) {
        (Some(f), _) => (Coercion::Custom(f.clone()), Vec::new()),
        (None, FieldType::String) => (
            Coercion::String { trim: rule.trims(), reject_empty: required && !allow_empty },
            string_checks(model, spec)?,
        ),
        (None, FieldType::Number) => (Coercion::Number, number_checks(model, spec)?),
        (None, FieldType::Boolean) => (Coercion::Boolean, Vec::new()),
        (None, FieldType::Date) => (Coercion::Date, bound_checks(model, spec)?),
        (None, FieldType::Array) => {
            let shape = compile_shape(model, spec, registry)?;
            (Coercion::Array { allow_empty, shape }, Vec::new())
        }
        (None, FieldType::Model(id)) => (Coercion::Model(registry.filter(*id)?), Vec::new()),
        (None, FieldType::Construct(ctor)) => (Coercion::Construct(ctor.clone()), Vec::new()),
    };

    Ok(FieldProgram { name: spec.name.clone(), required, allow_empty, coercion, checks })
}

/// enum > pattern > exact length > min/max length; then bounds unless an
/// enum is set.
fn string_checks(model: &str, spec: &FieldSpec) -> Result<Vec<Check>, DefinitionError> {
    let rule = &spec.rule;
    if let Some(values) = &rule.values {
        return Ok(vec![Check::Enum(values.clone())]);
    }
    let mut checks = Vec::new();
    if let Some(re) = &rule.pattern {
        checks.push(Check::Pattern(re.clone()));
    } else if let Some(n) = rule.len {
        checks.push(Check::Length(n));
    } else {
        checks.extend(rule.min_len.map(Check::MinLength));
        checks.extend(rule.max_len.map(Check::MaxLength));
    }
    checks.extend(bound_checks(model, spec)?);
    Ok(checks)
}

fn number_checks(model: &str, spec: &FieldSpec) -> Result<Vec<Check>, DefinitionError> {
    match &spec.rule.values {
        Some(values) => Ok(vec![Check::Enum(values.clone())]),
        None => bound_checks(model, spec),
    }
}

/// Rejects `min`/`max` bounds that cannot be read as the field's type. Run at
/// registration so the error surfaces before any filter is compiled.
pub(crate) fn check_bounds(model: &str, spec: &FieldSpec) -> Result<(), DefinitionError> {
    match (&spec.rule.filter, &spec.ty) {
        (None, FieldType::Number | FieldType::Date) => bound_checks(model, spec).map(drop),
        _ => Ok(()),
    }
}

/// Converts `min`/`max` to the field's type.
fn bound_checks(model: &str, spec: &FieldSpec) -> Result<Vec<Check>, DefinitionError> {
    let limit = |bound: &Bound| {
        let (limit, ty) = match spec.ty {
            FieldType::Number => (Limit::for_number(bound), "number"),
            FieldType::Date => (Limit::for_date(bound), "date"),
            _ => (Some(Limit::for_text(bound)), "string"),
        };
        limit.ok_or_else(|| DefinitionError::Bound {
            model: model.to_owned(),
            field: spec.name.clone(),
            bound: bound.to_string(),
            ty,
        })
    };
    let mut checks = Vec::new();
    if let Some(min) = &spec.rule.min {
        checks.push(Check::Min(limit(min)?));
    }
    if let Some(max) = &spec.rule.max {
        checks.push(Check::Max(limit(max)?));
    }
    Ok(checks)
}

/// Element typing of an array field, before nested filters are looked up.
pub(crate) enum LeafPlan<'a> {
    Raw,
    Element(ElementType),
    Given(&'a ElementType),
}

/// Resolves an array field's depth and leaf. Also used at registration to
/// reject bad templates early.
pub(crate) fn plan_shape<'a>(
    model: &str,
    spec: &'a FieldSpec,
) -> Result<(usize, LeafPlan<'a>), DefinitionError> {
    let Some(array_type) = &spec.rule.array_type else {
        return Ok((1, LeafPlan::Raw));
    };
    let (depth, name) = match &array_type.template {
        Some(t) => {
            let parsed = array::parse_template(t);
            let (depth, leaf) = parsed.ok_or_else(|| DefinitionError::ArrayTemplate {
                model: model.to_owned(),
                field: spec.name.clone(),
                template: t.clone(),
            })?;
            (depth, Some(leaf))
        }
        None => (1, None),
    };
    let leaf = match (&array_type.element, name) {
        (Some(element), _) => LeafPlan::Given(element),
        (None, Some(name)) => LeafPlan::Element(ElementType::from_name(name).ok_or_else(|| {
            DefinitionError::UnknownElement {
                model: model.to_owned(),
                field: spec.name.clone(),
                leaf: name.to_owned(),
            }
        })?),
        (None, None) => LeafPlan::Raw,
    };
    Ok((depth, leaf))
}

fn compile_shape(
    model: &str,
    spec: &FieldSpec,
    registry: &Registry,
) -> Result<ArrayShape, DefinitionError> {
    let (depth, plan) = plan_shape(model, spec)?;
    let element = match plan {
        LeafPlan::Raw => return Ok(ArrayShape { depth, leaf: Leaf::Raw }),
        LeafPlan::Element(e) => e,
        LeafPlan::Given(e) => e.clone(),
    };
    let leaf = match element {
        ElementType::String => Leaf::String,
        ElementType::Number => Leaf::Number,
        ElementType::Boolean => Leaf::Boolean,
        ElementType::Date => Leaf::Date,
        ElementType::Model(id) => Leaf::Model(registry.filter(id)?),
        ElementType::Construct(ctor) => Leaf::Construct(ctor),
    };
    Ok(ArrayShape { depth, leaf })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::ModelBuilder;
    use crate::rule::{ArrayType, FilterRule};

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            other => panic!("not an object: {other}"),
        }
    }

    fn model(builder: ModelBuilder) -> (Registry, Arc<ModelFilter>) {
        let mut registry = Registry::new();
        let id = registry.register(builder).unwrap();
        let filter = registry.filter(id).unwrap();
        (registry, filter)
    }

    /// A model `M` with one field.
    fn single(name: &str, ty: FieldType, rule: FilterRule) -> Arc<ModelFilter> {
        model(ModelBuilder::new("M").field(name, ty, rule)).1
    }

    fn reject(filter: &ModelFilter, raw: Value) -> ValidationError {
        match filter.apply(&object(raw)) {
            Err(FilterError::Validation(e)) => e,
            Err(FilterError::Custom(e)) => panic!("unexpected custom error: {e}"),
            Ok(v) => panic!("accepted: {v:?}"),
        }
    }

    fn extra(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn missing_required_field() {
        let (_, f) = model(
            ModelBuilder::new("M")
                .field("id", FieldType::Number, FilterRule::new().required())
                .field("age", FieldType::Number, FilterRule::new()),
        );
        for raw in [json!({}), json!({"age": "x"}), json!({"id": null})] {
            let err = reject(&f, raw);
            assert_eq!(err.code, ErrorCode::Required);
            assert_eq!(err.extra, extra(&["id"]));
        }
    }

    #[test]
    fn optional_fields_are_skipped_when_absent_or_null() {
        let f = single("age", FieldType::Number, FilterRule::new());
        assert!(f.apply(&object(json!({}))).unwrap().is_empty());
        assert!(f.apply(&object(json!({"age": null}))).unwrap().is_empty());
    }

    #[test]
    fn allowed_null_is_kept() {
        let f = single("note", FieldType::String, FilterRule::new().required().allow_empty());
        let out = f.apply(&object(json!({"note": null}))).unwrap();
        assert_eq!(out.get("note"), Some(&FieldValue::Null));
    }

    #[test]
    fn allow_empty_accepts_blank_strings() {
        let f = single("note", FieldType::String, FilterRule::new().required().allow_empty());
        for raw in ["", "   "] {
            let out = f.apply(&object(json!({ "note": raw }))).unwrap();
            assert_eq!(out.str("note"), Some(""), "input {raw:?}");
        }
    }

    #[test]
    fn allow_empty_stores_blank_numbers_and_dates_as_null() {
        let rule = FilterRule::new().required().allow_empty();
        let n = single("n", FieldType::Number, rule.clone().min(1));
        let out = n.apply(&object(json!({"n": ""}))).unwrap();
        assert_eq!(out.get("n"), Some(&FieldValue::Null));

        let d = single("d", FieldType::Date, rule);
        let out = d.apply(&object(json!({"d": " "}))).unwrap();
        assert_eq!(out.get("d"), Some(&FieldValue::Null));

        let strict = single("n", FieldType::Number, FilterRule::new());
        assert_eq!(reject(&strict, json!({"n": ""})).code, ErrorCode::NotNumber);
        let strict = single("d", FieldType::Date, FilterRule::new());
        assert_eq!(reject(&strict, json!({"d": ""})).code, ErrorCode::NotDate);
    }

    #[test]
    fn applying_twice_is_deterministic() {
        let tags = FilterRule::new().array_type(ArrayType::template("Array<String>"));
        let (_, f) = model(
            ModelBuilder::new("M")
                .field("name", FieldType::String, FilterRule::new().required())
                .field("tags", FieldType::Array, tags),
        );
        let raw = object(json!({"name": "  ada ", "tags": "x", "extra": 1}));
        let before = raw.clone();
        let a = f.apply(&raw).unwrap();
        let b = f.apply(&raw).unwrap();
        assert_eq!(a, b);
        assert_eq!(raw, before);
        assert_eq!(a.str("name"), Some("ada"));
        assert!(!a.contains("extra"));
    }

    #[test]
    fn number_coercion() {
        let f = single("n", FieldType::Number, FilterRule::new());
        assert_eq!(f.apply(&object(json!({"n": "42"}))).unwrap().number("n"), Some(42.0));
        let err = reject(&f, json!({"n": "abc"}));
        assert_eq!(err.code, ErrorCode::NotNumber);
        assert_eq!(err.extra, extra(&["n"]));
    }

    #[test]
    fn boolean_coercion() {
        let f = single("b", FieldType::Boolean, FilterRule::new());
        let cases = [("false", false), ("FaLsE", false), ("0", false), ("", false), ("yes", true)];
        for (raw, expected) in cases {
            let out = f.apply(&object(json!({ "b": raw }))).unwrap();
            assert_eq!(out.boolean("b"), Some(expected), "input {raw:?}");
        }
    }

    #[test]
    fn group_requires_one_member() {
        let (_, f) = model(
            ModelBuilder::new("Contact")
                .field("phone", FieldType::String, FilterRule::new().group("email"))
                .field("email", FieldType::String, FilterRule::new()),
        );
        let err = reject(&f, json!({}));
        assert_eq!(err.code, ErrorCode::GroupRequired);
        assert_eq!(err.extra, extra(&["phone, email"]));
        assert!(f.apply(&object(json!({"phone": "x"}))).is_ok());
        assert!(f.apply(&object(json!({"email": "x"}))).is_ok());
    }

    #[test]
    fn group_is_checked_before_fields() {
        let (_, f) = model(
            ModelBuilder::new("M")
                .field("id", FieldType::Number, FilterRule::new().required())
                .field("a", FieldType::String, FilterRule::new().group_of(["b", "c"]))
                .field("b", FieldType::String, FilterRule::new().group("c"))
                .field("c", FieldType::String, FilterRule::new()),
        );
        let err = reject(&f, json!({"id": "nope"}));
        assert_eq!(err.code, ErrorCode::GroupRequired);
        assert_eq!(err.extra, extra(&["a, b, c"]));
    }

    #[test]
    fn array_template_maps_nested_numbers() {
        let rule = FilterRule::new().array_type(ArrayType::template("Array<Array<Number>>"));
        let f = single("grid", FieldType::Array, rule);
        let out = f.apply(&object(json!({"grid": [["1", "2"], ["3"]]}))).unwrap();
        let n = FieldValue::Number;
        assert_eq!(
            out.array("grid").unwrap(),
            [FieldValue::Array(vec![n(1.0), n(2.0)]), FieldValue::Array(vec![n(3.0)])]
        );

        let out = f.apply(&object(json!({"grid": "7"}))).unwrap();
        assert_eq!(out.array("grid").unwrap(), [FieldValue::Array(vec![n(7.0)])]);
    }

    #[test]
    fn empty_arrays() {
        let strict = single("ids", FieldType::Array, FilterRule::new());
        let err = reject(&strict, json!({"ids": []}));
        assert_eq!(err.code, ErrorCode::EmptyArray);

        let lenient = single("ids", FieldType::Array, FilterRule::new().allow_empty());
        let out = lenient.apply(&object(json!({"ids": []}))).unwrap();
        assert_eq!(out.array("ids"), Some(&[][..]));
    }

    #[test]
    fn first_failing_field_wins() {
        let (_, f) = model(
            ModelBuilder::new("User")
                .field("name", FieldType::String, FilterRule::new().required().min_len(3))
                .field("age", FieldType::Number, FilterRule::new().min(0)),
        );
        let err = reject(&f, json!({"name": "Al", "age": -1}));
        assert_eq!(err.code, ErrorCode::TooShort);
        assert_eq!(err.extra, extra(&["name", "3"]));

        let err = reject(&f, json!({"name": "Alan", "age": -1}));
        assert_eq!(err.code, ErrorCode::Min);
        assert_eq!(err.extra, extra(&["age", "0"]));
    }

    #[test]
    fn custom_model_filter_wins_over_rules() {
        let custom = CustomFilter::new(|raw| {
            Ok(Instance::with_fields("M", [("seen", FieldValue::Number(raw.len() as f64))]))
        });
        let (_, f) = model(
            ModelBuilder::new("M")
                .custom_filter(custom)
                .field("x", FieldType::String, FilterRule::new().required())
                .field("y", FieldType::String, FilterRule::new().group("ghost")),
        );
        let out = f.apply(&object(json!({"a": 1, "b": 2}))).unwrap();
        assert_eq!(out.number("seen"), Some(2.0));
        assert!(!out.contains("x"));
    }

    #[test]
    fn rule_less_model_copies_input() {
        let (_, f) = model(ModelBuilder::new("Bag"));
        let out = f.apply(&object(json!({"a": 1, "b": "two"}))).unwrap();
        assert_eq!(out.get("a"), Some(&FieldValue::Raw(json!(1))));
        assert_eq!(out.get("b"), Some(&FieldValue::Raw(json!("two"))));
    }

    #[test]
    fn string_check_precedence() {
        let rule = FilterRule::new()
            .values(["red", "green"])
            .pattern(Regex::new("^z").unwrap())
            .min_len(10)
            .max("a");
        let f = single("c", FieldType::String, rule);
        assert!(f.apply(&object(json!({"c": "red"}))).is_ok());
        let err = reject(&f, json!({"c": "blue"}));
        assert_eq!(err.code, ErrorCode::Enum);
        assert_eq!(err.extra, extra(&["c", "red,green"]));

        let rule = FilterRule::new().pattern(Regex::new("^[a-z]+$").unwrap()).len(2);
        let f = single("c", FieldType::String, rule);
        assert!(f.apply(&object(json!({"c": "abc"}))).is_ok());
        assert_eq!(reject(&f, json!({"c": "AB"})).code, ErrorCode::Pattern);

        let rule = FilterRule::new().len(2).min_len(5).max_len(1);
        let f = single("c", FieldType::String, rule);
        assert!(f.apply(&object(json!({"c": "ab"}))).is_ok());
        let err = reject(&f, json!({"c": "abc"}));
        assert_eq!(err.code, ErrorCode::Length);
        assert_eq!(err.extra, extra(&["c", "2"]));
    }

    #[test]
    fn string_length_limits_and_bounds() {
        let rule = FilterRule::new().min_len(2).max_len(4).min("b");
        let f = single("s", FieldType::String, rule);
        assert_eq!(reject(&f, json!({"s": "c"})).code, ErrorCode::TooShort);
        assert_eq!(reject(&f, json!({"s": "cdefg"})).code, ErrorCode::TooLong);
        assert_eq!(reject(&f, json!({"s": "abc"})).code, ErrorCode::Min);
        assert!(f.apply(&object(json!({"s": "bcd"}))).is_ok());
    }

    #[test]
    fn required_strings_reject_blank() {
        let f = single("s", FieldType::String, FilterRule::new().required());
        assert_eq!(reject(&f, json!({"s": "   "})).code, ErrorCode::Empty);

        let f = single("s", FieldType::String, FilterRule::new().required().no_trim());
        assert_eq!(f.apply(&object(json!({"s": "  "}))).unwrap().str("s"), Some("  "));
    }

    #[test]
    fn number_enum_and_bounds() {
        let f = single("n", FieldType::Number, FilterRule::new().values([1, 2]));
        assert!(f.apply(&object(json!({"n": "2"}))).is_ok());
        assert_eq!(reject(&f, json!({"n": 3})).code, ErrorCode::Enum);

        let f = single("n", FieldType::Number, FilterRule::new().min(0).max(10));
        assert!(f.apply(&object(json!({"n": 0}))).is_ok());
        let err = reject(&f, json!({"n": 11}));
        assert_eq!(err.code, ErrorCode::Max);
        assert_eq!(err.extra, extra(&["n", "10"]));

        let f = single("n", FieldType::Number, FilterRule::new().max("10"));
        assert_eq!(reject(&f, json!({"n": 1e9})).code, ErrorCode::Max);
    }

    #[test]
    fn dates() {
        let f = single("at", FieldType::Date, FilterRule::new().min("2024-01-01"));
        assert!(f.apply(&object(json!({"at": "2024-06-01"}))).unwrap().date("at").is_some());
        assert_eq!(reject(&f, json!({"at": "someday"})).code, ErrorCode::NotDate);
        let err = reject(&f, json!({"at": "1900-01-01"}));
        assert_eq!(err.code, ErrorCode::Min);
        assert_eq!(err.extra, extra(&["at", "2024-01-01T00:00:00.000Z"]));
    }

    #[test]
    fn bounds_must_fit_the_field_type() {
        let cases = [
            (FieldType::Date, FilterRule::new().min("not-a-date"), "date"),
            (FieldType::Date, FilterRule::new().min("2024-13-45"), "date"),
            (FieldType::Number, FilterRule::new().max("ten"), "number"),
        ];
        for (ty, rule, expected) in cases {
            let mut registry = Registry::new();
            let err = registry.register(ModelBuilder::new("M").field("f", ty, rule)).unwrap_err();
            let DefinitionError::Bound { field, ty, .. } = &err else {
                panic!("expected a bound error, got {err:?}");
            };
            assert_eq!((field.as_str(), *ty), ("f", expected));
        }
    }

    #[test]
    fn nested_models_validate_recursively() {
        let mut registry = Registry::new();
        let city = FilterRule::new().required();
        let addr = registry
            .register(ModelBuilder::new("Address").field("city", FieldType::String, city))
            .unwrap();
        let past = ArrayType::template("Array<Address>").element(ElementType::Model(addr));
        let user = registry
            .register(
                ModelBuilder::new("User")
                    .field("addr", FieldType::Model(addr), FilterRule::new().required())
                    .field("past", FieldType::Array, FilterRule::new().array_type(past)),
            )
            .unwrap();
        let f = registry.filter(user).unwrap();

        let raw = json!({"addr": {"city": "Oslo"}, "past": {"city": "Rome"}});
        let out = f.apply(&object(raw)).unwrap();
        assert_eq!(out.nested("addr").unwrap().str("city"), Some("Oslo"));
        let past = out.array("past").unwrap();
        assert!(matches!(&past[0], FieldValue::Model(m) if m.str("city") == Some("Rome")));

        let err = reject(&f, json!({"addr": {}}));
        assert_eq!(err.code, ErrorCode::Required);
        assert_eq!(err.extra, extra(&["city"]));
    }

    #[test]
    fn field_filter_short_circuits_checks() {
        let upper = FieldFilter::new(|raw| {
            Ok(FieldValue::String(coerce::to_string(raw).to_uppercase()))
        });
        let f = single("code", FieldType::Number, FilterRule::new().filter(upper).min(100));
        assert_eq!(f.apply(&object(json!({"code": "ab"}))).unwrap().str("code"), Some("AB"));
    }

    #[test]
    fn user_errors_pass_through() {
        let boom = Constructor::new("Boom", |_| Err("constructor exploded".into()));
        let f = single("x", FieldType::Construct(boom), FilterRule::new());
        match f.apply(&object(json!({"x": 1}))) {
            Err(FilterError::Custom(e)) => assert_eq!(e.to_string(), "constructor exploded"),
            other => panic!("expected custom error, got {other:?}"),
        }
    }

    #[test]
    fn constructors_build_values() {
        let id = Constructor::new("UserId", |raw| {
            Ok(FieldValue::String(format!("u-{}", coerce::to_string(raw))))
        });
        let f = single("id", FieldType::Construct(id), FilterRule::new());
        assert_eq!(f.apply(&object(json!({"id": 7}))).unwrap().str("id"), Some("u-7"));
    }

    #[test]
    fn global_rule_applies_under_fields() {
        let (_, f) = model(
            ModelBuilder::new("M")
                .global_rule(FilterRule::new().required())
                .field("a", FieldType::String, FilterRule::new())
                .field("b", FieldType::String, FilterRule::new().optional()),
        );
        let err = reject(&f, json!({}));
        assert_eq!(err.extra, extra(&["a"]));
        assert!(f.apply(&object(json!({"a": "x"}))).is_ok());
    }
}
