//! Model declarations and the registry that owns them.
//!
//! A model is declared with a [`ModelBuilder`] and handed to
//! [`Registry::register`], which checks the declaration and returns a
//! [`ModelId`] handle. The model's filter is compiled the first time it is
//! asked for and then kept for the life of the registry.
//!
//! ```rust
//! use kite::{FieldType, FilterRule, ModelBuilder, Registry};
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! let user = registry.register(
//!     ModelBuilder::new("User")
//!         .field("name", FieldType::String, FilterRule::new().required().min_len(3))
//!         .field("age", FieldType::Number, FilterRule::new().min(0)),
//! )?;
//!
//! let raw = json!({"name": "Ada", "age": "36"});
//! let user = registry.filter(user)?.apply(raw.as_object().unwrap())?;
//! assert_eq!(user.number("age"), Some(36.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::compiler::{self, CustomFilter, LeafPlan, ModelFilter};
use crate::error::DefinitionError;
use crate::group::{self, GroupCheck};
use crate::rule::{ElementType, FieldType, FilterRule};

/// Stable handle to a registered model.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ModelId(usize);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One declared field.
#[derive(Clone, Debug)]
pub(crate) struct FieldSpec {
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) rule: FilterRule,
}

// ── ModelBuilder ──────────────────────────────────────────────────────────────

/// Collects the fields of one model.
///
/// Declaring the same field twice replaces its type and rule but keeps its
/// original position.
#[derive(Clone, Debug)]
pub struct ModelBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    defaults: Option<FilterRule>,
    custom: Option<CustomFilter>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new(), defaults: None, custom: None }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType, rule: FilterRule) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(spec) => {
                spec.ty = ty;
                spec.rule = rule;
            }
            None => self.fields.push(FieldSpec { name, ty, rule }),
        }
        self
    }

    /// Defaults merged underneath every field rule at registration.
    pub fn global_rule(mut self, rule: FilterRule) -> Self {
        self.defaults = Some(rule);
        self
    }

    /// Use `filter` for this model instead of compiling its field rules.
    pub fn custom_filter(mut self, filter: CustomFilter) -> Self {
        self.custom = Some(filter);
        self
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

struct ModelDescriptor {
    name: String,
    fields: Vec<FieldSpec>,
    groups: Vec<GroupCheck>,
    custom: Option<CustomFilter>,
    compiled: OnceLock<Arc<ModelFilter>>,
}

/// Owns every registered model and its compiled filter.
///
/// Registration needs `&mut self`; everything else is read-only, so a
/// finished registry can be shared behind an `Arc` by any number of request
/// tasks.
#[derive(Default)]
pub struct Registry {
    models: Vec<ModelDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a model declaration and stores it.
    ///
    /// Every definition error surfaces here: bad group members, malformed
    /// array templates, unknown nested models, and bounds that cannot be read
    /// as the field's type.
    pub fn register(&mut self, builder: ModelBuilder) -> Result<ModelId, DefinitionError> {
        let ModelBuilder { name, fields, defaults, custom } = builder;

        let fields: Vec<FieldSpec> = match &defaults {
            Some(defaults) => fields
                .into_iter()
                .map(|f| FieldSpec { rule: f.rule.over(defaults), ..f })
                .collect(),
            None => fields,
        };

        // A custom filter replaces the rules, so they are not checked either.
        let groups = if custom.is_some() {
            Vec::new()
        } else {
            self.check_fields(&name, &fields)?;
            let declared: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
            let declarations = fields
                .iter()
                .filter_map(|f| {
                    let members = f.rule.group.as_ref()?;
                    Some(std::iter::once(f.name.clone()).chain(members.iter().cloned()).collect())
                })
                .collect();
            group::resolve(&name, declarations, &declared)?
        };

        let id = ModelId(self.models.len());
        debug!(
            model = %name,
            %id,
            fields = fields.len(),
            groups = groups.len(),
            custom = custom.is_some(),
            "registered model"
        );
        let compiled = OnceLock::new();
        self.models.push(ModelDescriptor { name, fields, groups, custom, compiled });
        Ok(id)
    }

    fn check_fields(&self, model: &str, fields: &[FieldSpec]) -> Result<(), DefinitionError> {
        for spec in fields {
            compiler::check_bounds(model, spec)?;
            match &spec.ty {
                FieldType::Model(id) => self.check_id(*id)?,
                FieldType::Array => {
                    let (_, leaf) = compiler::plan_shape(model, spec)?;
                    if let LeafPlan::Given(ElementType::Model(id)) = leaf {
                        self.check_id(*id)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_id(&self, id: ModelId) -> Result<(), DefinitionError> {
        if id.0 < self.models.len() {
            Ok(())
        } else {
            Err(DefinitionError::UnknownModel(id.0))
        }
    }

    fn get(&self, id: ModelId) -> Result<&ModelDescriptor, DefinitionError> {
        self.models.get(id.0).ok_or(DefinitionError::UnknownModel(id.0))
    }

    /// The compiled filter of `id`, compiling it on first use.
    pub fn filter(&self, id: ModelId) -> Result<Arc<ModelFilter>, DefinitionError> {
        let model = self.get(id)?;
        if let Some(filter) = model.compiled.get() {
            return Ok(Arc::clone(filter));
        }
        let filter = compiler::compile(
            &model.name,
            &model.fields,
            &model.groups,
            model.custom.as_ref(),
            self,
        )?;
        Ok(Arc::clone(model.compiled.get_or_init(|| Arc::new(filter))))
    }

    /// Compiles `fields` into a filter that is not registered anywhere.
    /// Entry points use this for their implicit scalar parameters.
    pub(crate) fn compile_adhoc(
        &self,
        name: &str,
        fields: Vec<FieldSpec>,
    ) -> Result<ModelFilter, DefinitionError> {
        self.check_fields(name, &fields)?;
        compiler::compile(name, &fields, &[], None, self)
    }

    pub fn name(&self, id: ModelId) -> Option<&str> {
        self.models.get(id.0).map(|m| m.name.as_str())
    }

    /// True for field types that resolve to a registered model.
    pub fn is_model(&self, ty: &FieldType) -> bool {
        matches!(ty, FieldType::Model(id) if id.0 < self.models.len())
    }

    /// True when the model declares at least one validated field, as opposed
    /// to one used only as a name.
    pub fn has_declared_inputs(&self, id: ModelId) -> bool {
        self.models.get(id.0).is_some_and(|m| !m.fields.is_empty())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
