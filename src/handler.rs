//! Entry points: binding a handler's parameters to validated input.
//!
//! # From declaration to call
//!
//! ```text
//! EntryPoint::new("user.create", create_user)         ← user declares
//!     .param(Param::context("req"))
//!     .param(Param::model("user", user_id))
//!     .param(Param::scalar("notify", FieldType::Boolean).default(false))
//!        ↓ .bind(&registry)                            ← once, at startup
//! Controller { slots: [Context, Model(filter), Scalar(filter)], handler }
//!        ↓ controller.call(&input, Some(req))          ← per request
//! create_user(Args [req, user instance, notify]).await
//! ```
//!
//! Every parameter that is neither the transport context nor the model gets
//! an implicit one-field model named after it, required unless it declares
//! a default.
//!
//! Handlers are stored type-erased the same way for every controller: an
//! `Arc<dyn ErasedHandler>` whose `call` boxes the handler's future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::compiler::ModelFilter;
use crate::error::{DefinitionError, FilterError};
use crate::registry::{FieldSpec, ModelId, Registry};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::rule::{FieldType, FilterRule};
use crate::value::{FieldValue, Instance};

// ── Type erasure ──────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, args: Args) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid controller handler:
///
/// ```text
/// async fn name(args: Args) -> impl IntoResponse
/// ```
///
/// Sealed: only the blanket impl below satisfies it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, args: Args) -> BoxFuture {
        let fut = (self.0)(args);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

/// One declared handler parameter.
#[derive(Clone, Debug)]
pub struct Param {
    name: String,
    kind: ParamKind,
}

#[derive(Clone, Debug)]
enum ParamKind {
    Context,
    Model(ModelId),
    Scalar { ty: FieldType, rule: FilterRule, default: Option<FieldValue> },
}

impl Param {
    /// The transport context: the incoming [`Request`].
    pub fn context(name: &str) -> Self {
        Self { name: name.to_owned(), kind: ParamKind::Context }
    }

    /// The domain model, filled from the whole raw input. At most one per
    /// entry point.
    pub fn model(name: &str, id: ModelId) -> Self {
        Self { name: name.to_owned(), kind: ParamKind::Model(id) }
    }

    /// A single input value, read from the key `name`.
    pub fn scalar(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.to_owned(),
            kind: ParamKind::Scalar { ty, rule: FilterRule::new(), default: None },
        }
    }

    /// Extra rules for a scalar parameter. Ignored for other kinds.
    pub fn rule(mut self, rule: FilterRule) -> Self {
        if let ParamKind::Scalar { rule: r, .. } = &mut self.kind {
            *r = rule;
        }
        self
    }

    /// Value used when the input lacks the key. Makes the parameter optional.
    pub fn default(mut self, value: impl Into<FieldValue>) -> Self {
        if let ParamKind::Scalar { default, .. } = &mut self.kind {
            *default = Some(value.into());
        }
        self
    }
}

/// One resolved argument.
#[derive(Clone, Debug)]
pub enum Arg {
    Context(Arc<Request>),
    Model(Instance),
    Value(FieldValue),
    /// Optional and absent, or a context parameter called without one.
    Missing,
}

/// The positional arguments handed to a handler.
#[derive(Clone, Debug, Default)]
pub struct Args {
    items: Vec<(String, Arg)>,
}

impl Args {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The argument at `index`, in declaration order.
    pub fn at(&self, index: usize) -> Option<&Arg> {
        self.items.get(index).map(|(_, a)| a)
    }

    /// The argument declared as `name`.
    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn context(&self) -> Option<&Request> {
        self.items.iter().find_map(|(_, a)| match a {
            Arg::Context(req) => Some(req.as_ref()),
            _ => None,
        })
    }

    pub fn model(&self) -> Option<&Instance> {
        self.items.iter().find_map(|(_, a)| match a {
            Arg::Model(m) => Some(m),
            _ => None,
        })
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        match self.get(name)? {
            Arg::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.value(name)? {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.value(name)? {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.value(name)? {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

// ── EntryPoint / Controller ───────────────────────────────────────────────────

/// A controller declaration: a name, a handler and its parameters.
pub struct EntryPoint {
    name: String,
    params: Vec<Param>,
    handler: BoxedHandler,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, handler: impl Handler) -> Self {
        Self { name: name.into(), params: Vec::new(), handler: handler.into_boxed_handler() }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Resolves every parameter against `registry` into a call-ready
    /// [`Controller`].
    pub fn bind(self, registry: &Registry) -> Result<Controller, DefinitionError> {
        let models = self.params.iter().filter(|p| matches!(p.kind, ParamKind::Model(_))).count();
        if models > 1 {
            return Err(DefinitionError::MultipleModelParams(self.name));
        }

        let slots = self
            .params
            .into_iter()
            .map(|param| {
                let slot = match param.kind {
                    ParamKind::Context => Slot::Context,
                    ParamKind::Model(id) => Slot::Model(registry.filter(id)?),
                    ParamKind::Scalar { ty, rule, default } => {
                        let implicit = if default.is_some() {
                            FilterRule::new().optional()
                        } else {
                            FilterRule::new().required()
                        };
                        let rule = rule.over(&implicit);
                        let spec = FieldSpec { name: param.name.clone(), ty, rule };
                        let filter = registry.compile_adhoc(&param.name, vec![spec])?;
                        Slot::Scalar { filter, default }
                    }
                };
                Ok((param.name, slot))
            })
            .collect::<Result<_, DefinitionError>>()?;

        Ok(Controller { name: self.name, slots, handler: self.handler })
    }
}

enum Slot {
    Context,
    Model(Arc<ModelFilter>),
    Scalar { filter: ModelFilter, default: Option<FieldValue> },
}

/// A bound entry point, shared by every request to it.
pub struct Controller {
    name: String,
    slots: Vec<(String, Slot)>,
    handler: BoxedHandler,
}

impl Controller {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the arguments from `input` and starts the handler.
    ///
    /// Validation runs before the handler does; its first failure is
    /// returned instead of a future.
    pub fn call(
        &self,
        input: &Map<String, Value>,
        ctx: Option<Arc<Request>>,
    ) -> Result<BoxFuture, FilterError> {
        let mut items = Vec::with_capacity(self.slots.len());
        for (name, slot) in &self.slots {
            let arg = match slot {
                Slot::Context => ctx.clone().map_or(Arg::Missing, Arg::Context),
                Slot::Model(filter) => Arg::Model(filter.apply(input)?),
                Slot::Scalar { filter, default } => {
                    let one = filter.apply(input)?;
                    match one.get(name).cloned().or_else(|| default.clone()) {
                        Some(v) => Arg::Value(v),
                        None => Arg::Missing,
                    }
                }
            };
            items.push((name.clone(), arg));
        }
        trace!(controller = %self.name, args = items.len(), "arguments bound");
        Ok(self.handler.call(Args { items }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelBuilder;

    async fn noop(_args: Args) -> &'static str {
        "ok"
    }

    #[test]
    fn two_model_params_are_rejected() {
        let mut registry = Registry::new();
        let a = registry.register(ModelBuilder::new("A")).unwrap();
        let b = registry.register(ModelBuilder::new("B")).unwrap();
        let err = EntryPoint::new("pair", noop)
            .param(Param::model("a", a))
            .param(Param::model("b", b))
            .bind(&registry)
            .err()
            .unwrap();
        assert_eq!(err, DefinitionError::MultipleModelParams("pair".into()));
    }

    #[test]
    fn scalar_without_default_is_required() {
        let registry = Registry::new();
        let ctl = EntryPoint::new("get", noop)
            .param(Param::scalar("id", FieldType::Number))
            .bind(&registry)
            .unwrap();
        let err = ctl.call(&Map::new(), None).err().unwrap();
        assert_eq!(err.validation().unwrap().extra, vec!["id".to_owned()]);
    }

    #[test]
    fn unknown_model_fails_binding() {
        let registry = Registry::new();
        let mut other = Registry::new();
        let id = other.register(ModelBuilder::new("Elsewhere")).unwrap();
        let entry = EntryPoint::new("x", noop).param(Param::model("m", id));
        let err = entry.bind(&registry).err().unwrap();
        assert!(matches!(err, DefinitionError::UnknownModel(0)));
    }
}
