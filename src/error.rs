//! Error types.
//!
//! kite separates four kinds of failure:
//!
//! - [`DefinitionError`]: a model or controller was declared wrong. Raised
//!   once, at registration, never while serving.
//! - [`FilterError`]: a compiled filter rejected (or failed on) one input.
//! - [`InputError`]: the request body could not be read as input.
//! - [`Error`]: the server could not bind or accept.

use thiserror::Error;

use crate::validation::ValidationError;

/// Boxed error raised by a user-supplied filter or constructor.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Infrastructure failure returned by [`Server`](crate::Server).
///
/// Client mistakes are [`ValidationError`]s turned into `400` responses, not
/// `Error`s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bind address `{0}`")]
    Addr(String),
}

/// A model or controller declaration that can never work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("controller `{0}` is registered twice")]
    DuplicateEntryPoint(String),

    #[error("entry point `{0}` declares more than one model parameter")]
    MultipleModelParams(String),

    #[error("field `{field}` of `{model}` lists itself in its group")]
    SelfGroup { model: String, field: String },

    #[error("group on `{model}` references undeclared field `{member}`")]
    UnknownGroupMember { model: String, member: String },

    #[error("field `{field}` of `{model}`: malformed array template `{template}`")]
    ArrayTemplate { model: String, field: String, template: String },

    #[error("field `{field}` of `{model}`: `{leaf}` is not a known element type")]
    UnknownElement { model: String, field: String, leaf: String },

    #[error("field `{field}` of `{model}`: bound `{bound}` does not fit a {ty} field")]
    Bound { model: String, field: String, bound: String, ty: &'static str },

    #[error("unknown model handle {0}")]
    UnknownModel(usize),
}

/// A request body that could not be turned into raw input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("malformed json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("json body must be an object")]
    NotAnObject,
}

/// Failure of a compiled filter against one raw input.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The input broke a declared rule. Safe to show to the client.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A user filter or constructor failed. Passed through untouched.
    #[error("custom filter failed: {0}")]
    Custom(BoxError),
}

impl FilterError {
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Custom(_) => None,
        }
    }
}
