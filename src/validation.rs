//! Validation error taxonomy and message templating.
//!
//! Every rejected input produces the same shape: a stable [`ErrorCode`] plus
//! an `extra` payload of strings (field name first, then the limit, pattern
//! or value list that was violated). Turning that into prose is the job of a
//! [`MessageFormat`]; the filters never do it themselves.

use std::fmt;

use serde::Serialize;

/// Stable validation error codes.
///
/// The numeric values are part of the wire contract. Do not renumber.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorCode {
    Required,
    Enum,
    Pattern,
    TooShort,
    TooLong,
    NotNumber,
    Min,
    Max,
    GroupRequired,
    Length,
    NotDate,
    Empty,
    EmptyArray,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Required      => 1001,
            Self::Enum          => 1002,
            Self::Pattern       => 1003,
            Self::TooShort      => 1004,
            Self::TooLong       => 1005,
            Self::NotNumber     => 1006,
            Self::Min           => 1007,
            Self::Max           => 1008,
            Self::GroupRequired => 1009,
            Self::Length        => 1010,
            Self::NotDate       => 1011,
            Self::Empty         => 1012,
            Self::EmptyArray    => 1013,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required      => "ERR_REQUIRED",
            Self::Enum          => "ERR_ENUM",
            Self::Pattern       => "ERR_PATTERN",
            Self::TooShort      => "ERR_TOO_SHORT",
            Self::TooLong       => "ERR_TOO_LONG",
            Self::NotNumber     => "ERR_NOT_NUMBER",
            Self::Min           => "ERR_MIN",
            Self::Max           => "ERR_MAX",
            Self::GroupRequired => "ERR_GROUP_REQUIRED",
            Self::Length        => "ERR_LENGTH",
            Self::NotDate       => "ERR_NOT_DATE",
            Self::Empty         => "ERR_EMPTY",
            Self::EmptyArray    => "ERR_EMPTY_ARRAY",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected input: one code, zero or more payload strings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub extra: Vec<String>,
}

impl ValidationError {
    pub fn new(code: ErrorCode, extra: Vec<String>) -> Self {
        Self { code, extra }
    }

    /// Shorthand for errors whose only payload is the field name.
    pub fn field(code: ErrorCode, field: &str) -> Self {
        Self::new(code, vec![field.to_owned()])
    }

    pub(crate) fn with_limit(code: ErrorCode, field: &str, limit: impl ToString) -> Self {
        Self::new(code, vec![field.to_owned(), limit.to_string()])
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if !self.extra.is_empty() {
            write!(f, " ({})", self.extra.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ── Message templating ────────────────────────────────────────────────────────

/// Turns a [`ValidationError`] into a human-readable message.
///
/// Inject your own through [`Router::messages`](crate::Router::messages) for
/// localisation or product wording.
pub trait MessageFormat: Send + Sync + 'static {
    fn format(&self, err: &ValidationError) -> String;
}

/// English messages with `%s` placeholders filled from `extra`, in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMessages;

impl DefaultMessages {
    fn template(code: ErrorCode) -> &'static str {
        match code {
            ErrorCode::Required      => "%s is required",
            ErrorCode::Enum          => "%s must be one of: %s",
            ErrorCode::Pattern       => "%s does not match %s",
            ErrorCode::TooShort      => "%s must be at least %s characters",
            ErrorCode::TooLong       => "%s must be at most %s characters",
            ErrorCode::NotNumber     => "%s must be a number",
            ErrorCode::Min           => "%s must not be less than %s",
            ErrorCode::Max           => "%s must not be greater than %s",
            ErrorCode::GroupRequired => "at least one of %s is required",
            ErrorCode::Length        => "%s must be exactly %s characters",
            ErrorCode::NotDate       => "%s must be a date",
            ErrorCode::Empty         => "%s must not be empty",
            ErrorCode::EmptyArray    => "%s must not be an empty list",
        }
    }
}

impl MessageFormat for DefaultMessages {
    fn format(&self, err: &ValidationError) -> String {
        substitute(Self::template(err.code), &err.extra)
    }
}

/// Replaces each `%s` in `template` with the next item of `args`.
/// Placeholders past the end of `args` are left as they are.
pub fn substitute(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(at) = rest.find("%s") {
        out.push_str(&rest[..at]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("%s"),
        }
        rest = &rest[at + 2..];
    }
    out.push_str(rest);
    out
}

/// JSON body sent to clients for a rejected request.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub code: u16,
    pub error: &'static str,
    pub extra: &'a [String],
    pub message: String,
}

impl<'a> ErrorBody<'a> {
    pub(crate) fn new(err: &'a ValidationError, messages: &dyn MessageFormat) -> Self {
        Self {
            code: err.code.as_u16(),
            error: err.code.as_str(),
            extra: &err.extra,
            message: messages.format(err),
        }
    }
}
