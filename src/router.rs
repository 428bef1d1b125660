//! Controller-name routing and the per-request pipeline.
//!
//! RPC-style: a controller named `user.create` answers `GET` and `POST` at
//! `{prefix}user.create`. There are no path parameters; everything the
//! controller needs comes from the query string and the body.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{error, trace};

use crate::error::{DefinitionError, FilterError};
use crate::handler::Controller;
use crate::request::Request;
use crate::response::Response;
use crate::validation::{DefaultMessages, MessageFormat};

/// The application router. Build it once at startup; pass it to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    prefix: String,
    controllers: HashMap<String, Arc<Controller>>,
    messages: Arc<dyn MessageFormat>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            prefix: "/".to_owned(),
            controllers: HashMap::new(),
            messages: Arc::new(DefaultMessages),
        }
    }

    /// Mount point for every controller, e.g. `/api/`. A missing trailing
    /// slash is added.
    pub fn prefix(mut self, prefix: &str) -> Self {
        let mut prefix = prefix.to_owned();
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.prefix = prefix;
        self
    }

    /// Formatter for validation error messages.
    pub fn messages(mut self, messages: impl MessageFormat) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    /// Mounts a bound controller under its name.
    ///
    /// ```rust,no_run
    /// # use kite::{Args, EntryPoint, Registry, Router};
    /// # async fn ping(_: Args) -> &'static str { "pong" }
    /// # fn main() -> Result<(), kite::DefinitionError> {
    /// let registry = Registry::new();
    /// let app = Router::new()
    ///     .prefix("/api")
    ///     .on(EntryPoint::new("ping", ping).bind(&registry)?)?;
    /// # Ok(()) }
    /// ```
    pub fn on(mut self, controller: Controller) -> Result<Self, DefinitionError> {
        let name = controller.name().to_owned();
        if self.controllers.contains_key(&name) {
            return Err(DefinitionError::DuplicateEntryPoint(name));
        }
        self.controllers.insert(name, Arc::new(controller));
        Ok(self)
    }

    pub(crate) fn lookup(&self, path: &str) -> Option<Arc<Controller>> {
        let name = path.strip_prefix(self.prefix.as_str())?;
        self.controllers.get(name).map(Arc::clone)
    }

    /// Runs one request through lookup, input parsing, validation and the
    /// controller.
    pub async fn respond(&self, req: Request) -> Response {
        let Some(controller) = self.lookup(req.path()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        if req.method() != Method::GET && req.method() != Method::POST {
            return Response::status(StatusCode::METHOD_NOT_ALLOWED);
        }

        let input = match req.input() {
            Ok(input) => input,
            Err(e) => {
                trace!(controller = controller.name(), "unreadable input: {e}");
                return Response::builder().status(StatusCode::BAD_REQUEST).text(e.to_string());
            }
        };

        match controller.call(&input, Some(Arc::new(req))) {
            Ok(fut) => fut.await,
            Err(FilterError::Validation(e)) => {
                trace!(controller = controller.name(), code = %e.code, "input rejected");
                Response::validation(&e, self.messages.as_ref())
            }
            Err(FilterError::Custom(e)) => {
                error!(controller = controller.name(), "controller input failed: {e}");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
