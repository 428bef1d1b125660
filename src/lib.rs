//! # kite
//!
//! An RPC-style HTTP framework built around compiled input models.
//!
//! Clients call named controllers. Before a controller runs, its input (the
//! query string merged with the parsed body) goes through a filter compiled
//! once from the declared model: presence, type coercion, enumerations,
//! patterns, lengths, bounds, nested models, array templates and
//! "at least one of" groups. The controller only ever sees valid, typed
//! values. The first rule an input breaks is reported to the client as a
//! stable error code plus a small payload.
//!
//! ## Pieces
//!
//! - [`FilterRule`] and [`FieldType`]: what one field must look like
//! - [`ModelBuilder`] / [`Registry`]: declare models, get [`ModelId`]s and
//!   compiled [`ModelFilter`]s
//! - [`EntryPoint`] / [`Param`]: bind handler parameters to the context,
//!   the model, or single input values
//! - [`Router`] / [`Server`]: mount controllers and serve them over hyper
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kite::{
//!     Args, EntryPoint, FieldType, FilterRule, Json, ModelBuilder, Param, Registry, Router,
//!     Server,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut models = Registry::new();
//!     let user = models.register(
//!         ModelBuilder::new("User")
//!             .field("name", FieldType::String, FilterRule::new().required().min_len(3))
//!             .field("age", FieldType::Number, FilterRule::new().min(0)),
//!     )?;
//!
//!     let app = Router::new().prefix("/api").on(
//!         EntryPoint::new("user.create", create_user)
//!             .param(Param::model("user", user))
//!             .bind(&models)?,
//!     )?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await?;
//!     Ok(())
//! }
//!
//! async fn create_user(args: Args) -> Json<kite::Instance> {
//!     Json(args.model().cloned().unwrap_or_default())
//! }
//! ```

mod array;
mod coerce;
mod compiler;
mod error;
mod group;
mod handler;
mod registry;
mod request;
mod response;
mod router;
mod rule;
mod server;
mod validation;
mod value;

pub use compiler::{CustomFilter, ModelFilter};
pub use error::{BoxError, DefinitionError, Error, FilterError, InputError};
pub use handler::{Arg, Args, BoxFuture, Controller, EntryPoint, Handler, Param};
pub use registry::{ModelBuilder, ModelId, Registry};
pub use request::Request;
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use rule::{ArrayType, Bound, Constructor, ElementType, FieldFilter, FieldType, FilterRule};
pub use server::Server;
pub use validation::{DefaultMessages, ErrorCode, MessageFormat, ValidationError, substitute};
pub use value::{FieldValue, Instance};
