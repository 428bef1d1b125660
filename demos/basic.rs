//! Minimal kite example: two controllers, one validated model.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -X POST http://localhost:3000/api/user.create \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","age":30,"email":"a@example.com"}'
//!   curl -X POST http://localhost:3000/api/user.create -d 'name=al'
//!   curl 'http://localhost:3000/api/user.list?page=2'

use kite::{
    Args, EntryPoint, FieldType, FilterRule, Instance, Json, ModelBuilder, Param, Registry,
    Response, Router, Server,
};
use regex::Regex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let email = Regex::new(r"^[^@\s]+@[^@\s]+$")?;
    let phone = Regex::new(r"^\+?[0-9 ]{6,}$")?;

    let mut models = Registry::new();
    let user = models.register(
        ModelBuilder::new("User")
            .field("name", FieldType::String, FilterRule::new().required().min_len(3).max_len(40))
            .field("age", FieldType::Number, FilterRule::new().min(0).max(150))
            .field("email", FieldType::String, FilterRule::new().pattern(email).group("phone"))
            .field("phone", FieldType::String, FilterRule::new().pattern(phone))
            .field("role", FieldType::String, FilterRule::new().values(["admin", "member"])),
    )?;

    let app = Router::new()
        .prefix("/api")
        .on(EntryPoint::new("user.create", create_user)
            .param(Param::model("user", user))
            .bind(&models)?)?
        .on(EntryPoint::new("user.list", list_users)
            .param(
                Param::scalar("page", FieldType::Number)
                    .rule(FilterRule::new().min(1))
                    .default(1.0),
            )
            .bind(&models)?)?;

    Server::bind("0.0.0.0:3000")?.serve(app).await?;
    Ok(())
}

// POST /api/user.create: only reached with a valid user.
async fn create_user(args: Args) -> Json<Instance> {
    Json(args.model().cloned().unwrap_or_default())
}

// GET /api/user.list?page=N
async fn list_users(args: Args) -> Response {
    let page = args.number("page").unwrap_or(1.0);
    Response::json(format!(r#"{{"page":{page},"users":[]}}"#))
}
