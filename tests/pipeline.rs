use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, StatusCode};
use serde_json::{Value, json};

use kite::{
    Args, CustomFilter, EntryPoint, FieldType, FieldValue, FilterError, FilterRule, Instance, Json,
    ModelBuilder, Param, Registry, Request, Response, Router, ValidationError,
};

fn request(method: Method, uri: &str, json_body: Option<Value>) -> Request {
    let mut headers = HeaderMap::new();
    let body = match json_body {
        Some(v) => {
            headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
            Bytes::from(serde_json::to_vec(&v).unwrap())
        }
        None => Bytes::new(),
    };
    Request::from_parts(method, uri.parse().unwrap(), headers, body)
}

fn body(res: &Response) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

async fn echo_user(args: Args) -> Json<Instance> {
    Json(args.model().cloned().unwrap_or_default())
}

async fn list(args: Args) -> Json<Value> {
    Json(json!({
        "page": args.number("page"),
        "verbose": args.boolean("verbose"),
        "via": args.context().map(|r| r.method().as_str().to_owned()),
    }))
}

fn app() -> Router {
    let mut models = Registry::new();
    let city = FilterRule::new().required();
    let address = models
        .register(ModelBuilder::new("Address").field("city", FieldType::String, city))
        .unwrap();
    let user = models
        .register(
            ModelBuilder::new("User")
                .field("name", FieldType::String, FilterRule::new().required().min_len(3))
                .field("age", FieldType::Number, FilterRule::new().min(0))
                .field("address", FieldType::Model(address), FilterRule::new()),
        )
        .unwrap();

    Router::new()
        .prefix("/api")
        .on(EntryPoint::new("user.create", echo_user)
            .param(Param::model("user", user))
            .bind(&models)
            .unwrap())
        .unwrap()
        .on(EntryPoint::new("user.list", list)
            .param(Param::context("req"))
            .param(Param::scalar("page", FieldType::Number).default(1.0))
            .param(Param::scalar("verbose", FieldType::Boolean).default(false))
            .bind(&models)
            .unwrap())
        .unwrap()
}

#[tokio::test]
async fn valid_model_reaches_the_handler() {
    let req = request(
        Method::POST,
        "/api/user.create",
        Some(json!({"name": " Ada ", "age": "36", "address": {"city": "London"}, "admin": true})),
    );
    let res = app().respond(req).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(body(&res), json!({"name": "Ada", "age": 36, "address": {"city": "London"}}));
}

#[tokio::test]
async fn first_violation_is_reported() {
    let req = request(Method::POST, "/api/user.create", Some(json!({"name": "Al", "age": -1})));
    let res = app().respond(req).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(&res),
        json!({
            "code": 1004,
            "error": "ERR_TOO_SHORT",
            "extra": ["name", "3"],
            "message": "name must be at least 3 characters",
        })
    );
}

#[tokio::test]
async fn query_and_body_merge() {
    let req = request(Method::POST, "/api/user.create?name=Grace&age=5", Some(json!({"age": 85})));
    let res = app().respond(req).await;
    assert_eq!(body(&res), json!({"name": "Grace", "age": 85}));
}

#[tokio::test]
async fn scalar_params_use_defaults_and_context() {
    let res = app().respond(request(Method::GET, "/api/user.list", None)).await;
    assert_eq!(body(&res), json!({"page": 1.0, "verbose": false, "via": "GET"}));

    let req = request(Method::GET, "/api/user.list?page=3&verbose=FALSE", None);
    let res = app().respond(req).await;
    assert_eq!(body(&res), json!({"page": 3.0, "verbose": false, "via": "GET"}));

    let res = app().respond(request(Method::GET, "/api/user.list?page=x", None)).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&res)["error"], "ERR_NOT_NUMBER");
}

#[tokio::test]
async fn routing_errors() {
    let res = app().respond(request(Method::GET, "/api/nope", None)).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    let res = app().respond(request(Method::DELETE, "/api/user.list", None)).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
    let uri = "/api/user.create".parse().unwrap();
    let req = Request::from_parts(Method::POST, uri, headers, Bytes::from_static(b"{"));
    let res = app().respond(req).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn custom_errors_become_500() {
    let mut models = Registry::new();
    let failing = models
        .register(ModelBuilder::new("Failing").custom_filter(CustomFilter::new(|_| {
            Err(FilterError::Custom("database unavailable".into()))
        })))
        .unwrap();
    let app = Router::new()
        .on(EntryPoint::new("fail", echo_user)
            .param(Param::model("m", failing))
            .bind(&models)
            .unwrap())
        .unwrap();
    let res = app.respond(request(Method::POST, "/fail", Some(json!({})))).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn controllers_can_be_called_directly() {
    let mut models = Registry::new();
    let search = models
        .register(
            ModelBuilder::new("Search")
                .field("q", FieldType::String, FilterRule::new().group("tag"))
                .field("tag", FieldType::String, FilterRule::new()),
        )
        .unwrap();
    let ctl = EntryPoint::new("search", echo_user)
        .param(Param::model("s", search))
        .bind(&models)
        .unwrap();

    let input = json!({}).as_object().cloned().unwrap();
    let err = ctl.call(&input, None).err().unwrap();
    assert_eq!(
        err.validation(),
        Some(&ValidationError::new(kite::ErrorCode::GroupRequired, vec!["q, tag".into()]))
    );

    let input = json!({"tag": "rust"}).as_object().cloned().unwrap();
    let res = ctl.call(&input, None).ok().unwrap().await;
    assert_eq!(body(&res), json!({"tag": "rust"}));
}

#[test]
fn instance_values_are_typed() {
    let mut models = Registry::new();
    let id = models
        .register(ModelBuilder::new("Flag").field(
            "on",
            FieldType::Boolean,
            FilterRule::new().required(),
        ))
        .unwrap();
    let out = models.filter(id).unwrap().apply(json!({"on": "0"}).as_object().unwrap()).unwrap();
    assert_eq!(out.get("on"), Some(&FieldValue::Boolean(false)));
    assert_eq!(out.model(), "Flag");
}
