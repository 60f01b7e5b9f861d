use std::collections::HashSet;

use brrtdispatch::dependency::Dependencies;
use brrtdispatch::error::BindError;
use brrtdispatch::params::{
    parse_bool, resolve_params, route_param_list, route_param_names, Bound, Facet, ModelSpec,
    ParamType, ParameterDescriptor,
};
use brrtdispatch::server::Request;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

fn get(target: &str) -> Request {
    Request::new(Method::GET, target).unwrap()
}

fn no_route_params() -> HashSet<String> {
    HashSet::new()
}

#[test]
fn test_route_param_tokens_are_counted() {
    assert_eq!(route_param_list("/a/:x/b/:y"), vec!["x", "y"]);
    assert!(route_param_list("/static/path").is_empty());
    assert_eq!(route_param_names("/users/:user_id/posts/:post_id").len(), 2);
}

#[test]
fn test_list_query_param_zero_one_many() {
    let params = [ParameterDescriptor::query("tags", ParamType::list(ParamType::Str))
        .with_default(json!([]))];
    let deps = Dependencies::new();

    let none = resolve_params(&params, &get("/search"), &no_route_params(), &deps).unwrap();
    assert_eq!(none.value("tags"), Some(&json!([])));

    let one = resolve_params(&params, &get("/search?tags=a"), &no_route_params(), &deps).unwrap();
    assert_eq!(one.value("tags"), Some(&json!(["a"])));

    let many = resolve_params(
        &params,
        &get("/search?tags=a&tags=b&tags=c"),
        &no_route_params(),
        &deps,
    )
    .unwrap();
    assert_eq!(many.value("tags"), Some(&json!(["a", "b", "c"])));
}

#[test]
fn test_typed_list_items_are_coerced() {
    let params = [ParameterDescriptor::query("ids", ParamType::list(ParamType::Int))];
    let args = resolve_params(
        &params,
        &get("/?ids=1&ids=2"),
        &no_route_params(),
        &Dependencies::new(),
    )
    .unwrap();
    let ids: Vec<i64> = args.get_as("ids").unwrap();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_bool_spellings() {
    for truthy in ["true", "1", "yes", "on", "TRUE", " On "] {
        assert_eq!(parse_bool(truthy), Some(true), "{truthy}");
    }
    for falsy in ["false", "0", "no", "off", ""] {
        assert_eq!(parse_bool(falsy), Some(false), "{falsy}");
    }
    assert_eq!(parse_bool("maybe"), None);
}

#[test]
fn test_invalid_bool_is_invalid_parameter_value() {
    let params = [ParameterDescriptor::query("active", ParamType::Bool)];
    let err = resolve_params(
        &params,
        &get("/?active=maybe"),
        &no_route_params(),
        &Dependencies::new(),
    )
    .unwrap_err();
    assert!(matches!(err, BindError::InvalidParameterValue { ref name, .. } if name == "active"));
}

#[test]
fn test_missing_required_parameter() {
    let params = [ParameterDescriptor::new("name", ParamType::Str)];
    let err = resolve_params(&params, &get("/hello"), &no_route_params(), &Dependencies::new())
        .unwrap_err();
    assert!(matches!(err, BindError::MissingParameter { ref name, .. } if name == "name"));
    assert_eq!(err.param_name(), "name");
}

#[test]
fn test_optional_and_default_fallbacks() {
    let params = [
        ParameterDescriptor::new("page", ParamType::Int).with_default(1),
        ParameterDescriptor::new("q", ParamType::optional(ParamType::Str)),
    ];
    let args = resolve_params(&params, &get("/items"), &no_route_params(), &Dependencies::new())
        .unwrap();
    assert_eq!(args.value("page"), Some(&json!(1)));
    assert_eq!(args.value("q"), Some(&json!(null)));
}

#[test]
fn test_query_alias_and_header_underscores() {
    let params = [
        ParameterDescriptor::query("page_size", ParamType::Int).alias("pageSize"),
        ParameterDescriptor::header("x_api_version", ParamType::Str),
    ];
    let req = get("/items?pageSize=25").with_header("X-Api-Version", "2");
    let args = resolve_params(&params, &req, &no_route_params(), &Dependencies::new()).unwrap();
    assert_eq!(args.value("page_size"), Some(&json!(25)));
    assert_eq!(args.value("x_api_version"), Some(&json!("2")));
}

#[test]
fn test_path_declared_name_wins_over_query() {
    let mut req = get("/users/42?id=7");
    req.path_params.insert("id", "42");
    let params = [ParameterDescriptor::new("id", ParamType::Int)];
    let args = resolve_params(
        &params,
        &req,
        &route_param_names("/users/:id"),
        &Dependencies::new(),
    )
    .unwrap();
    assert_eq!(args.get_as::<i64>("id").unwrap(), 42);
}

#[test]
fn test_dependency_parameter_ignores_query_value() {
    let mut deps = Dependencies::new();
    deps.insert("db", String::from("pool"));
    let params = [ParameterDescriptor::dependency("db")];
    let args = resolve_params(&params, &get("/?db=evil"), &no_route_params(), &deps).unwrap();
    assert_eq!(args.dependency::<String>("db").as_deref(), Some(&"pool".to_string()));
}

#[test]
fn test_facets_bind_request_parts() {
    let req = get("/items?x=1")
        .with_header("X-Trace", "abc")
        .with_body(b"raw".to_vec());
    let params = [
        ParameterDescriptor::facet("headers", Facet::Headers),
        ParameterDescriptor::facet("query", Facet::QueryParams),
        ParameterDescriptor::facet("body", Facet::Body),
        ParameterDescriptor::facet("method", Facet::Method),
    ];
    let args = resolve_params(&params, &req, &no_route_params(), &Dependencies::new()).unwrap();
    assert_eq!(args.headers().and_then(|h| h.get("x-trace")), Some("abc"));
    assert_eq!(args.query_params().and_then(|q| q.get("x")), Some("1"));
    assert_eq!(args.body(), Some(&b"raw"[..]));
    assert!(matches!(args.get("method"), Some(Bound::Method(m)) if *m == Method::GET));
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct NewPet {
    name: String,
    age: u32,
}

#[test]
fn test_model_body_is_decoded_and_rejected_when_malformed() {
    let params = [ParameterDescriptor::new("pet", ParamType::Model(ModelSpec::of::<NewPet>()))];

    let ok = Request::new(Method::POST, "/pets")
        .unwrap()
        .with_body(br#"{"name":"Rex","age":3}"#.to_vec());
    let args = resolve_params(&params, &ok, &no_route_params(), &Dependencies::new()).unwrap();
    assert_eq!(
        args.get_as::<NewPet>("pet").unwrap(),
        NewPet {
            name: "Rex".into(),
            age: 3
        }
    );

    let bad = Request::new(Method::POST, "/pets")
        .unwrap()
        .with_body(br#"{"name":"Rex"}"#.to_vec());
    let err = resolve_params(&params, &bad, &no_route_params(), &Dependencies::new()).unwrap_err();
    assert!(matches!(err, BindError::InvalidRequestBody { ref name, .. } if name == "pet"));
}

#[test]
fn test_schema_model_validation() {
    let schema = json!({
        "type": "object",
        "required": ["email"],
        "properties": { "email": { "type": "string" } }
    });
    let model = ModelSpec::from_schema("Signup", &schema).unwrap();
    let params = [ParameterDescriptor::body("signup", ParamType::Model(model))];

    let bad = Request::new(Method::POST, "/signup")
        .unwrap()
        .with_body(br#"{"email": 5}"#.to_vec());
    assert!(resolve_params(&params, &bad, &no_route_params(), &Dependencies::new()).is_err());

    let good = Request::new(Method::POST, "/signup")
        .unwrap()
        .with_body(br#"{"email": "a@b.c"}"#.to_vec());
    let args = resolve_params(&params, &good, &no_route_params(), &Dependencies::new()).unwrap();
    assert_eq!(args.value("signup"), Some(&json!({"email": "a@b.c"})));
}

#[test]
fn test_custom_type_uses_its_parser() {
    let upper = ParamType::custom("Upper", |raw| Ok(json!(raw.to_uppercase())));
    let params = [ParameterDescriptor::query("code", upper)];
    let args = resolve_params(
        &params,
        &get("/?code=abc"),
        &no_route_params(),
        &Dependencies::new(),
    )
    .unwrap();
    assert_eq!(args.value("code"), Some(&json!("ABC")));
}
