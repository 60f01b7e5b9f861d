use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use brrtdispatch::dispatcher::Dispatcher;
use brrtdispatch::formatter::HandlerOutput;
use brrtdispatch::handler::HandlerDescriptor;
use brrtdispatch::params::{ParamType, ParameterDescriptor};
use brrtdispatch::router::{RouteOptions, RouterBuilder};
use brrtdispatch::runtime_config::{RateLimitConfig, RuntimeConfig};
use brrtdispatch::server::{Headers, Request, Response};
use http::Method;
use serde_json::json;

mod common;
use common::{body_json, body_text, dispatcher, get, send};
use tracing_util::TestTracing;

fn user_app() -> RouterBuilder {
    let mut app = RouterBuilder::new();
    app.get(
        "/users/:id",
        HandlerDescriptor::blocking("get_user", |args| {
            let id: i64 = args.get_as("id")?;
            Ok(json!({ "id": id }))
        })
        .param(ParameterDescriptor::new("id", ParamType::Int)),
    );
    app.get(
        "/hello",
        HandlerDescriptor::blocking("hello", |args| {
            let name: String = args.get_as("name")?;
            Ok(format!("hello {name}"))
        })
        .param(ParameterDescriptor::new("name", ParamType::Str)),
    );
    app
}

#[tokio::test]
async fn test_path_param_bound_as_integer() {
    let _tracing = TestTracing::init();
    let d = dispatcher(user_app());
    let resp = send(&d, get("/users/42")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("Content-Type"), Some("application/json"));
    assert_eq!(body_json(&resp), json!({ "id": 42 }));
}

#[tokio::test]
async fn test_non_integer_path_param_is_400() {
    let d = dispatcher(user_app());
    let resp = send(&d, get("/users/abc")).await;
    assert_eq!(resp.status, 400);
    let body = body_json(&resp);
    assert_eq!(body["error"], "invalid_parameter_value");
    assert_eq!(body["parameter"], "id");
}

#[tokio::test]
async fn test_missing_query_param_is_400() {
    let d = dispatcher(user_app());
    let resp = send(&d, get("/hello")).await;
    assert_eq!(resp.status, 400);
    let body = body_json(&resp);
    assert_eq!(body["error"], "missing_parameter");
    assert_eq!(body["parameter"], "name");

    let resp = send(&d, get("/hello?name=ada")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "hello ada");
    assert_eq!(resp.get_header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let d = dispatcher(user_app());
    let resp = send(&d, get("/nope")).await;
    assert_eq!(resp.status, 404);

    let resp = send(&d, Request::new(Method::POST, "/users/1").unwrap()).await;
    assert_eq!(resp.status, 404);
}

#[tokio::test]
async fn test_handle_raw_builds_request() {
    let d = dispatcher(user_app());
    let resp = d
        .handle_raw(Method::GET, "/users/7?x=1", Headers::new(), Vec::new())
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(body_json(&resp), json!({ "id": 7 }));
}

#[tokio::test]
async fn test_async_handler_and_tuple_output() {
    let mut app = RouterBuilder::new();
    app.post(
        "/export",
        HandlerDescriptor::asynchronous("export", |_args| async {
            let headers = Headers::from_pairs([("Content-Type", "text/csv")]);
            Ok((b"x".to_vec(), headers, 201_u16))
        }),
    );
    let d = dispatcher(app);
    let resp = send(&d, Request::new(Method::POST, "/export").unwrap()).await;
    assert_eq!(resp.status, 201);
    assert_eq!(resp.get_header("content-type"), Some("text/csv"));
    assert_eq!(resp.body_bytes(), Some(&b"x"[..]));
}

#[tokio::test]
async fn test_unhandled_error_returns_dispatch_error_with_500() {
    let mut app = RouterBuilder::new();
    app.get(
        "/boom",
        HandlerDescriptor::blocking("boom", |_args| -> anyhow::Result<String> {
            anyhow::bail!("database unavailable")
        }),
    );
    let d = dispatcher(app);
    let err = d.handle(get("/boom")).await.unwrap_err();
    assert!(err.to_string().contains("database unavailable"));
    assert_eq!(err.response().status, 500);
}

#[tokio::test]
async fn test_handler_panic_is_an_error() {
    let mut app = RouterBuilder::new();
    app.get(
        "/panic",
        HandlerDescriptor::blocking("panic", |_args| -> anyhow::Result<String> {
            panic!("handler exploded")
        }),
    );
    let d = dispatcher(app);
    let err = d.handle(get("/panic")).await.unwrap_err();
    assert!(err.error().to_string().contains("handler exploded"));
    assert_eq!(err.into_response().status, 500);
}

#[tokio::test]
async fn test_exception_handler_recovers() {
    let mut app = RouterBuilder::new();
    app.exception_handler(Arc::new(|e: &anyhow::Error| {
        HandlerOutput::with_parts(format!("recovered: {e}"), Headers::new(), 503)
    }));
    app.get(
        "/flaky",
        HandlerDescriptor::blocking("flaky", |_args| -> anyhow::Result<String> {
            anyhow::bail!("upstream timeout")
        }),
    );
    let d = dispatcher(app);
    let resp = send(&d, get("/flaky")).await;
    assert_eq!(resp.status, 503);
    assert_eq!(body_text(&resp), "recovered: upstream timeout");
}

#[tokio::test]
async fn test_route_exception_handler_overrides_app_default() {
    let mut app = RouterBuilder::new();
    app.exception_handler(Arc::new(|_e: &anyhow::Error| HandlerOutput::from("app")));
    app.route(
        Method::GET,
        "/own",
        HandlerDescriptor::blocking("own", |_args| -> anyhow::Result<String> {
            anyhow::bail!("x")
        }),
        RouteOptions::new().on_exception(Arc::new(|_e: &anyhow::Error| HandlerOutput::from("route"))),
    );
    let d = dispatcher(app);
    let resp = send(&d, get("/own")).await;
    assert_eq!(body_text(&resp), "route");
}

#[tokio::test]
async fn test_const_route_invokes_handler_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut app = RouterBuilder::new();
    app.route(
        Method::GET,
        "/version",
        HandlerDescriptor::blocking("version", move |_args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("1.0.0")
        }),
        RouteOptions::new().constant(),
    );
    let d = dispatcher(app);
    for _ in 0..3 {
        let resp = send(&d, get("/version")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(body_text(&resp), "1.0.0");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let mut app = RouterBuilder::new();
    app.post(
        "/upload",
        HandlerDescriptor::blocking("upload", |_args| Ok("stored")),
    );
    let config = RuntimeConfig {
        max_body_bytes: 8,
        ..RuntimeConfig::default()
    };
    let d = Dispatcher::new(app.build().unwrap(), config);

    let small = Request::new(Method::POST, "/upload").unwrap().with_body(b"tiny".to_vec());
    assert_eq!(send(&d, small).await.status, 200);

    let big = Request::new(Method::POST, "/upload")
        .unwrap()
        .with_body(vec![b'a'; 64]);
    assert_eq!(send(&d, big).await.status, 413);
}

#[tokio::test]
async fn test_rate_limit_from_config() {
    let mut app = RouterBuilder::new();
    app.get("/ping", HandlerDescriptor::blocking("ping", |_args| Ok("pong")));
    let config = RuntimeConfig {
        rate_limit: Some(RateLimitConfig {
            calls_limit: 2,
            limit_ttl_secs: 60,
        }),
        ..RuntimeConfig::default()
    };
    let d = Dispatcher::new(app.build().unwrap(), config);

    let statuses: Vec<u16> = {
        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(send(&d, get("/ping").with_ip("10.0.0.1")).await.status);
        }
        out
    };
    assert_eq!(statuses, vec![200, 200, 429]);

    // Separate client, separate window
    assert_eq!(send(&d, get("/ping").with_ip("10.0.0.2")).await.status, 200);
}

#[tokio::test]
async fn test_response_passthrough_keeps_status() {
    let mut app = RouterBuilder::new();
    app.get(
        "/teapot",
        HandlerDescriptor::blocking("teapot", |_args| Ok(Response::text(418, "short and stout"))),
    );
    let d = dispatcher(app);
    let resp = send(&d, get("/teapot")).await;
    assert_eq!(resp.status, 418);
    assert_eq!(body_text(&resp), "short and stout");
}
