use std::sync::{Arc, Mutex};
use std::time::Duration;

use brrtdispatch::dependency::Dependencies;
use brrtdispatch::handler::HandlerDescriptor;
use brrtdispatch::middleware::{
    after_fn, before_fn, InMemoryCounterStore, Middleware, RateLimitMiddleware, TracingMiddleware,
};
use brrtdispatch::router::RouterBuilder;
use brrtdispatch::server::{Request, Response};
use futures::future::BoxFuture;
use futures::FutureExt;
use http::Method;

mod common;
use common::{body_text, dispatcher, get, send};
use tracing_util::TestTracing;

type Log = Arc<Mutex<Vec<String>>>;

/// Records both hooks under a label.
struct Recorder {
    label: &'static str,
    log: Log,
}

impl Middleware for Recorder {
    fn name(&self) -> &str {
        self.label
    }

    fn before<'a>(
        &'a self,
        _req: &'a mut Request,
        _deps: &'a Dependencies,
    ) -> BoxFuture<'a, anyhow::Result<Option<Response>>> {
        self.log.lock().unwrap().push(format!("{}:before", self.label));
        async { Ok(None) }.boxed()
    }

    fn after<'a>(
        &'a self,
        _req: &'a Request,
        _res: &'a mut Response,
        _deps: &'a Dependencies,
        _latency: Duration,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        self.log.lock().unwrap().push(format!("{}:after", self.label));
        async { Ok(()) }.boxed()
    }
}

/// Stamps a header from an injected dependency.
struct Stamp;

impl Middleware for Stamp {
    fn requires(&self) -> &[&str] {
        &["region"]
    }

    fn after<'a>(
        &'a self,
        _req: &'a Request,
        res: &'a mut Response,
        deps: &'a Dependencies,
        _latency: Duration,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            let region = deps
                .get_as::<String>("region")
                .ok_or_else(|| anyhow::anyhow!("region not injected"))?;
            res.set_header("X-Region", region.as_str());
            anyhow::Ok(())
        }
        .boxed()
    }
}

fn recorder(label: &'static str, log: &Log) -> Recorder {
    Recorder {
        label,
        log: Arc::clone(log),
    }
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_hook_order_global_then_route() {
    let _tracing = TestTracing::init();
    let log: Log = Arc::default();
    let mut app = RouterBuilder::new();
    let handler_log = Arc::clone(&log);
    app.get(
        "/items",
        HandlerDescriptor::blocking("items", move |_args| {
            handler_log.lock().unwrap().push("handler".into());
            Ok("items")
        }),
    );
    app.wrap(recorder("global", &log));
    app.route_before(Method::GET, "/items", recorder("route", &log));
    app.route_after(Method::GET, "/items", recorder("route", &log));
    app.wrap(TracingMiddleware);

    let d = dispatcher(app);
    let resp = send(&d, get("/items")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        entries(&log),
        vec![
            "global:before",
            "route:before",
            "handler",
            "route:after",
            "global:after"
        ]
    );
}

#[tokio::test]
async fn test_short_circuit_skips_handler_and_route_after() {
    let log: Log = Arc::default();
    let mut app = RouterBuilder::new();
    let handler_log = Arc::clone(&log);
    app.get(
        "/admin",
        HandlerDescriptor::blocking("admin", move |_args| {
            handler_log.lock().unwrap().push("handler".into());
            Ok("secret")
        }),
    );
    app.before_request(before_fn("maintenance", |_req: &mut Request| {
        Ok(Some(Response::text(503, "maintenance")))
    }));
    app.route_after(Method::GET, "/admin", recorder("route", &log));
    app.after_request(recorder("global", &log));

    let d = dispatcher(app);
    let resp = send(&d, get("/admin")).await;
    assert_eq!(resp.status, 503);
    assert_eq!(body_text(&resp), "maintenance");
    assert_eq!(entries(&log), vec!["global:after"]);
}

#[tokio::test]
async fn test_before_hook_can_modify_request() {
    let mut app = RouterBuilder::new();
    app.get(
        "/whoami",
        HandlerDescriptor::blocking("whoami", |args| {
            let user = args
                .request()
                .and_then(|r| r.headers.get("x-user"))
                .unwrap_or("nobody")
                .to_string();
            Ok(user)
        })
        .param(brrtdispatch::params::ParameterDescriptor::facet(
            "request",
            brrtdispatch::params::Facet::Request,
        )),
    );
    app.before_request(before_fn("inject_user", |req: &mut Request| {
        req.headers.insert("X-User", "ada");
        Ok(None)
    }));
    let d = dispatcher(app);
    assert_eq!(body_text(&send(&d, get("/whoami")).await), "ada");
}

#[tokio::test]
async fn test_after_hook_modifies_response() {
    let mut app = RouterBuilder::new();
    app.get("/", HandlerDescriptor::blocking("root", |_args| Ok("home")));
    app.after_request(after_fn("powered_by", |_req: &Request, res: &mut Response| {
        res.set_header("X-Powered-By", "brrtdispatch");
        Ok(())
    }));
    let d = dispatcher(app);
    let resp = send(&d, get("/")).await;
    assert_eq!(resp.get_header("x-powered-by"), Some("brrtdispatch"));
}

#[tokio::test]
async fn test_global_after_runs_on_unhandled_error() {
    let log: Log = Arc::default();
    let mut app = RouterBuilder::new();
    app.get(
        "/fail",
        HandlerDescriptor::blocking("fail", |_args| -> anyhow::Result<String> {
            anyhow::bail!("nope")
        }),
    );
    app.after_request(recorder("global", &log));
    let d = dispatcher(app);
    let err = d.handle(get("/fail")).await.unwrap_err();
    assert_eq!(err.response().status, 500);
    assert_eq!(entries(&log), vec!["global:after"]);
}

#[tokio::test]
async fn test_middleware_receives_declared_dependencies() {
    let mut app = RouterBuilder::new();
    app.add_global_dependency("region", String::from("eu-west"));
    app.get("/", HandlerDescriptor::blocking("root", |_args| Ok("ok")));
    app.after_request(Stamp);
    let d = dispatcher(app);
    let resp = send(&d, get("/")).await;
    assert_eq!(resp.get_header("X-Region"), Some("eu-west"));
}

#[tokio::test]
async fn test_sub_router_middleware_stays_scoped() {
    let log: Log = Arc::default();
    let mut child = RouterBuilder::with_prefix("/admin");
    child.get("/stats", HandlerDescriptor::blocking("stats", |_args| Ok("stats")));
    child.before_request(recorder("admin", &log));

    let mut app = RouterBuilder::new();
    app.get("/public", HandlerDescriptor::blocking("public", |_args| Ok("public")));
    app.include_router(child);

    let d = dispatcher(app);
    assert_eq!(send(&d, get("/public")).await.status, 200);
    assert!(entries(&log).is_empty());

    assert_eq!(send(&d, get("/admin/stats")).await.status, 200);
    assert_eq!(entries(&log), vec!["admin:before"]);
}

#[tokio::test]
async fn test_rate_limit_middleware_as_route_hook() {
    let store = Arc::new(InMemoryCounterStore::new());
    let limiter = RateLimitMiddleware::new(store.clone(), 1, Duration::from_secs(60));
    let mut app = RouterBuilder::new();
    app.post("/login", HandlerDescriptor::blocking("login", |_args| Ok("welcome")));
    app.route_before(Method::POST, "/login", limiter);
    let d = dispatcher(app);

    let login = || common::request(Method::POST, "/login").with_ip("192.0.2.1");
    assert_eq!(send(&d, login()).await.status, 200);
    let limited = send(&d, login()).await;
    assert_eq!(limited.status, 429);
    assert!(limited.get_header("Retry-After").is_some());
    assert_eq!(store.len(), 1);
}
