#![allow(dead_code)]

use brrtdispatch::dispatcher::Dispatcher;
use brrtdispatch::router::RouterBuilder;
use brrtdispatch::runtime_config::RuntimeConfig;
use brrtdispatch::server::{Request, Response};
use http::Method;
use serde_json::Value;

/// Build an application from `builder` with the default runtime config.
pub fn dispatcher(builder: RouterBuilder) -> Dispatcher {
    Dispatcher::new(builder.build().unwrap(), RuntimeConfig::default())
}

pub fn request(method: Method, target: &str) -> Request {
    Request::new(method, target).unwrap()
}

pub fn get(target: &str) -> Request {
    request(Method::GET, target)
}

pub fn body_text(resp: &Response) -> String {
    String::from_utf8(resp.body_bytes().unwrap().to_vec()).unwrap()
}

pub fn body_json(resp: &Response) -> Value {
    serde_json::from_slice(resp.body_bytes().unwrap()).unwrap()
}

/// Dispatch and unwrap, for requests that are expected to be handled.
pub async fn send(dispatcher: &Dispatcher, req: Request) -> Response {
    match dispatcher.handle(req).await {
        Ok(resp) => resp,
        Err(e) => panic!("unexpected dispatch error: {e}"),
    }
}
