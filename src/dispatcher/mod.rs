//! # Dispatcher Module
//!
//! Drives a single request through a built [`crate::router::Application`].
//!
//! ## Overview
//!
//! The dispatcher is the glue between the transport and the handlers. For each
//! request it:
//! - Matches the route and records its path parameters
//! - Enforces the body size limit and the optional rate limit
//! - Runs global and route-scoped before hooks, then the auth gate
//! - Binds handler arguments and invokes the handler
//! - Formats the handler output into a [`crate::server::Response`]
//! - Lets the route's exception handler recover failures
//! - Runs after hooks with the measured latency
//!
//! ## Request Flow
//!
//! 1. [`Dispatcher::handle`] looks up the route, `404` if none
//! 2. Body limit → `413`, rate limit → `429`
//! 3. Before hooks may return an early response; errors go to the exception handler
//! 4. Auth gate attaches the identity or answers `401`
//! 5. Const routes answer from their cached response after the first success
//! 6. Binding failures answer `400` with a JSON body naming the parameter
//! 7. Handler and formatter errors go to the exception handler, else `500`
//! 8. After hooks, route-scoped first, then global ones
//!
//! ## Error Handling
//!
//! An error no exception handler recovers is returned as
//! [`crate::error::DispatchError`], which carries the `500` response so the
//! transport can still answer.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::dispatcher::Dispatcher;
//! use brrtdispatch::handler::HandlerDescriptor;
//! use brrtdispatch::params::{ParamType, ParameterDescriptor};
//! use brrtdispatch::router::RouterBuilder;
//! use brrtdispatch::runtime_config::RuntimeConfig;
//! use brrtdispatch::server::Request;
//! use http::Method;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut app = RouterBuilder::new();
//! app.get(
//!     "/hello/:name",
//!     HandlerDescriptor::blocking("hello", |args| {
//!         let name: String = args.get_as("name")?;
//!         Ok(format!("hello {name}"))
//!     })
//!     .param(ParameterDescriptor::new("name", ParamType::Str)),
//! );
//! let dispatcher = Dispatcher::new(app.build().unwrap(), RuntimeConfig::default());
//! let response = dispatcher
//!     .handle(Request::new(Method::GET, "/hello/world").unwrap())
//!     .await
//!     .unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body_bytes(), Some(&b"hello world"[..]));
//! # });
//! ```

mod core;

pub use core::Dispatcher;
