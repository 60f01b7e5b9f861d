//! # brrtdispatch
//!
//! **brrtdispatch** is the request dispatch core of a web framework: it takes a
//! parsed HTTP request, finds the route, binds typed handler arguments, runs the
//! middleware and authentication gates, invokes the handler and turns whatever it
//! returned into a normalized response.
//!
//! ## Overview
//!
//! The transport (socket handling, HTTP parsing, TLS) lives elsewhere. This crate
//! owns everything between "a request arrived" and "here is the response":
//!
//! - Declarative parameter binding from path, query, headers and body, with
//!   coercion to ints, floats, bools, lists, optionals and schema-checked models
//! - Named dependency injection, global or scoped to one router
//! - Before/after middleware, global or per route, with early responses
//! - Authentication gates driven by pluggable token getters
//! - Sub-router composition under a prefix
//! - Normalization of handler outputs (text, bytes, JSON maps, tuples with
//!   headers and status, streaming bodies)
//!
//! ## Architecture
//!
//! - **[`server`]** - Request and response types shared by every layer
//! - **[`params`]** - Parameter descriptors, coercion and the argument resolver
//! - **[`dependency`]** - Global and router-scoped dependency maps
//! - **[`handler`]** - Handler descriptors, blocking and async invocation
//! - **[`formatter`]** - Handler output normalization
//! - **[`sse`]** - Server-Sent Events framing
//! - **[`security`]** - Token getters and authentication handlers
//! - **[`middleware`]** - Middleware trait, chains, auth gate, rate limit, tracing
//! - **[`router`]** - Route registration, composition and matching
//! - **[`dispatcher`]** - The per-request state machine
//! - **[`runtime_config`]** / **[`logging`]** - Environment and YAML configuration,
//!   structured logging setup
//!
//! ### Request Handling Flow
//!
//! ```text
//! transport ──► Dispatcher::handle ──► RouteTable::route
//!                     │
//!                     ├─► body limit / rate limit
//!                     ├─► before middleware (global, route)
//!                     ├─► AuthGate (401 on failure)
//!                     ├─► resolve_params (400 on binding failure)
//!                     ├─► HandlerFn::invoke (blocking pool or awaited)
//!                     ├─► format_output / exception handler
//!                     └─► after middleware (route, global)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtdispatch::dispatcher::Dispatcher;
//! use brrtdispatch::handler::HandlerDescriptor;
//! use brrtdispatch::params::{ParamType, ParameterDescriptor};
//! use brrtdispatch::router::RouterBuilder;
//! use brrtdispatch::runtime_config::RuntimeConfig;
//! use brrtdispatch::server::Request;
//! use http::Method;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut app = RouterBuilder::new();
//! app.get(
//!     "/users/:id",
//!     HandlerDescriptor::blocking("get_user", |args| {
//!         let id: i64 = args.get_as("id")?;
//!         Ok(json!({ "id": id }))
//!     })
//!     .param(ParameterDescriptor::new("id", ParamType::Int)),
//! );
//!
//! let dispatcher = Dispatcher::new(app.build().unwrap(), RuntimeConfig::default());
//! let request = Request::new(Method::GET, "/users/42").unwrap();
//! let response = dispatcher.handle(request).await.unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(response.get_header("content-type"), Some("application/json"));
//! # });
//! ```
//!
//! ## Runtime Considerations
//!
//! - Blocking handlers run on tokio's blocking pool; async handlers are awaited on
//!   the calling task
//! - Handler panics are caught and treated as handler errors
//! - The route table is immutable once built and can be shared across tasks

pub mod dependency;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod params;
pub mod router;
pub mod runtime_config;
pub mod security;
pub mod server;
pub mod sse;

pub use dependency::{Dependencies, DependencyMap, RouterId};
pub use dispatcher::Dispatcher;
pub use error::{BindError, ConfigError, DispatchError, FormatError};
pub use formatter::{format_output, HandlerOutput};
pub use handler::{HandlerDescriptor, HandlerFn, HandlerResult};
pub use params::{resolve_params, Args, ParamType, ParameterDescriptor};
pub use router::{Application, RouterBuilder};
pub use server::{Request, Response};
pub use sse::sse_message;
