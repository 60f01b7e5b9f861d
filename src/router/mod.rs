//! # Router Module
//!
//! Route registration, composition and matching.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Collecting routes, dependencies, middleware and authentication through a
//!   [`RouterBuilder`]
//! - Composing sub-routers under a prefix, resolving which routes require auth
//! - Compiling `:name` patterns and matching incoming paths
//! - Deciding between static-file prefixes and routes
//!
//! ## Architecture
//!
//! 1. **Registration**: handlers are registered with an explicit parameter table
//!    and get back an opaque [`RouteHandle`].
//! 2. **Build**: [`RouterBuilder::build`] checks the configuration (duplicate
//!    routes, auth without a handler, bad patterns), computes each handler's
//!    consumed dependencies and freezes everything into an [`Application`].
//! 3. **Matching**: [`RouteTable::route`] tests the request path against the
//!    compiled patterns, preferring routes without parameters.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::handler::HandlerDescriptor;
//! use brrtdispatch::params::{ParamType, ParameterDescriptor};
//! use brrtdispatch::router::RouterBuilder;
//! use http::Method;
//!
//! let mut app = RouterBuilder::new();
//! app.get(
//!     "/users/:id",
//!     HandlerDescriptor::blocking("get_user", |args| {
//!         let id: i64 = args.get_as("id")?;
//!         Ok(format!("user {id}"))
//!     })
//!     .param(ParameterDescriptor::new("id", ParamType::Int)),
//! );
//! let app = app.build().unwrap();
//! let matched = app.table().route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(matched.path_params.get("id"), Some("42"));
//! ```

mod builder;
mod core;

pub use builder::{Application, RouterBuilder};
pub use core::{
    join_path, path_to_regex, Route, RouteHandle, RouteMatch, RouteOptions, RouteTable, Target,
};
