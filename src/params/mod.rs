//! # Parameters Module
//!
//! Declared handler parameters and their binding from a request.
//!
//! A handler registers an explicit table of [`ParameterDescriptor`]s. At dispatch
//! time [`resolve_params`] walks that table against the request, the matched
//! route's `:name` tokens and the handler's consumed dependencies, and produces
//! [`Args`]. Missing and invalid values fail with distinct [`BindError`] variants.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::params::{ParamType, ParameterDescriptor};
//!
//! let params = vec![
//!     ParameterDescriptor::new("id", ParamType::Int),
//!     ParameterDescriptor::query("tags", ParamType::list(ParamType::Str)),
//!     ParameterDescriptor::header("user_agent", ParamType::optional(ParamType::Str)),
//! ];
//! assert!(params[0].is_required());
//! ```
//!
//! [`BindError`]: crate::error::BindError

pub mod coerce;
pub mod descriptor;
pub mod pattern;
pub mod resolver;

pub use coerce::{coerce_value, parse_bool};
pub use descriptor::{Facet, ModelSpec, ParamSource, ParamType, ParameterDescriptor};
pub use pattern::{route_param_list, route_param_names};
pub use resolver::{resolve_params, Args, Bound};
