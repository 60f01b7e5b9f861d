//! Parameter resolution: turns a handler's parameter table and a request into
//! bound arguments.
//!
//! # Precedence
//!
//! For each declared parameter, the first rule that applies wins:
//!
//! 1. Facet types bind the whole request facet.
//! 2. `Dependency` parameters bind from the consumed dependencies and nothing else.
//! 3. Body parameters (explicit `Body`, or a `Model` type without an explicit
//!    source) decode the request body.
//! 4. Path parameters: explicit `Path`, or a name declared as `:name` in the route.
//! 5. Header parameters (explicit `Header` only).
//! 6. Everything else comes from the query string.
//!
//! When no raw value is found, a consumed dependency with the same name binds, then
//! the default applies, then `Optional` yields `null`, and otherwise binding fails
//! with [`BindError::MissingParameter`].

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::coerce::{coerce_list, coerce_value};
use super::descriptor::{Facet, ParamSource, ParamType, ParameterDescriptor};
use crate::dependency::{Dependencies, Dependency};
use crate::error::BindError;
use crate::server::{Headers, Identity, PathParams, QueryParams, Request};

/// One bound argument.
#[derive(Debug, Clone)]
pub enum Bound {
    /// A coerced scalar, list, model or default value.
    Value(Value),
    Request(Box<Request>),
    QueryParams(QueryParams),
    Headers(Headers),
    PathParams(PathParams),
    Body(Vec<u8>),
    Method(Method),
    Url(Url),
    Identity(Option<Identity>),
    FormData(HashMap<String, String>),
    Files(HashMap<String, Vec<u8>>),
    Dependency(Dependency),
}

/// Arguments handed to a handler, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: HashMap<String, Bound>,
}

impl Args {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bound: Bound) {
        self.values.insert(name.into(), bound);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Bound> {
        self.values.get(name)
    }

    /// The JSON value bound to `name`, if it was bound as a value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.values.get(name)? {
            Bound::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Deserialize the value bound to `name` into `T`.
    ///
    /// # Errors
    ///
    /// Fails if `name` is unbound, not a value, or does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self
            .value(name)
            .ok_or_else(|| anyhow::anyhow!("argument '{name}' is not bound to a value"))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Downcast the dependency bound to `name`.
    #[must_use]
    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name)? {
            Bound::Dependency(dep) => Arc::clone(dep).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// The first argument bound to the whole request.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        self.values.values().find_map(|b| match b {
            Bound::Request(r) => Some(r.as_ref()),
            _ => None,
        })
    }

    #[must_use]
    pub fn headers(&self) -> Option<&Headers> {
        self.values.values().find_map(|b| match b {
            Bound::Headers(h) => Some(h),
            _ => None,
        })
    }

    #[must_use]
    pub fn query_params(&self) -> Option<&QueryParams> {
        self.values.values().find_map(|b| match b {
            Bound::QueryParams(q) => Some(q),
            _ => None,
        })
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.values.values().find_map(|b| match b {
            Bound::Identity(i) => i.as_ref(),
            _ => None,
        })
    }

    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.values.values().find_map(|b| match b {
            Bound::Body(bytes) => Some(bytes.as_slice()),
            _ => None,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bind every declared parameter of a handler.
///
/// `route_params` is the set of `:name` tokens of the matched route pattern;
/// `dependencies` is the subset the handler consumes.
///
/// # Errors
///
/// Returns the first [`BindError`] encountered, in declaration order.
pub fn resolve_params(
    params: &[ParameterDescriptor],
    request: &Request,
    route_params: &HashSet<String>,
    dependencies: &Dependencies,
) -> Result<Args, BindError> {
    let mut args = Args::new();
    for param in params {
        let bound = resolve_one(param, request, route_params, dependencies)?;
        args.insert(param.name.clone(), bound);
    }
    Ok(args)
}

fn resolve_one(
    param: &ParameterDescriptor,
    request: &Request,
    route_params: &HashSet<String>,
    dependencies: &Dependencies,
) -> Result<Bound, BindError> {
    if let Some(facet) = param.ty.facet() {
        return Ok(bind_facet(facet, request));
    }

    if param.source == ParamSource::Dependency {
        return match dependencies.get(&param.name) {
            Some(dep) => Ok(Bound::Dependency(Arc::clone(dep))),
            None => fallback(param).map(Bound::Value),
        };
    }

    let inner = param.ty.unwrap_optional();
    let is_body = param.source == ParamSource::Body
        || (param.source == ParamSource::Auto && matches!(inner, ParamType::Model(_)));

    let found = if is_body {
        bind_body(param, inner, &request.body)?
    } else {
        match param.source {
            ParamSource::Path => bind_path(param, request)?,
            ParamSource::Auto if route_params.contains(&param.name) => bind_path(param, request)?,
            ParamSource::Header { .. } => bind_header(param, inner, &request.headers)?,
            _ => bind_query(param, inner, &request.query_params)?,
        }
    };

    match found {
        Some(value) => Ok(Bound::Value(value)),
        None => match dependencies.get(&param.name) {
            Some(dep) => Ok(Bound::Dependency(Arc::clone(dep))),
            None => fallback(param).map(Bound::Value),
        },
    }
}

fn bind_facet(facet: Facet, request: &Request) -> Bound {
    match facet {
        Facet::Request => Bound::Request(Box::new(request.clone())),
        Facet::QueryParams => Bound::QueryParams(request.query_params.clone()),
        Facet::Headers => Bound::Headers(request.headers.clone()),
        Facet::PathParams => Bound::PathParams(request.path_params.clone()),
        Facet::Body => Bound::Body(request.body.clone()),
        Facet::Method => Bound::Method(request.method.clone()),
        Facet::Url => Bound::Url(request.url.clone()),
        Facet::Identity => Bound::Identity(request.identity.clone()),
        Facet::FormData => Bound::FormData(request.form_data.clone()),
        Facet::Files => Bound::Files(request.files.clone()),
    }
}

fn bind_path(param: &ParameterDescriptor, request: &Request) -> Result<Option<Value>, BindError> {
    request
        .path_params
        .get(&param.name)
        .map(|raw| coerce_value(raw, &param.ty, &param.name))
        .transpose()
}

fn bind_query(
    param: &ParameterDescriptor,
    inner: &ParamType,
    query: &QueryParams,
) -> Result<Option<Value>, BindError> {
    let key = param.lookup_key();
    if let ParamType::List(item) = inner {
        return query
            .get_all(key)
            .map(|raws| coerce_list(raws, item, &param.name))
            .transpose();
    }
    query
        .get(key)
        .map(|raw| coerce_value(raw, inner, &param.name))
        .transpose()
}

fn bind_header(
    param: &ParameterDescriptor,
    inner: &ParamType,
    headers: &Headers,
) -> Result<Option<Value>, BindError> {
    let key = param.header_key();
    if let ParamType::List(item) = inner {
        return headers
            .get_all(&key)
            .map(|raws| coerce_list(raws, item, &param.name))
            .transpose();
    }
    headers
        .get(&key)
        .map(|raw| coerce_value(raw, inner, &param.name))
        .transpose()
}

fn bind_body(
    param: &ParameterDescriptor,
    inner: &ParamType,
    body: &[u8],
) -> Result<Option<Value>, BindError> {
    if body.is_empty() {
        return Ok(None);
    }
    let invalid = |reason: String| BindError::InvalidRequestBody {
        name: param.name.clone(),
        reason,
    };
    match inner {
        ParamType::Model(model) => {
            let decoded: Value = serde_json::from_slice(body).map_err(|e| invalid(e.to_string()))?;
            model.validate(&decoded).map(Some).map_err(invalid)
        }
        ParamType::Any => {
            serde_json::from_slice(body)
                .map(Some)
                .map_err(|e| invalid(e.to_string()))
        }
        other => {
            let text = std::str::from_utf8(body).map_err(|e| invalid(e.to_string()))?;
            coerce_value(text, other, &param.name).map(Some)
        }
    }
}

fn fallback(param: &ParameterDescriptor) -> Result<Value, BindError> {
    if let Some(default) = &param.default {
        return Ok(default.clone());
    }
    if param.ty.is_optional() {
        return Ok(Value::Null);
    }
    Err(BindError::MissingParameter {
        name: param.name.clone(),
        expected: param.ty.type_name(),
    })
}
