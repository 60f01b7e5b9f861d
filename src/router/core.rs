//! Route table and request matching.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::Method;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{debug, warn};

use crate::dependency::RouterId;
use crate::error::ConfigError;
use crate::handler::{ExceptionHandler, HandlerDescriptor};
use crate::params::route_param_names;
use crate::server::{Headers, PathParams, Response};

static NEXT_ROUTE_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Opaque handle returned when a route is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteHandle(u64);

impl RouteHandle {
    pub(crate) fn next() -> Self {
        RouteHandle(NEXT_ROUTE_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-route registration options.
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Cache the first successful response and serve it for every later request.
    pub is_const: bool,
    /// `None` inherits the router default.
    pub auth_required: Option<bool>,
    /// Documentation tags.
    pub tags: Vec<String>,
    /// `None` falls back to the router, then application default.
    pub exception_handler: Option<ExceptionHandler>,
}

impl RouteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    #[must_use]
    pub fn auth(mut self, required: bool) -> Self {
        self.auth_required = Some(required);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn on_exception(mut self, handler: ExceptionHandler) -> Self {
        self.exception_handler = Some(handler);
        self
    }
}

impl std::fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOptions")
            .field("is_const", &self.is_const)
            .field("auth_required", &self.auth_required)
            .field("tags", &self.tags)
            .field("exception_handler", &self.exception_handler.is_some())
            .finish()
    }
}

/// A buffered response kept for const routes.
#[derive(Debug, Clone)]
pub(crate) struct CachedResponse {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    file_path: Option<PathBuf>,
}

impl CachedResponse {
    pub(crate) fn capture(resp: &Response) -> Option<Self> {
        Some(Self {
            status: resp.status,
            headers: resp.headers.clone(),
            body: resp.body_bytes()?.to_vec(),
            file_path: resp.file_path.clone(),
        })
    }

    pub(crate) fn to_response(&self) -> Response {
        let mut resp = Response::new(self.status, self.headers.clone(), self.body.clone());
        resp.file_path = self.file_path.clone();
        resp
    }
}

/// A registered route. Immutable once the application is built.
pub struct Route {
    pub method: Method,
    /// Full pattern including every router prefix, e.g. `/api/users/:id`.
    pub pattern: Arc<str>,
    pub handler: HandlerDescriptor,
    pub is_const: bool,
    pub auth_required: bool,
    pub tags: Vec<String>,
    pub router_id: RouterId,
    pub handle: RouteHandle,
    pub exception_handler: Option<ExceptionHandler>,
    param_names: HashSet<String>,
    regex: Regex,
    capture_names: Vec<Arc<str>>,
    is_static: bool,
    const_response: OnceCell<CachedResponse>,
}

impl Route {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern cannot be compiled.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        method: Method,
        pattern: &str,
        handler: HandlerDescriptor,
        options: RouteOptions,
        auth_required: bool,
        router_id: RouterId,
        handle: RouteHandle,
    ) -> Result<Self, ConfigError> {
        let (regex, capture_names) = path_to_regex(pattern)?;
        Ok(Self {
            method,
            pattern: Arc::from(pattern),
            handler,
            is_const: options.is_const,
            auth_required,
            tags: options.tags,
            router_id,
            handle,
            exception_handler: options.exception_handler,
            param_names: route_param_names(pattern),
            is_static: capture_names.is_empty(),
            regex,
            capture_names,
            const_response: OnceCell::new(),
        })
    }

    /// `:name` tokens declared by the pattern.
    #[must_use]
    pub fn param_names(&self) -> &HashSet<String> {
        &self.param_names
    }

    /// Extract path params when `path` matches this route.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        let mut params = PathParams::new();
        for (i, name) in self.capture_names.iter().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                let value = urlencoding::decode(m.as_str())
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| m.as_str().to_string());
                params.insert(name, value);
            }
        }
        Some(params)
    }

    pub(crate) fn cached_response(&self) -> Option<Response> {
        self.const_response.get().map(CachedResponse::to_response)
    }

    /// Remember `resp` for a const route. Streaming responses are never cached.
    pub(crate) fn cache_response(&self, resp: &Response) {
        if let Some(cached) = CachedResponse::capture(resp) {
            self.const_response.get_or_init(|| cached);
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("handler", &self.handler.name)
            .field("is_const", &self.is_const)
            .field("auth_required", &self.auth_required)
            .field("tags", &self.tags)
            .finish()
    }
}

/// A matched route with the path params it captured.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub path_params: PathParams,
}

/// Where a request should go.
#[derive(Debug, Clone)]
pub enum Target {
    /// A `GET`/`HEAD` under a registered static prefix; served by the static-file
    /// collaborator.
    Static { prefix: String },
    Route(RouteMatch),
    NotFound,
}

/// Read-only table of compiled routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    static_prefixes: Vec<String>,
}

impl RouteTable {
    pub(crate) fn new(routes: Vec<Arc<Route>>, static_prefixes: Vec<String>) -> Self {
        Self {
            routes,
            static_prefixes,
        }
    }

    /// Every registered route, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn static_prefixes(&self) -> &[String] {
        &self.static_prefixes
    }

    #[must_use]
    pub fn by_handle(&self, handle: RouteHandle) -> Option<&Arc<Route>> {
        self.routes.iter().find(|r| r.handle == handle)
    }

    /// Match a method and path. Routes without params win over parameterized ones;
    /// otherwise registration order decides.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let candidates = || self.routes.iter().filter(|r| r.method == *method);

        let found = candidates()
            .filter(|r| r.is_static)
            .chain(candidates().filter(|r| !r.is_static))
            .find_map(|r| {
                r.matches(path).map(|path_params| RouteMatch {
                    route: Arc::clone(r),
                    path_params,
                })
            });

        match &found {
            Some(m) => debug!(
                method = %method,
                path = %path,
                route_pattern = %m.route.pattern,
                handler_name = %m.route.handler.name,
                "Route matched"
            ),
            None => warn!(method = %method, path = %path, "No route matched"),
        }
        found
    }

    /// Decide between static files and routes. Only `GET` and `HEAD` reach static
    /// prefixes; any other method falls through to route matching.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Target {
        if *method == Method::GET || *method == Method::HEAD {
            if let Some(prefix) = self
                .static_prefixes
                .iter()
                .find(|p| path_has_prefix(path, p))
            {
                return Target::Static {
                    prefix: prefix.clone(),
                };
            }
        }
        match self.route(method, path) {
            Some(m) => Target::Route(m),
            None => Target::NotFound,
        }
    }
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Join a router prefix and a route pattern.
#[must_use]
pub fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return if path.is_empty() { "/".to_string() } else { path.to_string() };
    }
    if path.is_empty() || path == "/" {
        return prefix.to_string();
    }
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

/// Compile a `:name` route pattern into an anchored regex and its capture names.
///
/// `/users/:id` becomes `^/users/([^/]+)/?$`. A parameter must occupy a whole
/// segment.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPattern`] for patterns that do not start with
/// `/`, empty or malformed parameter segments, or regex compilation failures.
pub fn path_to_regex(path: &str) -> Result<(Regex, Vec<Arc<str>>), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPattern {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if !path.starts_with('/') {
        return Err(invalid("pattern must start with '/'"));
    }

    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    let mut names = Vec::new();

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(invalid("parameter segments must be ':' followed by a name"));
            }
            pattern.push_str("/([^/]+)");
            names.push(Arc::from(name));
        } else {
            if segment.contains(':') {
                return Err(invalid("parameters must occupy a whole segment"));
            }
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    if names.is_empty() && pattern.len() == 1 {
        pattern.push('/');
    } else {
        pattern.push_str("/?");
    }
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
    Ok((regex, names))
}
