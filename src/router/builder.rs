//! Registration API.
//!
//! Routes, dependencies, middleware and authentication are collected by a
//! [`RouterBuilder`] and frozen by [`RouterBuilder::build`] into an
//! [`Application`]. Sub-routers are composed with
//! [`RouterBuilder::include_router`].

use std::collections::HashSet;
use std::sync::Arc;

use http::Method;
use tracing::info;

use super::core::{join_path, Route, RouteHandle, RouteOptions, RouteTable};
use crate::dependency::{DependencyMap, RouterId};
use crate::error::ConfigError;
use crate::handler::{ExceptionHandler, HandlerDescriptor};
use crate::middleware::{
    AuthGate, Middleware, MiddlewareChain, MiddlewareEntry, MiddlewareScope, Phase,
};
use crate::security::AuthenticationHandler;

struct PendingRoute {
    method: Method,
    pattern: String,
    handler: HandlerDescriptor,
    options: RouteOptions,
    router_id: RouterId,
    handle: RouteHandle,
}

/// Collects routes and everything around them.
pub struct RouterBuilder {
    id: RouterId,
    prefix: String,
    auth_default: Option<bool>,
    routes: Vec<PendingRoute>,
    dependencies: DependencyMap,
    middleware: MiddlewareChain,
    authentication: Option<Arc<dyn AuthenticationHandler>>,
    exception_handler: Option<ExceptionHandler>,
    static_prefixes: Vec<String>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: RouterId::next(),
            prefix: String::new(),
            auth_default: None,
            routes: Vec::new(),
            dependencies: DependencyMap::new(),
            middleware: MiddlewareChain::new(),
            authentication: None,
            exception_handler: None,
            static_prefixes: Vec::new(),
        }
    }

    /// A router whose patterns are all mounted under `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        let mut builder = Self::new();
        builder.prefix = prefix.trim_end_matches('/').to_string();
        builder
    }

    /// Whether this router's routes require auth when they do not say so.
    #[must_use]
    pub fn auth_default(mut self, required: bool) -> Self {
        self.auth_default = Some(required);
        self
    }

    #[must_use]
    pub fn id(&self) -> RouterId {
        self.id
    }

    /// Register a route and get its handle.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: HandlerDescriptor,
        options: RouteOptions,
    ) -> RouteHandle {
        let handle = RouteHandle::next();
        self.routes.push(PendingRoute {
            method,
            pattern: join_path(&self.prefix, pattern),
            handler,
            options,
            router_id: self.id,
            handle,
        });
        handle
    }

    pub fn get(&mut self, pattern: &str, handler: HandlerDescriptor) -> RouteHandle {
        self.route(Method::GET, pattern, handler, RouteOptions::default())
    }

    pub fn post(&mut self, pattern: &str, handler: HandlerDescriptor) -> RouteHandle {
        self.route(Method::POST, pattern, handler, RouteOptions::default())
    }

    pub fn put(&mut self, pattern: &str, handler: HandlerDescriptor) -> RouteHandle {
        self.route(Method::PUT, pattern, handler, RouteOptions::default())
    }

    pub fn patch(&mut self, pattern: &str, handler: HandlerDescriptor) -> RouteHandle {
        self.route(Method::PATCH, pattern, handler, RouteOptions::default())
    }

    pub fn delete(&mut self, pattern: &str, handler: HandlerDescriptor) -> RouteHandle {
        self.route(Method::DELETE, pattern, handler, RouteOptions::default())
    }

    pub fn head(&mut self, pattern: &str, handler: HandlerDescriptor) -> RouteHandle {
        self.route(Method::HEAD, pattern, handler, RouteOptions::default())
    }

    pub fn options(&mut self, pattern: &str, handler: HandlerDescriptor) -> RouteHandle {
        self.route(Method::OPTIONS, pattern, handler, RouteOptions::default())
    }

    pub fn add_global_dependency<T>(&mut self, name: &str, value: T)
    where
        T: std::any::Any + Send + Sync,
    {
        self.dependencies.add_global(name, value);
    }

    /// A dependency visible only to this router's routes and middleware.
    pub fn add_router_dependency<T>(&mut self, name: &str, value: T)
    where
        T: std::any::Any + Send + Sync,
    {
        self.dependencies.add_router(self.id, name, value);
    }

    fn push_middleware(
        &mut self,
        scope: MiddlewareScope,
        phase: Phase,
        middleware: Arc<dyn Middleware>,
    ) {
        self.middleware
            .push(MiddlewareEntry::new(scope, phase, middleware, self.id));
    }

    /// Runs before every route, in registration order.
    pub fn before_request(&mut self, middleware: impl Middleware + 'static) {
        self.push_middleware(MiddlewareScope::Global, Phase::Before, Arc::new(middleware));
    }

    /// Runs after every route, including short-circuited and failed requests.
    pub fn after_request(&mut self, middleware: impl Middleware + 'static) {
        self.push_middleware(MiddlewareScope::Global, Phase::After, Arc::new(middleware));
    }

    /// Registers both hooks of `middleware` globally.
    pub fn wrap(&mut self, middleware: impl Middleware + 'static) {
        self.push_middleware(MiddlewareScope::Global, Phase::Both, Arc::new(middleware));
    }

    /// Runs before one route only.
    pub fn route_before(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: impl Middleware + 'static,
    ) {
        let path = join_path(&self.prefix, pattern);
        self.push_middleware(
            MiddlewareScope::Route { method, path },
            Phase::Before,
            Arc::new(middleware),
        );
    }

    /// Runs after one route only.
    pub fn route_after(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: impl Middleware + 'static,
    ) {
        let path = join_path(&self.prefix, pattern);
        self.push_middleware(
            MiddlewareScope::Route { method, path },
            Phase::After,
            Arc::new(middleware),
        );
    }

    pub fn configure_authentication(&mut self, handler: impl AuthenticationHandler + 'static) {
        self.authentication = Some(Arc::new(handler));
    }

    /// Default exception handler for routes that do not set their own.
    pub fn exception_handler(&mut self, handler: ExceptionHandler) {
        self.exception_handler = Some(handler);
    }

    /// Paths under `prefix` are served by the static-file collaborator for
    /// `GET` and `HEAD`.
    pub fn static_prefix(&mut self, prefix: &str) {
        self.static_prefixes.push(join_path(&self.prefix, prefix));
    }

    /// Mount every route of `child` under this router's prefix.
    ///
    /// Child routes without an explicit auth flag take the child's default; child
    /// global middleware becomes route middleware for the child's routes only;
    /// child dependencies are merged without overwriting ours.
    pub fn include_router(&mut self, child: RouterBuilder) {
        let RouterBuilder {
            id: child_id,
            prefix: _,
            auth_default: child_auth,
            routes,
            dependencies,
            middleware,
            authentication,
            exception_handler,
            static_prefixes,
        } = child;

        let child_routes: Vec<(Method, String)> = routes
            .iter()
            .map(|r| (r.method.clone(), join_path(&self.prefix, &r.pattern)))
            .collect();

        for entry in middleware.into_entries() {
            match &entry.scope {
                MiddlewareScope::Global => {
                    for (method, path) in &child_routes {
                        self.middleware.push(MiddlewareEntry::new(
                            MiddlewareScope::Route {
                                method: method.clone(),
                                path: path.clone(),
                            },
                            entry.phase,
                            Arc::clone(&entry.middleware),
                            entry.router_id,
                        ));
                    }
                }
                MiddlewareScope::Route { method, path } => {
                    self.middleware.push(MiddlewareEntry::new(
                        MiddlewareScope::Route {
                            method: method.clone(),
                            path: join_path(&self.prefix, path),
                        },
                        entry.phase,
                        Arc::clone(&entry.middleware),
                        entry.router_id,
                    ));
                }
            }
        }

        for mut route in routes {
            route.pattern = join_path(&self.prefix, &route.pattern);
            if route.options.auth_required.is_none() {
                route.options.auth_required = child_auth;
            }
            if route.options.exception_handler.is_none() {
                route.options.exception_handler = exception_handler.clone();
            }
            self.routes.push(route);
        }

        dependencies.merge_into(&mut self.dependencies);

        if self.authentication.is_none() {
            self.authentication = authentication;
        }
        self.static_prefixes.extend(
            static_prefixes
                .iter()
                .map(|p| join_path(&self.prefix, p)),
        );

        info!(
            router_id = ?child_id,
            prefix = %self.prefix,
            routes_count = child_routes.len(),
            "Sub-router included"
        );
    }

    /// Freeze the registration into an application.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AuthenticationNotConfigured`] when a route requires auth and
    ///   no authentication handler is configured.
    /// - [`ConfigError::DuplicateRoute`] for a repeated method and pattern.
    /// - [`ConfigError::InvalidPattern`] for a pattern that does not compile.
    /// - [`ConfigError::UnknownDependency`] for a dependency parameter that no scope
    ///   registers.
    pub fn build(self) -> Result<Application, ConfigError> {
        let RouterBuilder {
            auth_default,
            routes,
            dependencies,
            mut middleware,
            authentication,
            exception_handler,
            static_prefixes,
            ..
        } = self;

        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(routes.len());
        for pending in routes {
            let PendingRoute {
                method,
                pattern,
                mut handler,
                mut options,
                router_id,
                handle,
            } = pending;

            let auth_required = options
                .auth_required
                .or(auth_default)
                .unwrap_or(false);
            if auth_required && authentication.is_none() {
                return Err(ConfigError::AuthenticationNotConfigured {
                    method,
                    path: pattern,
                });
            }
            if !seen.insert((method.clone(), pattern.clone())) {
                return Err(ConfigError::DuplicateRoute {
                    method,
                    path: pattern,
                });
            }
            if options.exception_handler.is_none() {
                options.exception_handler = exception_handler.clone();
            }

            handler.bind_dependencies(&dependencies, router_id);
            if let Some(name) = handler.unbound_dependency() {
                return Err(ConfigError::UnknownDependency {
                    name: name.to_string(),
                    method,
                    path: pattern,
                });
            }
            let route = Route::new(
                method,
                &pattern,
                handler,
                options,
                auth_required,
                router_id,
                handle,
            )?;
            compiled.push(Arc::new(route));
        }

        middleware.bind_dependencies(&dependencies);

        info!(
            routes_count = compiled.len(),
            middleware_count = middleware.len(),
            static_prefixes = ?static_prefixes,
            auth_configured = authentication.is_some(),
            "Application built"
        );

        Ok(Application {
            table: RouteTable::new(compiled, static_prefixes),
            middleware,
            auth_gate: authentication.map(AuthGate::new),
            dependencies,
        })
    }
}

/// A built, read-only application: route table, middleware and auth gate.
pub struct Application {
    table: RouteTable,
    middleware: MiddlewareChain,
    auth_gate: Option<AuthGate>,
    dependencies: DependencyMap,
}

impl Application {
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        self.table.routes()
    }

    #[must_use]
    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    #[must_use]
    pub fn auth_gate(&self) -> Option<&AuthGate> {
        self.auth_gate.as_ref()
    }

    #[must_use]
    pub fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("routes", &self.table.routes().len())
            .field("middleware", &self.middleware.len())
            .field("auth", &self.auth_gate.is_some())
            .finish()
    }
}
