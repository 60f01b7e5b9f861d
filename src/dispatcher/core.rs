//! Dispatcher core module - request orchestration.
//!
//! Per request the dispatcher walks this state machine:
//!
//! ```text
//! BODY LIMIT → RATE LIMIT → GLOBAL BEFORE → ROUTE BEFORE → AUTH GATE
//!     → CONST CACHE → BIND → HANDLER → FORMAT → EXCEPTION HANDLER
//!     → ROUTE AFTER → GLOBAL AFTER
//! ```
//!
//! A before hook, the auth gate, the body limit or the rate limiter may answer
//! early; in that case the handler and route-after hooks are skipped. Global
//! after hooks run on every path, including failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use tracing::{debug, error, info, warn};

use crate::error::DispatchError;
use crate::formatter::format_output;
use crate::middleware::{Middleware, MiddlewareEntry, RateLimitMiddleware};
use crate::params::resolve_params;
use crate::router::{Application, Route};
use crate::runtime_config::RuntimeConfig;
use crate::server::{Headers, Request, Response};

/// Result of everything up to and including the handler.
enum Outcome {
    /// Answered before the handler ran.
    ShortCircuit(Response),
    /// The handler (or its exception handler) produced a response.
    Handled(Response),
    /// Nothing recovered the error.
    Failed(anyhow::Error),
}

/// Runs matched routes through middleware, auth, binding, handler and formatting.
pub struct Dispatcher {
    app: Arc<Application>,
    config: RuntimeConfig,
    rate_limiter: Option<RateLimitMiddleware>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(app: Application, config: RuntimeConfig) -> Self {
        let rate_limiter = config
            .rate_limit
            .as_ref()
            .map(RateLimitMiddleware::from_config)
            .filter(RateLimitMiddleware::has_limit);
        info!(
            routes_count = app.routes().len(),
            max_body_bytes = config.max_body_bytes,
            rate_limited = rate_limiter.is_some(),
            "Dispatcher ready"
        );
        Self {
            app: Arc::new(app),
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn application(&self) -> &Application {
        &self.app
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Build a request from raw parts and handle it.
    ///
    /// A target that does not form a valid URL is answered with `400`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::handle`].
    pub async fn handle_raw(
        &self,
        method: Method,
        target: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> Result<Response, DispatchError> {
        match Request::from_parts(method, target, headers, body) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(target = %target, error = %e, "Invalid request target");
                Ok(Response::error(400, "Invalid request target"))
            }
        }
    }

    /// Match the request against the route table and dispatch it.
    ///
    /// Unmatched requests get `404`. Static-file prefixes are not served here; the
    /// transport consults [`crate::router::RouteTable::resolve`] first.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn handle(&self, mut request: Request) -> Result<Response, DispatchError> {
        let Some(matched) = self.app.table().route(&request.method, request.path()) else {
            info!(
                request_id = %request.request_id,
                method = %request.method,
                path = %request.path(),
                "No route for request"
            );
            return Ok(Response::not_found());
        };
        request.path_params = matched.path_params;
        self.dispatch(&matched.route, request).await
    }

    /// Run one request through a route.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when a handler or middleware error was not
    /// recovered by an exception handler. The error carries the `500` response
    /// after global after hooks have run on it.
    pub async fn dispatch(
        &self,
        route: &Arc<Route>,
        mut request: Request,
    ) -> Result<Response, DispatchError> {
        let start = Instant::now();
        let request_id = request.request_id;

        // D1: Request dispatched
        info!(
            request_id = %request_id,
            handler_name = %route.handler.name,
            method = %request.method,
            path = %request.path(),
            route_pattern = %route.pattern,
            "Request dispatched"
        );

        let outcome = self.run_until_handler(route, &mut request).await;

        let (mut response, mut unhandled, run_route_after) = match outcome {
            Outcome::ShortCircuit(resp) => (resp, None, false),
            Outcome::Handled(resp) => (resp, None, true),
            Outcome::Failed(err) => {
                // D6: Unhandled error
                error!(
                    request_id = %request_id,
                    handler_name = %route.handler.name,
                    error = %err,
                    "Unhandled handler error"
                );
                (Response::internal_server_error(), Some(err), false)
            }
        };

        let latency = start.elapsed();

        if run_route_after {
            let hooks = self
                .app
                .middleware()
                .route_after(&route.method, &route.pattern);
            self.run_after(hooks, &request, &mut response, latency, &mut unhandled)
                .await;
        }
        let hooks = self.app.middleware().global_after();
        self.run_after(hooks, &request, &mut response, latency, &mut unhandled)
            .await;

        // D7: Response ready
        debug!(
            request_id = %request_id,
            status = response.status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Response ready"
        );

        match unhandled {
            Some(err) => Err(DispatchError::new(err, response)),
            None => Ok(response),
        }
    }

    async fn run_until_handler(&self, route: &Arc<Route>, request: &mut Request) -> Outcome {
        if request.body.len() > self.config.max_body_bytes {
            warn!(
                request_id = %request.request_id,
                body_size_bytes = request.body.len(),
                max_body_bytes = self.config.max_body_bytes,
                "Request body too large"
            );
            return Outcome::ShortCircuit(Response::error(413, "Request body too large"));
        }

        if let Some(limiter) = &self.rate_limiter {
            let deps = route.handler.dependencies();
            match limiter.before(request, deps).await {
                Ok(Some(resp)) => return Outcome::ShortCircuit(resp),
                Ok(None) => {}
                Err(e) => return self.recover(route, e),
            }
        }

        // D2: Middleware before execution
        let middleware = self.app.middleware();
        let before = middleware
            .global_before()
            .chain(middleware.route_before(&route.method, &route.pattern));
        for entry in before {
            match entry.middleware.before(request, entry.dependencies()).await {
                Ok(None) => {}
                Ok(Some(resp)) => {
                    debug!(
                        request_id = %request.request_id,
                        middleware_name = entry.middleware.name(),
                        status = resp.status,
                        "Middleware returned early response"
                    );
                    return Outcome::ShortCircuit(resp);
                }
                Err(e) => {
                    warn!(
                        request_id = %request.request_id,
                        middleware_name = entry.middleware.name(),
                        error = %e,
                        "Before middleware failed"
                    );
                    return self.recover(route, e);
                }
            }
        }

        // D3: Auth gate
        if route.auth_required {
            let Some(gate) = self.app.auth_gate() else {
                return Outcome::Failed(anyhow::anyhow!(
                    "route {} {} requires authentication but none is configured",
                    route.method,
                    route.pattern
                ));
            };
            match gate.before(request, route.handler.dependencies()).await {
                Ok(None) => {}
                Ok(Some(resp)) => return Outcome::ShortCircuit(resp),
                Err(e) => return self.recover(route, e),
            }
        }

        if route.is_const {
            if let Some(cached) = route.cached_response() {
                debug!(
                    request_id = %request.request_id,
                    handler_name = %route.handler.name,
                    "Serving cached const response"
                );
                return Outcome::Handled(cached);
            }
        }

        // D4: Parameter binding
        let args = match resolve_params(
            route.handler.params(),
            request,
            route.param_names(),
            route.handler.dependencies(),
        ) {
            Ok(args) => args,
            Err(bind_err) => {
                warn!(
                    request_id = %request.request_id,
                    handler_name = %route.handler.name,
                    parameter = bind_err.param_name(),
                    kind = bind_err.kind(),
                    error = %bind_err,
                    "Parameter binding failed"
                );
                return Outcome::Handled(bind_err.to_response());
            }
        };

        // D5: Handler execution
        let handler_start = Instant::now();
        let result = route.handler.func().invoke(args).await;
        let execution_time_ms = handler_start.elapsed().as_millis() as u64;

        match result.and_then(|output| format_output(output).map_err(anyhow::Error::from)) {
            Ok(resp) => {
                info!(
                    request_id = %request.request_id,
                    handler_name = %route.handler.name,
                    is_async = route.handler.is_async(),
                    execution_time_ms = execution_time_ms,
                    status = resp.status,
                    "Handler execution complete"
                );
                if route.is_const && (200..300).contains(&resp.status) {
                    route.cache_response(&resp);
                }
                Outcome::Handled(resp)
            }
            Err(e) => {
                warn!(
                    request_id = %request.request_id,
                    handler_name = %route.handler.name,
                    execution_time_ms = execution_time_ms,
                    error = %e,
                    "Handler failed"
                );
                self.recover(route, e)
            }
        }
    }

    /// Give the route's exception handler a chance to turn an error into a response.
    fn recover(&self, route: &Route, err: anyhow::Error) -> Outcome {
        let Some(handler) = &route.exception_handler else {
            return Outcome::Failed(err);
        };
        match format_output(handler(&err)) {
            Ok(resp) => {
                info!(
                    handler_name = %route.handler.name,
                    error = %err,
                    status = resp.status,
                    "Exception handled"
                );
                Outcome::Handled(resp)
            }
            Err(format_err) => Outcome::Failed(
                anyhow::Error::from(format_err).context(format!("while handling: {err}")),
            ),
        }
    }

    async fn run_after<'a>(
        &self,
        hooks: impl Iterator<Item = &'a MiddlewareEntry>,
        request: &Request,
        response: &mut Response,
        latency: Duration,
        unhandled: &mut Option<anyhow::Error>,
    ) {
        for entry in hooks {
            if let Err(e) = entry
                .middleware
                .after(request, response, entry.dependencies(), latency)
                .await
            {
                error!(
                    request_id = %request.request_id,
                    middleware_name = entry.middleware.name(),
                    error = %e,
                    "After middleware failed"
                );
                if unhandled.is_none() {
                    *response = Response::internal_server_error();
                    *unhandled = Some(e);
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("app", &self.app)
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}
