use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use http::Method;

use crate::dependency::{Dependencies, DependencyMap, RouterId};
use crate::server::{Request, Response};

/// A before/after hook around handler execution.
///
/// `before` may mutate the request and continue (`Ok(None)`) or answer directly
/// (`Ok(Some(response))`), which skips every later before hook and the handler.
/// `after` sees the final response and the measured latency.
pub trait Middleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Dependency names this middleware consumes.
    fn requires(&self) -> &[&str] {
        &[]
    }

    fn before<'a>(
        &'a self,
        _req: &'a mut Request,
        _deps: &'a Dependencies,
    ) -> BoxFuture<'a, anyhow::Result<Option<Response>>> {
        async { Ok(None) }.boxed()
    }

    fn after<'a>(
        &'a self,
        _req: &'a Request,
        _res: &'a mut Response,
        _deps: &'a Dependencies,
        _latency: Duration,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        async { Ok(()) }.boxed()
    }
}

/// Which requests a middleware entry applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareScope {
    Global,
    /// Only the route registered with exactly this method and pattern.
    Route { method: Method, path: String },
}

/// When a middleware entry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
    /// Both hooks, as registered by `wrap`.
    Both,
}

impl Phase {
    #[must_use]
    pub fn runs_before(self) -> bool {
        matches!(self, Phase::Before | Phase::Both)
    }

    #[must_use]
    pub fn runs_after(self) -> bool {
        matches!(self, Phase::After | Phase::Both)
    }
}

/// A registered middleware with its scope and consumed dependencies.
#[derive(Clone)]
pub struct MiddlewareEntry {
    pub scope: MiddlewareScope,
    pub phase: Phase,
    pub middleware: Arc<dyn Middleware>,
    pub router_id: RouterId,
    dependencies: Dependencies,
}

impl MiddlewareEntry {
    pub fn new(
        scope: MiddlewareScope,
        phase: Phase,
        middleware: Arc<dyn Middleware>,
        router_id: RouterId,
    ) -> Self {
        Self {
            scope,
            phase,
            middleware,
            router_id,
            dependencies: Dependencies::new(),
        }
    }

    #[must_use]
    pub fn applies_to(&self, method: &Method, path: &str) -> bool {
        match &self.scope {
            MiddlewareScope::Global => true,
            MiddlewareScope::Route { method: m, path: p } => m == method && p == path,
        }
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.scope == MiddlewareScope::Global
    }

    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub(crate) fn bind_dependencies(&mut self, map: &DependencyMap) {
        self.dependencies =
            map.consumed_by(self.router_id, self.middleware.requires().iter().copied());
    }
}

impl std::fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("scope", &self.scope)
            .field("phase", &self.phase)
            .field("middleware", &self.middleware.name())
            .finish()
    }
}

/// Ordered list of middleware entries. Registration order is execution order.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<MiddlewareEntry>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: MiddlewareEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = MiddlewareEntry>) {
        self.entries.extend(entries);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MiddlewareEntry> {
        self.entries.iter()
    }

    pub(crate) fn into_entries(self) -> Vec<MiddlewareEntry> {
        self.entries
    }

    pub(crate) fn bind_dependencies(&mut self, map: &DependencyMap) {
        for entry in &mut self.entries {
            entry.bind_dependencies(map);
        }
    }

    /// Global before hooks, in order.
    pub fn global_before(&self) -> impl Iterator<Item = &MiddlewareEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_global() && e.phase.runs_before())
    }

    /// Global after hooks, in order.
    pub fn global_after(&self) -> impl Iterator<Item = &MiddlewareEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_global() && e.phase.runs_after())
    }

    /// Before hooks scoped to one route.
    pub fn route_before<'a>(
        &'a self,
        method: &'a Method,
        path: &'a str,
    ) -> impl Iterator<Item = &'a MiddlewareEntry> {
        self.entries.iter().filter(move |e| {
            !e.is_global() && e.phase.runs_before() && e.applies_to(method, path)
        })
    }

    /// After hooks scoped to one route.
    pub fn route_after<'a>(
        &'a self,
        method: &'a Method,
        path: &'a str,
    ) -> impl Iterator<Item = &'a MiddlewareEntry> {
        self.entries.iter().filter(move |e| {
            !e.is_global() && e.phase.runs_after() && e.applies_to(method, path)
        })
    }
}

/// Adapts a synchronous closure into a before hook.
pub struct BeforeFn<F> {
    name: String,
    f: F,
}

/// Build a before hook from a closure.
pub fn before_fn<F>(name: impl Into<String>, f: F) -> BeforeFn<F>
where
    F: Fn(&mut Request) -> anyhow::Result<Option<Response>> + Send + Sync,
{
    BeforeFn {
        name: name.into(),
        f,
    }
}

impl<F> Middleware for BeforeFn<F>
where
    F: Fn(&mut Request) -> anyhow::Result<Option<Response>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn before<'a>(
        &'a self,
        req: &'a mut Request,
        _deps: &'a Dependencies,
    ) -> BoxFuture<'a, anyhow::Result<Option<Response>>> {
        let result = (self.f)(req);
        async move { result }.boxed()
    }
}

/// Adapts a synchronous closure into an after hook.
pub struct AfterFn<F> {
    name: String,
    f: F,
}

/// Build an after hook from a closure.
pub fn after_fn<F>(name: impl Into<String>, f: F) -> AfterFn<F>
where
    F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync,
{
    AfterFn {
        name: name.into(),
        f,
    }
}

impl<F> Middleware for AfterFn<F>
where
    F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn after<'a>(
        &'a self,
        req: &'a Request,
        res: &'a mut Response,
        _deps: &'a Dependencies,
        _latency: Duration,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        let result = (self.f)(req, res);
        async move { result }.boxed()
    }
}
