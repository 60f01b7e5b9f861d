//! Handler descriptors and invocation.
//!
//! A handler is either blocking or asynchronous. Blocking handlers run on tokio's
//! blocking pool so they never stall the async workers; async handlers are awaited
//! in place. Both are guarded against panics, which surface as ordinary errors.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::dependency::{Dependencies, DependencyMap, RouterId};
use crate::formatter::HandlerOutput;
use crate::params::{Args, ParamSource, ParameterDescriptor};

/// What a handler returns.
pub type HandlerResult = anyhow::Result<HandlerOutput>;

type BlockingFn = Arc<dyn Fn(Args) -> HandlerResult + Send + Sync>;
type AsyncFn = Arc<dyn Fn(Args) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Recovers from a handler error by producing a replacement output.
pub type ExceptionHandler = Arc<dyn Fn(&anyhow::Error) -> HandlerOutput + Send + Sync>;

/// The callable behind a route.
#[derive(Clone)]
pub enum HandlerFn {
    Blocking(BlockingFn),
    Async(AsyncFn),
}

impl HandlerFn {
    pub fn blocking<F, O>(f: F) -> Self
    where
        F: Fn(Args) -> anyhow::Result<O> + Send + Sync + 'static,
        O: Into<HandlerOutput>,
    {
        HandlerFn::Blocking(Arc::new(move |args| f(args).map(Into::into)))
    }

    pub fn from_async<F, Fut, O>(f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<O>> + Send + 'static,
        O: Into<HandlerOutput>,
    {
        HandlerFn::Async(Arc::new(move |args| {
            let fut = f(args);
            async move { fut.await.map(Into::into) }.boxed()
        }))
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, HandlerFn::Async(_))
    }

    /// Run the handler to completion.
    ///
    /// # Errors
    ///
    /// Returns the handler's own error, or an error describing a panic or a
    /// cancelled blocking task.
    pub async fn invoke(&self, args: Args) -> HandlerResult {
        match self {
            HandlerFn::Blocking(f) => {
                let f = Arc::clone(f);
                tokio::task::spawn_blocking(move || f(args))
                    .await
                    .map_err(|e| {
                        if e.is_panic() {
                            anyhow::anyhow!("handler panicked: {}", panic_message(e.into_panic()))
                        } else {
                            anyhow::anyhow!("handler task was cancelled")
                        }
                    })?
            }
            HandlerFn::Async(f) => {
                let fut = f(args);
                AssertUnwindSafe(fut)
                    .catch_unwind()
                    .await
                    .map_err(|p| anyhow::anyhow!("handler panicked: {}", panic_message(p)))?
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl fmt::Debug for HandlerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_async() { "Async" } else { "Blocking" })
    }
}

/// A handler together with its declared parameter table.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    pub name: Arc<str>,
    func: HandlerFn,
    params: Vec<ParameterDescriptor>,
    dependencies: Dependencies,
}

impl HandlerDescriptor {
    pub fn new(name: &str, func: HandlerFn) -> Self {
        Self {
            name: Arc::from(name),
            func,
            params: Vec::new(),
            dependencies: Dependencies::new(),
        }
    }

    /// A blocking handler.
    pub fn blocking<F, O>(name: &str, f: F) -> Self
    where
        F: Fn(Args) -> anyhow::Result<O> + Send + Sync + 'static,
        O: Into<HandlerOutput>,
    {
        Self::new(name, HandlerFn::blocking(f))
    }

    /// An asynchronous handler.
    pub fn asynchronous<F, Fut, O>(name: &str, f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<O>> + Send + 'static,
        O: Into<HandlerOutput>,
    {
        Self::new(name, HandlerFn::from_async(f))
    }

    #[must_use]
    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn params_from(mut self, params: impl IntoIterator<Item = ParameterDescriptor>) -> Self {
        self.params.extend(params);
        self
    }

    /// Declared parameters, in order.
    #[must_use]
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    #[must_use]
    pub fn func(&self) -> &HandlerFn {
        &self.func
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.func.is_async()
    }

    /// Dependencies this handler consumes, as computed at build time.
    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Keep the dependencies of `router` whose names match a declared parameter.
    pub fn bind_dependencies(&mut self, map: &DependencyMap, router: RouterId) {
        let names: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        self.dependencies = map.consumed_by(router, names);
    }

    /// First `Dependency` parameter with no bound value.
    #[must_use]
    pub fn unbound_dependency(&self) -> Option<&str> {
        self.params
            .iter()
            .filter(|p| p.source == ParamSource::Dependency && p.default.is_none())
            .map(|p| p.name.as_str())
            .find(|name| !self.dependencies.contains(name))
    }
}
