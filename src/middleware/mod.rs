mod auth;
mod core;
mod rate_limit;
mod tracing;

pub use auth::AuthGate;
pub use core::{
    after_fn, before_fn, AfterFn, BeforeFn, Middleware, MiddlewareChain, MiddlewareEntry,
    MiddlewareScope, Phase,
};
pub use rate_limit::{CounterStore, InMemoryCounterStore, RateLimitMiddleware};
pub use tracing::TracingMiddleware;
