//! Fixed-window rate limiting.
//!
//! Calls are counted per client and route in a [`CounterStore`]. The first call
//! in a window starts it; once more than `calls_limit` calls land inside one
//! window the request is answered with `429 Too Many Requests`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::warn;

use super::Middleware;
use crate::dependency::Dependencies;
use crate::runtime_config::RateLimitConfig;
use crate::server::{Request, Response};

/// Atomic increment-with-expiry storage for call counters.
pub trait CounterStore: Send + Sync {
    /// Increment `key` and return the count within the current window. A missing
    /// or expired key starts a new window of length `ttl` at 1.
    fn incr(&self, key: &str, ttl: Duration) -> u64;
}

/// Process-local counter store.
///
/// Expired windows are swept from inside `incr` at most once per `ttl`, so keys
/// for paths that stop receiving traffic do not accumulate.
#[derive(Debug)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, (Instant, u64)>,
    epoch: Instant,
    // Micros since `epoch` of the last sweep
    last_sweep: AtomicU64,
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self {
            windows: DashMap::new(),
            epoch: Instant::now(),
            last_sweep: AtomicU64::new(0),
        }
    }
}

impl InMemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired windows.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.windows.retain(|_, (expires, _)| *expires > now);
    }

    fn maybe_sweep(&self, now: Instant, ttl: Duration) {
        let elapsed = u64::try_from(now.duration_since(self.epoch).as_micros()).unwrap_or(u64::MAX);
        let interval = u64::try_from(ttl.as_micros()).unwrap_or(u64::MAX);
        let last = self.last_sweep.load(Ordering::Relaxed);
        if elapsed.saturating_sub(last) < interval {
            return;
        }
        // One caller per interval does the sweep
        if self
            .last_sweep
            .compare_exchange(last, elapsed, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.windows.retain(|_, (expires, _)| *expires > now);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn incr(&self, key: &str, ttl: Duration) -> u64 {
        let now = Instant::now();
        self.maybe_sweep(now, ttl);
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert((now + ttl, 0));
        let (expires, count) = entry.value_mut();
        if *expires <= now {
            *expires = now + ttl;
            *count = 0;
        }
        *count += 1;
        *count
    }
}

/// Rejects clients that exceed `calls_limit` calls per `ttl`.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    store: Arc<dyn CounterStore>,
    calls_limit: u64,
    ttl: Duration,
}

impl RateLimitMiddleware {
    pub fn new(store: Arc<dyn CounterStore>, calls_limit: u64, ttl: Duration) -> Self {
        Self {
            store,
            calls_limit,
            ttl,
        }
    }

    /// In-memory limiter from configuration.
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Arc::new(InMemoryCounterStore::new()),
            config.calls_limit,
            Duration::from_secs(config.limit_ttl_secs),
        )
    }

    /// A zero limit or zero window disables limiting.
    #[must_use]
    pub fn has_limit(&self) -> bool {
        self.calls_limit > 0 && !self.ttl.is_zero()
    }

    fn key(req: &Request) -> String {
        let client = req.ip_addr.as_deref().unwrap_or("unknown");
        format!("{client}:{}:{}", req.method, req.path())
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &str {
        "RateLimitMiddleware"
    }

    fn before<'a>(
        &'a self,
        req: &'a mut Request,
        _deps: &'a Dependencies,
    ) -> BoxFuture<'a, anyhow::Result<Option<Response>>> {
        let mut outcome = None;
        if self.has_limit() {
            let key = Self::key(req);
            let count = self.store.incr(&key, self.ttl);
            if count > self.calls_limit {
                warn!(
                    request_id = %req.request_id,
                    key = %key,
                    count = count,
                    calls_limit = self.calls_limit,
                    "Rate limit exceeded"
                );
                let mut resp = Response::text(429, "Too many requests");
                resp.set_header("Retry-After", self.ttl.as_secs().to_string());
                outcome = Some(resp);
            }
        }
        async move { Ok(outcome) }.boxed()
    }
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("calls_limit", &self.calls_limit)
            .field("ttl", &self.ttl)
            .finish()
    }
}
