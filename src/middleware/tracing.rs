use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{info, info_span};

use super::Middleware;
use crate::dependency::Dependencies;
use crate::server::{Request, Response};

/// Logs every request and its outcome with latency.
///
/// Register it with `wrap` so both hooks run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn name(&self) -> &str {
        "TracingMiddleware"
    }

    fn before<'a>(
        &'a self,
        req: &'a mut Request,
        _deps: &'a Dependencies,
    ) -> BoxFuture<'a, anyhow::Result<Option<Response>>> {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path(),
            client_ip = req.ip_addr.as_deref().unwrap_or("-"),
            "Request started"
        );
        async { Ok(None) }.boxed()
    }

    fn after<'a>(
        &'a self,
        req: &'a Request,
        res: &'a mut Response,
        _deps: &'a Dependencies,
        latency: Duration,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        let span = info_span!(
            "request",
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path(),
        );
        let _guard = span.enter();
        info!(
            status = res.status,
            latency_ms = latency.as_millis() as u64,
            streaming = res.is_streaming(),
            "Request completed"
        );
        async { Ok(()) }.boxed()
    }
}
