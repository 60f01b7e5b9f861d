use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use super::Middleware;
use crate::dependency::Dependencies;
use crate::security::AuthenticationHandler;
use crate::server::{Request, Response};

/// Runs the configured [`AuthenticationHandler`] for routes that require auth.
///
/// On success the identity is attached to the request; on any failure the
/// handler's unauthorized response short-circuits the chain.
#[derive(Clone)]
pub struct AuthGate {
    handler: Arc<dyn AuthenticationHandler>,
}

impl AuthGate {
    pub fn new(handler: Arc<dyn AuthenticationHandler>) -> Self {
        Self { handler }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.handler.token_getter().scheme()
    }
}

impl Middleware for AuthGate {
    fn name(&self) -> &str {
        "AuthGate"
    }

    fn before<'a>(
        &'a self,
        req: &'a mut Request,
        _deps: &'a Dependencies,
    ) -> BoxFuture<'a, anyhow::Result<Option<Response>>> {
        let outcome = match self.handler.authenticate(req) {
            Some(identity) => {
                debug!(request_id = %req.request_id, scheme = %self.scheme(), "Request authenticated");
                req.identity = Some(identity);
                None
            }
            None => {
                warn!(
                    request_id = %req.request_id,
                    scheme = %self.scheme(),
                    path = %req.path(),
                    "Authentication failed"
                );
                Some(self.handler.unauthorized_response())
            }
        };
        async move { Ok(outcome) }.boxed()
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("scheme", &self.scheme())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{BearerGetter, FnAuthenticator};
    use crate::server::Identity;
    use http::Method;

    fn gate() -> AuthGate {
        AuthGate::new(Arc::new(FnAuthenticator::new(BearerGetter, |token: &str| {
            (token == "good").then(|| Identity::new([("sub", "u1")]))
        })))
    }

    #[tokio::test]
    async fn test_success_attaches_identity() {
        let mut req = Request::new(Method::GET, "/")
            .unwrap()
            .with_header("Authorization", "Bearer good");
        let out = gate().before(&mut req, &Dependencies::new()).await.unwrap();
        assert!(out.is_none());
        assert_eq!(req.identity.as_ref().and_then(|i| i.claim("sub")), Some("u1"));
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let g = gate();
        for header in [None, Some("Bearer"), Some("Basic abc"), Some("Bearer bad")] {
            let mut req = Request::new(Method::GET, "/").unwrap();
            if let Some(h) = header {
                req = req.with_header("Authorization", h);
            }
            let resp = g
                .before(&mut req, &Dependencies::new())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(resp.status, 401);
            assert_eq!(resp.get_header("WWW-Authenticate"), Some("BearerGetter"));
            assert_eq!(resp.body_bytes(), Some(&b"Unauthorized"[..]));
            assert!(req.identity.is_none());
        }
    }
}
