//! # Security Module
//!
//! Authentication for routes that require it.
//!
//! ## Overview
//!
//! Authentication is split in two parts:
//!
//! - A [`TokenGetter`] knows where credentials live in a request and how to put
//!   them back. It never decodes them.
//! - An [`AuthenticationHandler`] decodes and checks the credentials and returns
//!   the client [`Identity`] on success.
//!
//! The auth gate (see [`crate::middleware::AuthGate`]) attaches the identity to the
//! request or answers with the handler's unauthorized response: `401` with
//! `WWW-Authenticate` set to the token getter's scheme. Absent, malformed and
//! rejected credentials all produce the same response.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::security::{BearerGetter, FnAuthenticator};
//! use brrtdispatch::server::Identity;
//!
//! let auth = FnAuthenticator::new(BearerGetter, |token: &str| {
//!     (token == "valid").then(|| Identity::new([("sub", "alice")]))
//! });
//! ```

use std::fmt;
use std::sync::Arc;

use base64::Engine;

use crate::server::{Identity, Request, Response};

/// Reads and writes credentials on a request.
pub trait TokenGetter: Send + Sync {
    /// Scheme name advertised in `WWW-Authenticate`.
    fn scheme(&self) -> &str;

    /// The encoded token, if the request carries one in the expected form.
    fn get_token(&self, request: &Request) -> Option<String>;

    /// Put an encoded token on the request.
    fn set_token(&self, request: &mut Request, token: &str);
}

/// `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerGetter;

impl TokenGetter for BearerGetter {
    fn scheme(&self) -> &str {
        "BearerGetter"
    }

    fn get_token(&self, request: &Request) -> Option<String> {
        request
            .headers
            .get("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
    }

    fn set_token(&self, request: &mut Request, token: &str) {
        request
            .headers
            .insert("Authorization", format!("Bearer {token}"));
    }
}

/// `Authorization: Basic <base64(user:password)>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicGetter;

impl BasicGetter {
    /// Decode a Basic token into `(user, password)`.
    #[must_use]
    pub fn decode(token: &str) -> Option<(String, String)> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(token.trim())
            .ok()?;
        let text = String::from_utf8(raw).ok()?;
        let (user, password) = text.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }

    #[must_use]
    pub fn encode(user: &str, password: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"))
    }
}

impl TokenGetter for BasicGetter {
    fn scheme(&self) -> &str {
        "BasicGetter"
    }

    fn get_token(&self, request: &Request) -> Option<String> {
        request
            .headers
            .get("authorization")
            .and_then(|h| h.strip_prefix("Basic "))
            .map(str::to_string)
    }

    fn set_token(&self, request: &mut Request, token: &str) {
        request
            .headers
            .insert("Authorization", format!("Basic {token}"));
    }
}

/// Decides who the client is.
pub trait AuthenticationHandler: Send + Sync {
    fn token_getter(&self) -> &dyn TokenGetter;

    /// `Some(identity)` when the request is authenticated.
    fn authenticate(&self, request: &Request) -> Option<Identity>;

    /// Response sent for every authentication failure.
    fn unauthorized_response(&self) -> Response {
        Response::unauthorized(self.token_getter().scheme())
    }
}

type VerifyFn = Arc<dyn Fn(&str) -> Option<Identity> + Send + Sync>;

/// Authentication handler built from a token getter and a token check.
pub struct FnAuthenticator<G> {
    getter: G,
    verify: VerifyFn,
}

impl<G: TokenGetter> FnAuthenticator<G> {
    pub fn new<F>(getter: G, verify: F) -> Self
    where
        F: Fn(&str) -> Option<Identity> + Send + Sync + 'static,
    {
        Self {
            getter,
            verify: Arc::new(verify),
        }
    }
}

impl<G: TokenGetter> AuthenticationHandler for FnAuthenticator<G> {
    fn token_getter(&self) -> &dyn TokenGetter {
        &self.getter
    }

    fn authenticate(&self, request: &Request) -> Option<Identity> {
        let token = self.getter.get_token(request)?;
        (self.verify)(&token)
    }
}

impl<G: TokenGetter> fmt::Debug for FnAuthenticator<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAuthenticator")
            .field("scheme", &self.getter.scheme())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_bearer_roundtrip_through_request() {
        let mut req = Request::new(Method::GET, "/").unwrap();
        assert_eq!(BearerGetter.get_token(&req), None);
        BearerGetter.set_token(&mut req, "abc");
        assert_eq!(req.headers.get("authorization"), Some("Bearer abc"));
        assert_eq!(BearerGetter.get_token(&req).as_deref(), Some("abc"));
    }

    #[test]
    fn test_bearer_rejects_other_schemes() {
        let req = Request::new(Method::GET, "/")
            .unwrap()
            .with_header("Authorization", "Token abc");
        assert_eq!(BearerGetter.get_token(&req), None);
    }

    #[test]
    fn test_basic_decode() {
        let token = BasicGetter::encode("ann", "s3:cret");
        assert_eq!(
            BasicGetter::decode(&token),
            Some(("ann".to_string(), "s3:cret".to_string()))
        );
        assert_eq!(BasicGetter::decode("!!!"), None);
    }

    #[test]
    fn test_unauthorized_response_uses_scheme() {
        let auth = FnAuthenticator::new(BasicGetter, |_| None);
        let resp = auth.unauthorized_response();
        assert_eq!(resp.status, 401);
        assert_eq!(resp.get_header("WWW-Authenticate"), Some("BasicGetter"));
    }
}
