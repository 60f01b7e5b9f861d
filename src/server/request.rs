use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use ulid::Ulid;
use url::Url;

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request correlation id.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// The id in `header` when it is a valid ULID, otherwise a fresh one.
    #[must_use]
    pub fn from_header(header: Option<&str>) -> Self {
        let id = header.and_then(|s| Ulid::from_string(s).ok());
        Self(id.unwrap_or_else(Ulid::new))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Maximum inline headers before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum number of path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` because they repeat across requests and clone in O(1).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Stack-allocated parameter storage for the hot path.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

const DEFAULT_BASE: &str = "http://localhost";

/// Case-insensitive header multimap.
///
/// [`Headers::insert`] replaces every existing value for a name (last write wins),
/// [`Headers::append`] keeps them, for headers that are legitimately multi-valued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: HeaderVec,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs; a repeated name keeps the last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        for (k, v) in pairs {
            headers.insert(k.as_ref(), v);
        }
        headers
    }

    /// Get a header by name (case-insensitive per RFC 7230). Returns the last value.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header, in insertion order. `None` when absent.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Option<Vec<&str>> {
        let values: Vec<&str> = self
            .entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Add or replace a header.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.entries.push((Arc::from(name), value.into()));
    }

    /// Add a header value without removing existing ones.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((Arc::from(name), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Apply every header of `other` on top of `self`.
    ///
    /// Names present in `other` replace all same-named values here; multiple values
    /// for one name in `other` are all kept.
    pub fn overlay(&mut self, other: &Headers) {
        for (name, _) in &other.entries {
            self.remove(name);
        }
        for (name, value) in &other.entries {
            self.entries.push((Arc::clone(name), value.clone()));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Multi-valued query string parameters.
///
/// All values are retained in their original order. Scalar lookups use
/// "last write wins": `?limit=10&limit=20` yields `20`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    entries: ParamVec,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (without the leading `?`), URL-decoding names and values.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            params.push(&k, v.into_owned());
        }
        params
    }

    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((Arc::from(name), value.into()));
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value supplied for `name`, in request order. `None` when the name is absent.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Option<Vec<&str>> {
        let values: Vec<&str> = self
            .entries
            .iter()
            .filter(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_ref() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collapse to a map keeping the last value per name.
    /// Note: This allocates - use get() in hot paths
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Single-valued path parameters captured by the route pattern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams {
    entries: ParamVec,
}

impl PathParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; a repeated name at a deeper segment replaces the earlier one.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries.retain(|(k, _)| k.as_ref() != name);
        self.entries.push((Arc::from(name), value.into()));
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Authenticated client identity, attached to the request by the auth gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub claims: HashMap<String, String>,
}

impl Identity {
    pub fn new<I, K, V>(claims: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            claims: claims
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(String::as_str)
    }
}

/// A request that the transport has already parsed.
///
/// Path params are filled in once a route matches; `identity` stays `None` until
/// the auth gate succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    pub method: Method,
    pub url: Url,
    pub path_params: PathParams,
    pub query_params: QueryParams,
    pub headers: Headers,
    /// Raw body bytes as received
    pub body: Vec<u8>,
    pub identity: Option<Identity>,
    /// Fields of an `application/x-www-form-urlencoded` body
    pub form_data: HashMap<String, String>,
    /// Uploaded files keyed by file name, populated by the transport
    pub files: HashMap<String, Vec<u8>>,
    /// Client address as reported by the transport
    pub ip_addr: Option<String>,
}

impl Request {
    /// Build a request from a method and a request target such as `/users/42?x=1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be joined into a URL.
    pub fn new(method: Method, target: &str) -> Result<Self, url::ParseError> {
        Self::from_parts(method, target, Headers::new(), Vec::new())
    }

    /// Build a request from its raw parts.
    ///
    /// The URL authority comes from the `Host` header when present. Query params are
    /// parsed from the target and form fields from a urlencoded body.
    ///
    /// The request id is taken from [`REQUEST_ID_HEADER`] when that header holds a
    /// valid ULID, so a caller's id survives into every log line of the dispatch.
    /// Any other value, or no header, gets a freshly minted id.
    ///
    /// # Errors
    ///
    /// Returns an error if the host or target do not form a valid URL.
    pub fn from_parts(
        method: Method,
        target: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> Result<Self, url::ParseError> {
        let base = match headers.get("host") {
            Some(host) => Url::parse(&format!("http://{host}"))?,
            None => Url::parse(DEFAULT_BASE)?,
        };
        let url = base.join(target)?;
        let query_params = url.query().map(QueryParams::parse).unwrap_or_default();
        let form_data = parse_form_data(&headers, &body);
        let request_id = RequestId::from_header(headers.get(REQUEST_ID_HEADER));

        debug!(
            request_id = %request_id,
            method = %method,
            path = %url.path(),
            header_count = headers.len(),
            query_count = query_params.entries.len(),
            body_size_bytes = body.len(),
            "Request parsed"
        );

        Ok(Self {
            request_id,
            method,
            url,
            path_params: PathParams::new(),
            query_params,
            headers,
            body,
            identity: None,
            form_data,
            files: HashMap::new(),
            ip_addr: None,
        })
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.form_data = parse_form_data(&self.headers, &self.body);
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_addr = Some(ip.into());
        self
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Body decoded as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when the body is not valid JSON for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Parse form fields when the body is `application/x-www-form-urlencoded`.
#[must_use]
pub fn parse_form_data(headers: &Headers, body: &[u8]) -> HashMap<String, String> {
    let is_form = headers
        .get("content-type")
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if !is_form || body.is_empty() {
        return HashMap::new();
    }
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
