use std::fmt;
use std::path::{Path, PathBuf};

use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;

use super::request::Headers;

/// Lazily produced response body chunks.
pub type BodyStream = BoxStream<'static, anyhow::Result<Vec<u8>>>;

/// Response payload: fully buffered bytes or a lazy stream.
pub enum ResponseBody {
    Bytes(Vec<u8>),
    Stream(BodyStream),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Uniform response handed back to the transport.
///
/// `file_path` defers content to the transport, which streams the file without
/// buffering it here.
#[derive(Debug)]
pub struct Response {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    pub headers: Headers,
    pub body: ResponseBody,
    pub file_path: Option<PathBuf>,
}

impl Response {
    /// Create a new response with the given status, headers, and body
    #[must_use]
    pub fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Bytes(body),
            file_path: None,
        }
    }

    /// Create a `text/plain` response
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        Self::new(status, headers, body.into().into_bytes())
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");
        Self::new(status, headers, body.to_string().into_bytes())
    }

    /// Create an `application/octet-stream` response
    #[must_use]
    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/octet-stream");
        Self::new(status, headers, body)
    }

    /// Serve an HTML string
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");
        Self::new(200, headers, body.into().into_bytes())
    }

    /// Serve a file as an attachment. The content type is guessed from `file_name`
    /// (or the path's file name when not given).
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, file_name: Option<&str>) -> Self {
        let path = path.into();
        let name = file_name
            .map(str::to_string)
            .or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        let mut headers = Headers::new();
        headers.insert("Content-Type", guess_content_type(Path::new(&name)));
        headers.insert("Content-Disposition", format!("attachment; filename={name}"));
        Self {
            status: 200,
            headers,
            body: ResponseBody::Bytes(Vec::new()),
            file_path: Some(path),
        }
    }

    /// Create a streaming response. `media_type` defaults to `text/event-stream`.
    pub fn streaming<S>(stream: S, media_type: Option<&str>) -> Self
    where
        S: Stream<Item = anyhow::Result<Vec<u8>>> + Send + 'static,
    {
        let mut headers = Headers::new();
        headers.insert("Content-Type", media_type.unwrap_or("text/event-stream"));
        Self {
            status: 200,
            headers,
            body: ResponseBody::Stream(stream.boxed()),
            file_path: None,
        }
    }

    /// `text/event-stream` response from already framed events, such as the output
    /// of [`sse_message`](crate::sse::sse_message).
    pub fn sse<S>(events: S) -> Self
    where
        S: Stream<Item = anyhow::Result<String>> + Send + 'static,
    {
        let mut resp = Self::streaming(events.map(|e| e.map(String::into_bytes)), None);
        resp.set_header("Cache-Control", "no-cache");
        resp
    }

    /// Create an error response with a JSON `{"error": message}` body
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    /// `401 Unauthorized` carrying `WWW-Authenticate: <scheme>`.
    #[must_use]
    pub fn unauthorized(scheme: &str) -> Self {
        let mut resp = Self::text(401, "Unauthorized");
        resp.headers.insert("WWW-Authenticate", scheme);
        resp
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::text(404, "Not found")
    }

    #[must_use]
    pub fn internal_server_error() -> Self {
        Self::text(500, "Internal server error")
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ResponseBody::Stream(_))
    }

    /// Buffered body bytes; `None` for streaming bodies.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Bytes(b) => Some(b),
            ResponseBody::Stream(_) => None,
        }
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Copy a buffered response. Streaming responses cannot be copied.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        let body = self.body_bytes()?.to_vec();
        Some(Self {
            status: self.status,
            headers: self.headers.clone(),
            body: ResponseBody::Bytes(body),
            file_path: self.file_path.clone(),
        })
    }
}

/// Reason phrase for the status line.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

fn guess_content_type(name: &Path) -> &'static str {
    let ext = name
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "application/javascript",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
