//! Normalization of handler return values into a [`Response`].

use serde_json::{Map, Value};

use crate::error::FormatError;
use crate::server::{Headers, Response};

/// Everything a handler may return.
#[derive(Debug)]
pub enum HandlerOutput {
    /// Passed through unchanged, including streaming and file responses.
    Response(Response),
    /// Serialized as `application/json`.
    Json(Map<String, Value>),
    /// Sent as `application/octet-stream`.
    Bytes(Vec<u8>),
    /// `(body, headers, status)`; the body is formatted first, then headers and
    /// status are applied on top.
    Tuple(Box<HandlerOutput>, Headers, u16),
    /// Sent as `text/plain`.
    Text(String),
}

impl HandlerOutput {
    /// Shorthand for a `(body, headers, status)` tuple.
    pub fn with_parts(body: impl Into<HandlerOutput>, headers: Headers, status: u16) -> Self {
        HandlerOutput::Tuple(Box::new(body.into()), headers, status)
    }
}

/// Convert a handler output into the uniform response.
///
/// # Errors
///
/// Returns [`FormatError::StreamingInTuple`] when a tuple wraps a streaming body.
pub fn format_output(output: HandlerOutput) -> Result<Response, FormatError> {
    match output {
        HandlerOutput::Response(resp) => Ok(resp),
        HandlerOutput::Json(map) => {
            let body = serde_json::to_vec(&Value::Object(map))
                .map_err(|e| FormatError::Serialize(e.to_string()))?;
            let mut headers = Headers::new();
            headers.insert("Content-Type", "application/json");
            Ok(Response::new(200, headers, body))
        }
        HandlerOutput::Bytes(bytes) => Ok(Response::bytes(200, bytes)),
        HandlerOutput::Tuple(body, headers, status) => {
            let mut resp = format_output(*body)?;
            if resp.is_streaming() {
                return Err(FormatError::StreamingInTuple);
            }
            resp.headers.overlay(&headers);
            resp.status = status;
            Ok(resp)
        }
        HandlerOutput::Text(text) => Ok(Response::text(200, text)),
    }
}

impl From<Response> for HandlerOutput {
    fn from(resp: Response) -> Self {
        HandlerOutput::Response(resp)
    }
}

impl From<Map<String, Value>> for HandlerOutput {
    fn from(map: Map<String, Value>) -> Self {
        HandlerOutput::Json(map)
    }
}

/// Objects become JSON, strings become their unquoted text, anything else is
/// stringified.
impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => HandlerOutput::Json(map),
            Value::String(s) => HandlerOutput::Text(s),
            other => HandlerOutput::Text(other.to_string()),
        }
    }
}

impl From<Vec<u8>> for HandlerOutput {
    fn from(bytes: Vec<u8>) -> Self {
        HandlerOutput::Bytes(bytes)
    }
}

impl From<&[u8]> for HandlerOutput {
    fn from(bytes: &[u8]) -> Self {
        HandlerOutput::Bytes(bytes.to_vec())
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        HandlerOutput::Text(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        HandlerOutput::Text(text.to_string())
    }
}

macro_rules! stringified_output {
    ($($t:ty),*) => {
        $(
            impl From<$t> for HandlerOutput {
                fn from(v: $t) -> Self {
                    HandlerOutput::Text(v.to_string())
                }
            }
        )*
    };
}

stringified_output!(i32, i64, u32, u64, usize, f64, bool);

impl<T: Into<HandlerOutput>> From<(T, Headers, u16)> for HandlerOutput {
    fn from((body, headers, status): (T, Headers, u16)) -> Self {
        HandlerOutput::with_parts(body, headers, status)
    }
}
