//! Error taxonomy for binding, configuration, formatting and dispatch.
//!
//! Binding errors are local to a single request and always become a `400`
//! response. Configuration errors are raised while building the route table
//! and are fatal at startup. Handler failures travel as [`anyhow::Error`] and
//! surface as a [`DispatchError`] only when no exception handler recovers them.

use std::fmt;

use http::Method;
use serde_json::json;

use crate::server::Response;

/// Failure to bind one handler parameter from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// No value was found and the parameter has no default and is not optional.
    MissingParameter {
        /// Parameter name as declared on the handler
        name: String,
        /// Human readable expected type (e.g. `int`, `list[str]`)
        expected: String,
    },
    /// A value was found but could not be coerced to the declared type.
    InvalidParameterValue {
        /// Parameter name as declared on the handler
        name: String,
        /// The raw value that failed coercion
        value: String,
        /// Human readable expected type
        expected: String,
    },
    /// The request body could not be decoded or failed model validation.
    InvalidRequestBody {
        /// Parameter name the body was bound to
        name: String,
        /// Decoder or validator message
        reason: String,
    },
}

impl BindError {
    /// Name of the parameter that failed to bind.
    #[must_use]
    pub fn param_name(&self) -> &str {
        match self {
            BindError::MissingParameter { name, .. }
            | BindError::InvalidParameterValue { name, .. }
            | BindError::InvalidRequestBody { name, .. } => name,
        }
    }

    /// Short machine-friendly label used in the response body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BindError::MissingParameter { .. } => "missing_parameter",
            BindError::InvalidParameterValue { .. } => "invalid_parameter_value",
            BindError::InvalidRequestBody { .. } => "invalid_request_body",
        }
    }

    /// Client-facing `400 Bad Request` for this failure.
    #[must_use]
    pub fn to_response(&self) -> Response {
        Response::json(
            400,
            &json!({
                "error": self.kind(),
                "parameter": self.param_name(),
                "detail": self.to_string(),
            }),
        )
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::MissingParameter { name, expected } => {
                write!(f, "Missing required parameter: '{name}' (expected {expected})")
            }
            BindError::InvalidParameterValue {
                name,
                value,
                expected,
            } => write!(
                f,
                "Invalid value '{value}' for parameter '{name}': expected {expected}"
            ),
            BindError::InvalidRequestBody { name, reason } => {
                write!(f, "Invalid request body for parameter '{name}': {reason}")
            }
        }
    }
}

impl std::error::Error for BindError {}

/// Errors detected while building the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A route requires authentication but no authentication handler was configured.
    AuthenticationNotConfigured {
        /// Method of the offending route
        method: Method,
        /// Path pattern of the offending route
        path: String,
    },
    /// The same method and pattern were registered twice.
    DuplicateRoute {
        /// Method of the duplicated route
        method: Method,
        /// Path pattern of the duplicated route
        path: String,
    },
    /// A path pattern could not be compiled into a matcher.
    InvalidPattern {
        /// The pattern as registered
        path: String,
        /// Compiler message
        reason: String,
    },
    /// A handler declares a dependency parameter that no scope registers.
    UnknownDependency {
        /// Method of the offending route
        method: Method,
        /// Path pattern of the offending route
        path: String,
        /// Declared dependency name
        name: String,
    },
    /// A JSON Schema for a body model could not be compiled.
    InvalidSchema {
        /// Model name
        model: String,
        /// Compiler message
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::AuthenticationNotConfigured { method, path } => write!(
                f,
                "Authentication is not configured but route {method} {path} requires it. \
                Use configure_authentication() to configure it."
            ),
            ConfigError::DuplicateRoute { method, path } => {
                write!(f, "Route {method} {path} is registered more than once")
            }
            ConfigError::InvalidPattern { path, reason } => {
                write!(f, "Invalid route pattern '{path}': {reason}")
            }
            ConfigError::UnknownDependency { method, path, name } => write!(
                f,
                "Route {method} {path} declares dependency '{name}' but none is registered"
            ),
            ConfigError::InvalidSchema { model, reason } => {
                write!(f, "Invalid JSON Schema for model '{model}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Handler output that cannot be normalized into a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A `(body, headers, status)` tuple carried a streaming body.
    StreamingInTuple,
    /// A mapping could not be serialized to JSON.
    Serialize(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::StreamingInTuple => write!(
                f,
                "Streaming responses cannot be returned inside a (body, headers, status) tuple"
            ),
            FormatError::Serialize(msg) => write!(f, "Failed to serialize response body: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// A handler or middleware failure that no exception handler recovered.
///
/// Global after-middleware has already run on [`DispatchError::response`], so the
/// transport can send it as-is.
#[derive(Debug)]
pub struct DispatchError {
    source: anyhow::Error,
    response: Response,
}

impl DispatchError {
    pub(crate) fn new(source: anyhow::Error, response: Response) -> Self {
        Self { source, response }
    }

    /// The error raised by the handler or middleware.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.source
    }

    /// The server-error response prepared for the transport boundary.
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Consume the error, keeping only the response to send.
    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unhandled handler error: {}", self.source)
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
