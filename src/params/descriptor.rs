use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ConfigError;

/// Whole-request facets a parameter can bind to directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Request,
    QueryParams,
    Headers,
    PathParams,
    Body,
    Method,
    Url,
    Identity,
    FormData,
    Files,
}

impl Facet {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Request => "Request",
            Facet::QueryParams => "QueryParams",
            Facet::Headers => "Headers",
            Facet::PathParams => "PathParams",
            Facet::Body => "Body",
            Facet::Method => "Method",
            Facet::Url => "Url",
            Facet::Identity => "Identity",
            Facet::FormData => "FormData",
            Facet::Files => "Files",
        }
    }
}

/// Constructor fallback for [`ParamType::Custom`]. Receives the raw string.
pub type ParseFn = Arc<dyn Fn(&str) -> anyhow::Result<Value> + Send + Sync>;

/// Decode-and-validate step for a body model. Returns the normalized JSON value.
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A structured body model.
///
/// Built either from a serde type ([`ModelSpec::of`]) or from a JSON Schema
/// ([`ModelSpec::from_schema`]).
#[derive(Clone)]
pub struct ModelSpec {
    pub name: String,
    validate: ValidateFn,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, validate: ValidateFn) -> Self {
        Self {
            name: name.into(),
            validate,
        }
    }

    /// Model backed by a serde type. The body must deserialize into `T`; the bound
    /// value is `T` serialized back, so unknown fields are dropped per `T`'s rules.
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        let full = std::any::type_name::<T>();
        let name = full.rsplit("::").next().unwrap_or(full).to_string();
        Self::new(
            name,
            Arc::new(|value: &Value| {
                let typed: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                serde_json::to_value(typed).map_err(|e| e.to_string())
            }),
        )
    }

    /// Model backed by a JSON Schema document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSchema`] if the schema does not compile.
    pub fn from_schema(name: impl Into<String>, schema: &Value) -> Result<Self, ConfigError> {
        let name = name.into();
        let validator =
            jsonschema::validator_for(schema).map_err(|e| ConfigError::InvalidSchema {
                model: name.clone(),
                reason: e.to_string(),
            })?;
        let validator = Arc::new(validator);
        Ok(Self::new(
            name,
            Arc::new(move |value: &Value| {
                let errors: Vec<String> = validator
                    .iter_errors(value)
                    .map(|e| e.to_string())
                    .collect();
                if errors.is_empty() {
                    Ok(value.clone())
                } else {
                    Err(errors.join("; "))
                }
            }),
        ))
    }

    /// Validate a decoded body.
    ///
    /// # Errors
    ///
    /// Returns the validator message when the value does not fit the model.
    pub fn validate(&self, value: &Value) -> Result<Value, String> {
        (self.validate)(value)
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec").field("name", &self.name).finish()
    }
}

/// Declared type of a handler parameter.
#[derive(Clone)]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    List(Box<ParamType>),
    Optional(Box<ParamType>),
    /// User type built from the raw string by `parse`.
    Custom { name: String, parse: ParseFn },
    /// Structured body decoded from JSON.
    Model(ModelSpec),
    /// Whole-request facet; bypasses scalar binding.
    Facet(Facet),
    /// Raw passthrough (dependencies and untyped values).
    Any,
}

impl ParamType {
    #[must_use]
    pub fn list(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    #[must_use]
    pub fn optional(inner: ParamType) -> Self {
        ParamType::Optional(Box::new(inner))
    }

    pub fn custom<F>(name: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        ParamType::Custom {
            name: name.into(),
            parse: Arc::new(parse),
        }
    }

    /// Strip any `Optional` wrappers.
    #[must_use]
    pub fn unwrap_optional(&self) -> &ParamType {
        match self {
            ParamType::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, ParamType::Optional(_))
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self.unwrap_optional(), ParamType::List(_))
    }

    #[must_use]
    pub fn facet(&self) -> Option<Facet> {
        match self.unwrap_optional() {
            ParamType::Facet(f) => Some(*f),
            _ => None,
        }
    }

    /// Human readable name used in binding error messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            ParamType::Str => "str".into(),
            ParamType::Int => "int".into(),
            ParamType::Float => "float".into(),
            ParamType::Bool => "bool".into(),
            ParamType::List(inner) => format!("list[{}]", inner.type_name()),
            ParamType::Optional(inner) => format!("Optional[{}]", inner.type_name()),
            ParamType::Custom { name, .. } => name.clone(),
            ParamType::Model(model) => model.name.clone(),
            ParamType::Facet(facet) => facet.as_str().into(),
            ParamType::Any => "any".into(),
        }
    }
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// Where a parameter's raw value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Path if the name is a route `:name`, otherwise query.
    Auto,
    Path,
    Query,
    Header { convert_underscores: bool },
    Body,
    /// Only the dependency map; request facets are never read.
    Dependency,
}

/// One entry of a handler's parameter table.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub source: ParamSource,
    pub ty: ParamType,
    pub default: Option<Value>,
    pub alias: Option<String>,
    pub description: Option<String>,
}

impl ParameterDescriptor {
    /// A parameter resolved from the path or the query string.
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            source: ParamSource::Auto,
            ty,
            default: None,
            alias: None,
            description: None,
        }
    }

    pub fn path(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty).with_source(ParamSource::Path)
    }

    pub fn query(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty).with_source(ParamSource::Query)
    }

    /// A header parameter; `_` in the name maps to `-` unless disabled.
    pub fn header(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty).with_source(ParamSource::Header {
            convert_underscores: true,
        })
    }

    pub fn body(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty).with_source(ParamSource::Body)
    }

    pub fn facet(name: impl Into<String>, facet: Facet) -> Self {
        Self::new(name, ParamType::Facet(facet))
    }

    /// A parameter that is only ever satisfied from the dependency map.
    pub fn dependency(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Any).with_source(ParamSource::Dependency)
    }

    #[must_use]
    pub fn with_source(mut self, source: ParamSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn convert_underscores(mut self, convert: bool) -> Self {
        if let ParamSource::Header { .. } = self.source {
            self.source = ParamSource::Header {
                convert_underscores: convert,
            };
        }
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Required iff there is no default and the type is not optional.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.ty.is_optional()
    }

    /// Query key: the alias when set, otherwise the name.
    #[must_use]
    pub fn lookup_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Header key after alias and underscore conversion.
    #[must_use]
    pub fn header_key(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match self.source {
            ParamSource::Header {
                convert_underscores: true,
            } => self.name.replace('_', "-"),
            _ => self.name.clone(),
        }
    }
}
