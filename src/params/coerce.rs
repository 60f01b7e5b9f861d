//! String to typed-value coercion for query, path and header parameters.

use serde_json::Value;

use super::descriptor::ParamType;
use crate::error::BindError;

const TRUE_VALUES: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_VALUES: [&str; 5] = ["false", "0", "no", "off", ""];

/// Parse a boolean the way form and query values are usually written.
///
/// Matching is case-insensitive but exact: surrounding whitespace is not stripped.
/// Returns `None` for anything outside the accepted true/false sets.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    let lowered = raw.to_ascii_lowercase();
    if TRUE_VALUES.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSE_VALUES.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Coerce one raw string to `ty` (after unwrapping `Optional`).
///
/// # Errors
///
/// Returns [`BindError::InvalidParameterValue`] naming `name`, the raw value and the
/// expected type when the string does not parse.
pub fn coerce_value(raw: &str, ty: &ParamType, name: &str) -> Result<Value, BindError> {
    let ty = ty.unwrap_optional();
    let invalid = || BindError::InvalidParameterValue {
        name: name.to_string(),
        value: raw.to_string(),
        expected: ty.type_name(),
    };

    match ty {
        ParamType::Str | ParamType::Any => Ok(Value::String(raw.to_string())),
        ParamType::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        ParamType::Float => {
            let parsed: f64 = raw.trim().parse().map_err(|_| invalid())?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(invalid)
        }
        ParamType::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(invalid),
        // A single raw value bound to a list type becomes a one-element list.
        ParamType::List(inner) => Ok(Value::Array(vec![coerce_value(raw, inner, name)?])),
        ParamType::Custom { parse, .. } => parse(raw).map_err(|_| invalid()),
        ParamType::Model(model) => {
            let decoded: Value =
                serde_json::from_str(raw).map_err(|e| BindError::InvalidRequestBody {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
            model
                .validate(&decoded)
                .map_err(|reason| BindError::InvalidRequestBody {
                    name: name.to_string(),
                    reason,
                })
        }
        ParamType::Facet(_) | ParamType::Optional(_) => Err(invalid()),
    }
}

/// Coerce every raw value of a repeated parameter, preserving order.
///
/// # Errors
///
/// Fails on the first element that does not coerce.
pub fn coerce_list<'a, I>(raws: I, item: &ParamType, name: &str) -> Result<Value, BindError>
where
    I: IntoIterator<Item = &'a str>,
{
    raws.into_iter()
        .map(|raw| coerce_value(raw, item, name))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}
