//! Typed parameter wrapping
//!
//! Attaches [`SqlType`] metadata to values whose type a driver cannot infer
//! safely from the raw value: NULLs, booleans, integers outside the signed
//! 32-bit range, decimals, temporals, byte strings, arrays, and maps.
//! Strings, small integers, and floats pass through unwrapped.

use rebind_types::{ParamValue, Parameter, ParameterInfo, Params, SqlType, TypedParam};

/// Largest magnitude a driver may assume fits a 32-bit signed column.
pub const MAX_32BIT_INT: i64 = 2_147_483_647;

/// Wraps one value if its type needs explicit coercion downstream.
///
/// The rules apply in order; the first match wins. Values with no rule pass
/// through untouched.
#[must_use]
pub fn wrap_value(value: ParamValue, semantic_name: Option<&str>) -> Parameter {
    let data_type = match &value {
        ParamValue::Null => Some(SqlType::Null),
        ParamValue::Bool(_) => Some(SqlType::Boolean),
        ParamValue::Int(v) if v.unsigned_abs() > MAX_32BIT_INT as u64 => Some(SqlType::BigInt),
        ParamValue::Decimal(_) => Some(SqlType::Decimal),
        ParamValue::Date(_) => Some(SqlType::Date),
        ParamValue::Timestamp(_) => Some(SqlType::Timestamp),
        ParamValue::Bytes(_) => Some(SqlType::Binary),
        ParamValue::Array(_) => Some(SqlType::Array),
        ParamValue::Json(_) => Some(SqlType::Json),
        ParamValue::Int(_) | ParamValue::Float(_) | ParamValue::Text(_) => None,
    };
    match data_type {
        Some(data_type) => Parameter::Typed(TypedParam::new(value, data_type, semantic_name)),
        None => Parameter::Plain(value),
    }
}

/// Wraps a slot, leaving already-wrapped values untouched.
#[must_use]
pub fn wrap_slot(param: Parameter, semantic_name: Option<&str>) -> Parameter {
    match param {
        Parameter::Plain(value) => wrap_value(value, semantic_name),
        typed @ Parameter::Typed(_) => typed,
    }
}

/// Wraps every value in a container, preserving its shape.
///
/// Positional slots take their semantic name from the placeholder at the
/// same index when it has one; named slots use their key. A container that
/// already holds any wrapped value is returned unchanged.
#[must_use]
pub fn wrap_parameters(params: Params, placeholders: &[ParameterInfo]) -> Params {
    let already_wrapped = match &params {
        Params::None => false,
        Params::Scalar(p) => p.is_wrapped(),
        Params::Positional(values) => values.iter().any(Parameter::is_wrapped),
        Params::Named(values) => values.values().any(Parameter::is_wrapped),
    };
    if already_wrapped {
        return params;
    }

    match params {
        Params::None => Params::None,
        Params::Scalar(p) => {
            let name = placeholders.first().and_then(|info| info.name.as_deref().map(str::to_owned));
            Params::Scalar(wrap_slot(p, name.as_deref()))
        }
        Params::Positional(values) => Params::Positional(
            values
                .into_iter()
                .enumerate()
                .map(|(i, p)| {
                    let name = placeholders.get(i).and_then(|info| info.name.as_deref().map(str::to_owned));
                    wrap_slot(p, name.as_deref())
                })
                .collect(),
        ),
        Params::Named(values) => Params::Named(
            values
                .into_iter()
                .map(|(key, p)| {
                    let wrapped = wrap_slot(p, Some(key.as_str()));
                    (key, wrapped)
                })
                .collect(),
        ),
    }
}
