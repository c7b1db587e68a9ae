//! Parameter container reshaping
//!
//! Converts the caller's container between ordered-sequence and keyed-map
//! shapes so its iteration order matches a placeholder list, and validates
//! containers against placeholder lists.

use compact_str::{CompactString, format_compact};
use indexmap::IndexMap;

use rebind_types::{ParamValue, Parameter, ParameterInfo, ParameterStyle, Params};

use crate::error::{RebindError, Result};
use crate::lexer::expects_named;

/// The container shape a target style calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// Ordered sequence, matched by position
    Sequence,
    /// Keyed map, matched by name
    Map,
    /// No container at all (static embedding)
    None,
}

/// Maps a target placeholder style to the container shape it expects.
#[must_use]
pub const fn target_shape(style: ParameterStyle) -> TargetShape {
    match style {
        ParameterStyle::NamedColon
        | ParameterStyle::NamedAt
        | ParameterStyle::NamedDollar
        | ParameterStyle::NamedPyformat => TargetShape::Map,
        ParameterStyle::Static => TargetShape::None,
        _ => TargetShape::Sequence,
    }
}

/// Reshapes `params` so the result's iteration order matches
/// `placeholders` under `target_style`.
///
/// Containers already in the target shape are returned unchanged.
pub fn reshape(params: Params, placeholders: &[ParameterInfo], target_style: ParameterStyle) -> Result<Params> {
    match target_shape(target_style) {
        TargetShape::None => Ok(Params::None),
        TargetShape::Sequence => to_sequence(params, placeholders),
        TargetShape::Map => to_map(params, placeholders),
    }
}

fn to_sequence(params: Params, placeholders: &[ParameterInfo]) -> Result<Params> {
    match params {
        Params::None => Ok(Params::None),
        positional @ Params::Positional(_) => Ok(positional),
        Params::Scalar(value) => {
            if placeholders.len() != 1 {
                return Err(RebindError::MissingParameter(format_compact!(
                    "SQL expects {} parameters but a scalar value was provided",
                    placeholders.len()
                )));
            }
            Ok(Params::Positional(vec![value]))
        }
        Params::Named(map) => {
            // Resolution chain per placeholder: its name, `param_{ordinal}`,
            // the 1-based digit key, the value at its insertion index, null.
            let mut out = Vec::with_capacity(placeholders.len());
            for info in placeholders {
                let by_name = info.name.as_deref().and_then(|name| map.get(name));
                let by_param_key = by_name.or_else(|| map.get(format_compact!("param_{}", info.ordinal).as_str()));
                let by_digit = by_param_key.or_else(|| map.get(format_compact!("{}", info.ordinal + 1).as_str()));
                let by_index = by_digit.or_else(|| map.get_index(info.ordinal).map(|(_, v)| v));
                out.push(by_index.cloned().unwrap_or(Parameter::Plain(ParamValue::Null)));
            }
            Ok(Params::Positional(out))
        }
    }
}

fn to_map(params: Params, placeholders: &[ParameterInfo]) -> Result<Params> {
    match params {
        Params::None => Ok(Params::None),
        named @ Params::Named(_) => Ok(named),
        Params::Scalar(value) => {
            if placeholders.len() != 1 {
                return Err(RebindError::MissingParameter(format_compact!(
                    "SQL expects {} parameters but a scalar value was provided",
                    placeholders.len()
                )));
            }
            let key = placeholders
                .first()
                .and_then(|info| info.name.clone())
                .unwrap_or_else(|| CompactString::new("param_0"));
            let mut map = IndexMap::new();
            map.insert(key, value);
            Ok(Params::Named(map))
        }
        Params::Positional(values) => {
            let mut map: IndexMap<CompactString, Parameter> = IndexMap::with_capacity(values.len());
            for (i, value) in values.into_iter().enumerate() {
                let named_key = placeholders.get(i).and_then(|info| info.name.clone());
                let key = match named_key {
                    Some(name) if !map.contains_key(name.as_str()) => name,
                    _ => format_compact!("param_{i}"),
                };
                map.insert(key, value);
            }
            Ok(Params::Named(map))
        }
    }
}

/// Validates a parameter container against a placeholder list.
///
/// Mismatched shapes raise `ParameterStyleMismatch`; absent values raise
/// `MissingParameter`; surplus values raise `ExtraParameter`. A container
/// of [`Params::None`] passes, since binding may happen later.
pub fn validate(placeholders: &[ParameterInfo], params: &Params) -> Result<()> {
    if placeholders.is_empty() {
        if !params.is_empty() {
            return Err(RebindError::ExtraParameter(format_compact!(
                "SQL has no parameters but a {} was provided",
                params.kind()
            )));
        }
        return Ok(());
    }

    if expects_named(placeholders) {
        match params {
            Params::Named(map) => {
                let required: Vec<&str> = placeholders.iter().filter_map(|p| p.name.as_deref()).collect();
                let mut missing: Vec<&str> =
                    required.iter().copied().filter(|name| !map.contains_key(*name)).collect();
                if !missing.is_empty() {
                    missing.sort_unstable();
                    missing.dedup();
                    return Err(RebindError::MissingParameter(format_compact!(
                        "missing required parameters: {}",
                        missing.join(", ")
                    )));
                }
                let mut extra: Vec<&str> = map
                    .keys()
                    .map(CompactString::as_str)
                    .filter(|key| !required.contains(key))
                    .collect();
                if !extra.is_empty() {
                    extra.sort_unstable();
                    return Err(RebindError::ExtraParameter(format_compact!(
                        "parameters not referenced by the SQL: {}",
                        extra.join(", ")
                    )));
                }
                Ok(())
            }
            Params::Scalar(_) => {
                if placeholders.len() == 1 {
                    Ok(())
                } else {
                    Err(RebindError::MissingParameter(format_compact!(
                        "SQL expects {} parameters but a scalar value was provided",
                        placeholders.len()
                    )))
                }
            }
            Params::Positional(_) => Err(RebindError::ParameterStyleMismatch(format_compact!(
                "SQL expects named parameters (map) but got a sequence of {}",
                params.len()
            ))),
            Params::None => Ok(()),
        }
    } else {
        match params {
            Params::Named(_) => Err(RebindError::ParameterStyleMismatch(format_compact!(
                "SQL expects positional parameters (sequence) but got a map of {}",
                params.len()
            ))),
            Params::Positional(values) => {
                if values.len() < placeholders.len() {
                    return Err(RebindError::MissingParameter(format_compact!(
                        "SQL expects {} parameters but only {} were provided",
                        placeholders.len(),
                        values.len()
                    )));
                }
                if values.len() > placeholders.len() {
                    return Err(RebindError::ExtraParameter(format_compact!(
                        "SQL expects {} parameters but {} were provided",
                        placeholders.len(),
                        values.len()
                    )));
                }
                Ok(())
            }
            Params::Scalar(_) => {
                if placeholders.len() == 1 {
                    Ok(())
                } else {
                    Err(RebindError::MissingParameter(format_compact!(
                        "SQL expects {} parameters but a scalar value was provided",
                        placeholders.len()
                    )))
                }
            }
            Params::None => Ok(()),
        }
    }
}
