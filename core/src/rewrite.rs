//! Placeholder rewriting and static embedding
//!
//! Text-level transformation between placeholder styles. The input is
//! copied into an output buffer and each placeholder slice is replaced at
//! its recorded position, so every non-placeholder byte (comments and
//! string literals included) survives untouched.

use compact_str::format_compact;

use rebind_types::{ParamValue, ParameterInfo, ParameterStyle, Params};

use crate::error::{RebindError, Result};
use crate::reshape;

/// Renders the placeholder for ordinal `i` in the target style.
///
/// Named targets keep the original identifier when the source placeholder
/// was named, and synthesize `param_{i}` otherwise.
#[must_use]
pub fn render_placeholder(target_style: ParameterStyle, i: usize, original: &ParameterInfo) -> String {
    let named_fallback = |info: &ParameterInfo| {
        if info.style.is_named() {
            info.name
                .as_deref()
                .map(str::to_owned)
                .unwrap_or_else(|| format!("param_{i}"))
        } else {
            format!("param_{i}")
        }
    };
    match target_style {
        ParameterStyle::Qmark => "?".to_string(),
        ParameterStyle::Numeric => format!("${}", i + 1),
        ParameterStyle::PositionalPyformat => "%s".to_string(),
        ParameterStyle::PositionalColon => format!(":{}", i + 1),
        ParameterStyle::NamedColon => format!(":{}", named_fallback(original)),
        ParameterStyle::NamedPyformat => format!("%({})s", named_fallback(original)),
        ParameterStyle::NamedAt => format!("@{}", named_fallback(original)),
        ParameterStyle::NamedDollar => format!("${}", named_fallback(original)),
        // No placeholder rendering exists for the sentinels; the original
        // text stays in place and static embedding handles the rest.
        ParameterStyle::None | ParameterStyle::Static => original.placeholder_text.to_string(),
    }
}

/// Rewrites every placeholder in `sql` to `target_style`.
///
/// The Nth input placeholder becomes the Nth output placeholder; all other
/// bytes are copied verbatim.
#[must_use]
pub fn rewrite(sql: &str, placeholders: &[ParameterInfo], target_style: ParameterStyle) -> String {
    if placeholders.is_empty() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + placeholders.len() * 4);
    let mut cursor = 0usize;
    for (i, info) in placeholders.iter().enumerate() {
        out.push_str(&sql[cursor..info.position]);
        out.push_str(&render_placeholder(target_style, i, info));
        cursor = info.position + info.placeholder_text.len();
    }
    out.push_str(&sql[cursor..]);
    out
}

/// Renders a parameter value as a SQL literal for static embedding.
///
/// Byte strings and arrays have no portable literal form and are rejected
/// rather than guessed at.
pub fn render_static_literal(value: &ParamValue, context: &ParameterInfo) -> Result<String> {
    match value {
        ParamValue::Null => Ok("NULL".to_string()),
        ParamValue::Bool(true) => Ok("TRUE".to_string()),
        ParamValue::Bool(false) => Ok("FALSE".to_string()),
        ParamValue::Int(v) => Ok(v.to_string()),
        ParamValue::Float(v) => Ok(v.to_string()),
        ParamValue::Decimal(v) => Ok(v.to_string()),
        ParamValue::Text(v) => Ok(quote_string(v)),
        ParamValue::Date(v) => Ok(format!("'{}'", v.format("%Y-%m-%d"))),
        ParamValue::Timestamp(v) => Ok(format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%.f"))),
        ParamValue::Json(v) => {
            let rendered = serde_json::to_string(v).map_err(|e| {
                RebindError::InvalidLiteralForStatic(format_compact!("parameter {context}: {e}"))
            })?;
            Ok(quote_string(&rendered))
        }
        ParamValue::Bytes(_) => Err(RebindError::InvalidLiteralForStatic(format_compact!(
            "parameter {context}: byte strings have no safe literal rendering"
        ))),
        ParamValue::Array(_) => Err(RebindError::InvalidLiteralForStatic(format_compact!(
            "parameter {context}: arrays have no portable literal rendering"
        ))),
    }
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Inlines every parameter value into the SQL as a literal and drops the
/// container, implementing the `STATIC` output style.
pub fn embed_static(sql: &str, placeholders: &[ParameterInfo], params: Params) -> Result<(String, Params)> {
    if placeholders.is_empty() {
        return Ok((sql.to_string(), Params::None));
    }
    let ordered = match reshape::reshape(params, placeholders, ParameterStyle::Qmark)? {
        Params::Positional(values) => values,
        Params::None => Vec::new(),
        other => {
            return Err(RebindError::InvalidLiteralForStatic(format_compact!(
                "cannot order a {} container for static embedding",
                other.kind()
            )));
        }
    };

    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0usize;
    for info in placeholders {
        out.push_str(&sql[cursor..info.position]);
        match ordered.get(info.ordinal) {
            Some(slot) => out.push_str(&render_static_literal(slot.value(), info)?),
            // More placeholders than values: keep the placeholder text so
            // the gap stays visible to the caller.
            None => out.push_str(&info.placeholder_text),
        }
        cursor = info.position + info.placeholder_text.len();
    }
    out.push_str(&sql[cursor..]);
    Ok((out, Params::None))
}
