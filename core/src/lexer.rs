//! Placeholder lexer
//!
//! A single left-to-right scan over raw SQL that emits an ordered list of
//! [`ParameterInfo`] descriptors. The scan skips every token class that can
//! contain placeholder-looking characters: quoted strings and identifiers,
//! dollar-quoted blocks, line and block comments, the PostgreSQL JSON
//! existence operators (`??`, `?|`, `?&`), and `::type` casts.
//!
//! The lexer never fails. Malformed SQL is the AST oracle's problem; an
//! unterminated dollar-quoted block simply ends the scan, returning the
//! placeholders recognized before it.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use rebind_types::{ParameterInfo, ParameterStyle};

use crate::cache;

// One compiled grammar with named alternatives. Order matters twice: skip
// classes before placeholder classes, and `:1` before `:name`.
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?xi)
        "(?:[^"]|"")*"                          # double-quoted identifiers
        | '(?:[^']|'')*'                        # single-quoted strings, '' escapes
        | \$(?P<dollar_tag>\w*)\$               # dollar-quote opener, closed manually
        | --[^\r\n]*                            # line comments
        | /\*[^*]*\*+(?:[^/*][^*]*\*+)*/        # block comments (non-nested)
        | \?\?|\?\||\?&                         # JSON existence operators, not placeholders
        | ::\w+                                 # type casts, not placeholders
        | %\((?P<pyformat_name>\w+)\)s          # %(name)s
        | (?P<pyformat_pos>%s)                  # %s
        | :(?P<colon_num>\d+)                   # :1 before :name
        | :(?P<colon_name>\w+)                  # :name
        | @(?P<at_name>\w+)                     # @name
        | \$(?P<dollar_name>\w+)                # $1 or $name, split on isdigit
        | (?P<qmark>\?\d*)                      # ? and SQLite-style ?NNN
        "#,
    )
    .unwrap()
});

/// Scans `sql` and returns every placeholder in source order.
///
/// Pure function of the string; `ordinal` is assigned by emission order and
/// `position` is the byte offset of the match. Use [`lex`] for the cached
/// entry point.
#[must_use]
pub fn extract_placeholders(sql: &str) -> Vec<ParameterInfo> {
    let mut out = Vec::new();
    let mut ordinal = 0usize;
    let mut at = 0usize;

    while at <= sql.len() {
        let Some(caps) = PLACEHOLDER_REGEX.captures_at(sql, at) else {
            break;
        };
        let Some(whole) = caps.get(0) else { break };
        let (start, end) = (whole.start(), whole.end());

        if let Some(tag) = caps.name("dollar_tag") {
            // Skip to the matching `$tag$`; an unterminated block ends the
            // scan with whatever was recognized so far.
            let closer = format!("${}$", tag.as_str());
            match sql[end..].find(&closer) {
                Some(rel) => {
                    at = end + rel + closer.len();
                    continue;
                }
                None => break,
            }
        }

        let mut emit = |name: Option<&str>, style: ParameterStyle| {
            out.push(ParameterInfo::new(name, style, start, ordinal, whole.as_str()));
            ordinal += 1;
        };

        if let Some(name) = caps.name("pyformat_name") {
            emit(Some(name.as_str()), ParameterStyle::NamedPyformat);
        } else if caps.name("pyformat_pos").is_some() {
            emit(None, ParameterStyle::PositionalPyformat);
        } else if let Some(num) = caps.name("colon_num") {
            emit(Some(num.as_str()), ParameterStyle::PositionalColon);
        } else if let Some(name) = caps.name("colon_name") {
            emit(Some(name.as_str()), ParameterStyle::NamedColon);
        } else if let Some(name) = caps.name("at_name") {
            emit(Some(name.as_str()), ParameterStyle::NamedAt);
        } else if let Some(name) = caps.name("dollar_name") {
            let style = if name.as_str().bytes().all(|b| b.is_ascii_digit()) {
                ParameterStyle::Numeric
            } else {
                ParameterStyle::NamedDollar
            };
            emit(Some(name.as_str()), style);
        } else if let Some(q) = caps.name("qmark") {
            let digits = &q.as_str()[1..];
            emit((!digits.is_empty()).then_some(digits), ParameterStyle::Qmark);
        }
        // Anything else was a skip class.

        at = if end > start { end } else { end + 1 };
    }

    out
}

/// Cached placeholder extraction, keyed on the raw SQL text.
#[must_use]
pub fn lex(sql: &str) -> Vec<ParameterInfo> {
    cache::lexer_cache().get_or_insert_with(sql, || extract_placeholders(sql))
}

/// The set of distinct styles present in a placeholder list.
#[must_use]
pub fn styles(placeholders: &[ParameterInfo]) -> HashSet<ParameterStyle> {
    placeholders.iter().map(|p| p.style).collect()
}

/// The dominant style of a placeholder list: highest count wins, precedence
/// rank breaks ties, [`ParameterStyle::None`] for an empty list.
#[must_use]
pub fn dominant_style(placeholders: &[ParameterInfo]) -> ParameterStyle {
    if placeholders.is_empty() {
        return ParameterStyle::None;
    }
    let mut counts: Vec<(ParameterStyle, usize)> = Vec::new();
    for p in placeholders {
        match counts.iter_mut().find(|(style, _)| *style == p.style) {
            Some((_, n)) => *n += 1,
            None => counts.push((p.style, 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|(style, n)| (*n, style.precedence()))
        .map(|(style, _)| style)
        .unwrap_or(ParameterStyle::None)
}

/// Whether a rewrite toward `target` would change the SQL.
///
/// `:1`-style positional colons already satisfy a named-colon target, the
/// way Oracle drivers accept both.
#[must_use]
pub fn needs_conversion(placeholders: &[ParameterInfo], target: ParameterStyle) -> bool {
    if placeholders.is_empty() {
        return false;
    }
    let detected = styles(placeholders);
    if target == ParameterStyle::NamedColon && detected.contains(&ParameterStyle::PositionalColon) {
        return false;
    }
    !detected.contains(&target)
}

/// Whether the placeholder list calls for a keyed-map parameter container.
#[must_use]
pub fn expects_named(placeholders: &[ParameterInfo]) -> bool {
    placeholders.iter().any(|p| p.style.is_named())
}
