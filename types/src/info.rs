use core::fmt;
use core::hash::{Hash, Hasher};

use compact_str::CompactString;

use crate::style::ParameterStyle;

/// An immutable descriptor for one placeholder found in SQL text.
///
/// Produced by the lexer in source order. `position` is the byte offset of
/// the placeholder's first character; `ordinal` is its zero-based index in
/// the extracted list; `placeholder_text` is the exact substring a rewriter
/// replaces.
///
/// Equality and hashing consider `(name, style, position)` only, so two
/// extractions of the same SQL compare equal regardless of how ordinals were
/// assigned.
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// Identifier for named styles; digit string for positional-numeric
    /// styles; `None` for `?` and `%s`.
    pub name: Option<CompactString>,
    /// The placeholder syntax this descriptor was lexed as.
    pub style: ParameterStyle,
    /// Byte offset of the placeholder's first character in the source SQL.
    pub position: usize,
    /// Zero-based index into the ordered placeholder list.
    pub ordinal: usize,
    /// The exact substring that will be replaced on rewrite.
    pub placeholder_text: CompactString,
}

impl ParameterInfo {
    pub fn new(
        name: Option<&str>,
        style: ParameterStyle,
        position: usize,
        ordinal: usize,
        placeholder_text: &str,
    ) -> Self {
        Self {
            name: name.map(CompactString::new),
            style,
            position,
            ordinal,
            placeholder_text: CompactString::new(placeholder_text),
        }
    }
}

impl PartialEq for ParameterInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.style == other.style && self.position == other.position
    }
}

impl Eq for ParameterInfo {}

impl Hash for ParameterInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.style.hash(state);
        self.position.hash(state);
    }
}

impl fmt::Display for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} `{}` at {}", name, self.placeholder_text, self.position),
            None => write!(f, "#{} `{}` at {}", self.ordinal, self.placeholder_text, self.position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_ordinal_and_text() {
        let a = ParameterInfo::new(Some("id"), ParameterStyle::NamedColon, 10, 0, ":id");
        let b = ParameterInfo::new(Some("id"), ParameterStyle::NamedColon, 10, 5, ":id");
        assert_eq!(a, b);

        let c = ParameterInfo::new(Some("id"), ParameterStyle::NamedColon, 11, 0, ":id");
        assert_ne!(a, c);
    }

    #[test]
    fn test_list_equality() {
        let make = || {
            vec![
                ParameterInfo::new(None, ParameterStyle::Qmark, 3, 0, "?"),
                ParameterInfo::new(None, ParameterStyle::Qmark, 9, 1, "?"),
            ]
        };
        assert_eq!(make(), make());
    }
}
