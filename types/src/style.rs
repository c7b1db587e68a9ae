use core::fmt;

/// The placeholder syntax a piece of SQL uses for bind parameters.
///
/// Eight concrete syntaxes plus two sentinels: [`ParameterStyle::None`] for
/// SQL without parameters and [`ParameterStyle::Static`] for output where
/// every parameter is inlined as a SQL literal.
///
/// # Examples
///
/// ```
/// use rebind_types::ParameterStyle;
///
/// assert!(ParameterStyle::Qmark.is_positional());
/// assert!(ParameterStyle::NamedColon.is_named());
/// assert_eq!(ParameterStyle::Numeric.as_str(), "numeric");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStyle {
    /// No parameters present
    None,
    /// Parameters are inlined as SQL literals; no placeholders remain
    Static,
    /// `?`
    Qmark,
    /// `$1`, `$2`, ... (1-based)
    Numeric,
    /// `:name`
    NamedColon,
    /// `:1`, `:2`, ... (1-based)
    PositionalColon,
    /// `@name`
    NamedAt,
    /// `$name` (non-numeric identifier)
    NamedDollar,
    /// `%(name)s`
    #[serde(rename = "pyformat_named")]
    NamedPyformat,
    /// `%s`
    #[serde(rename = "pyformat_positional")]
    PositionalPyformat,
}

impl ParameterStyle {
    /// Returns `true` for styles whose placeholders are matched to values
    /// by position rather than by name.
    #[inline]
    #[must_use]
    pub const fn is_positional(&self) -> bool {
        matches!(
            self,
            ParameterStyle::Qmark
                | ParameterStyle::Numeric
                | ParameterStyle::PositionalColon
                | ParameterStyle::PositionalPyformat
        )
    }

    /// Returns `true` for styles whose placeholders carry an identifier.
    #[inline]
    #[must_use]
    pub const fn is_named(&self) -> bool {
        matches!(
            self,
            ParameterStyle::NamedColon
                | ParameterStyle::NamedAt
                | ParameterStyle::NamedDollar
                | ParameterStyle::NamedPyformat
        )
    }

    /// Tie-break rank used when detecting the dominant style of mixed input.
    ///
    /// Counts are compared first; this rank breaks count ties. Named styles
    /// outrank positional ones.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            ParameterStyle::NamedPyformat => 8,
            ParameterStyle::NamedColon => 7,
            ParameterStyle::NamedDollar => 6,
            ParameterStyle::NamedAt => 5,
            ParameterStyle::PositionalPyformat => 4,
            ParameterStyle::PositionalColon => 3,
            ParameterStyle::Numeric => 2,
            ParameterStyle::Qmark => 1,
            ParameterStyle::None | ParameterStyle::Static => 0,
        }
    }

    /// Get the style name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ParameterStyle::None => "none",
            ParameterStyle::Static => "static",
            ParameterStyle::Qmark => "qmark",
            ParameterStyle::Numeric => "numeric",
            ParameterStyle::NamedColon => "named_colon",
            ParameterStyle::PositionalColon => "positional_colon",
            ParameterStyle::NamedAt => "named_at",
            ParameterStyle::NamedDollar => "named_dollar",
            ParameterStyle::NamedPyformat => "pyformat_named",
            ParameterStyle::PositionalPyformat => "pyformat_positional",
        }
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_named_split() {
        for style in [
            ParameterStyle::Qmark,
            ParameterStyle::Numeric,
            ParameterStyle::PositionalColon,
            ParameterStyle::PositionalPyformat,
        ] {
            assert!(style.is_positional());
            assert!(!style.is_named());
        }
        for style in [
            ParameterStyle::NamedColon,
            ParameterStyle::NamedAt,
            ParameterStyle::NamedDollar,
            ParameterStyle::NamedPyformat,
        ] {
            assert!(style.is_named());
            assert!(!style.is_positional());
        }
        assert!(!ParameterStyle::None.is_positional());
        assert!(!ParameterStyle::Static.is_named());
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(ParameterStyle::NamedPyformat.precedence() > ParameterStyle::NamedColon.precedence());
        assert!(ParameterStyle::NamedColon.precedence() > ParameterStyle::NamedDollar.precedence());
        assert!(ParameterStyle::NamedDollar.precedence() > ParameterStyle::NamedAt.precedence());
        assert!(ParameterStyle::NamedAt.precedence() > ParameterStyle::PositionalPyformat.precedence());
        assert!(ParameterStyle::PositionalPyformat.precedence() > ParameterStyle::PositionalColon.precedence());
        assert!(ParameterStyle::PositionalColon.precedence() > ParameterStyle::Numeric.precedence());
        assert!(ParameterStyle::Numeric.precedence() > ParameterStyle::Qmark.precedence());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ParameterStyle::Qmark), "qmark");
        assert_eq!(format!("{}", ParameterStyle::NamedPyformat), "pyformat_named");
    }
}
