//! Database dialect identifiers
//!
//! The engine only needs to know which grammar family a statement belongs
//! to; everything dialect-specific beyond that (placeholder syntax, driver
//! expectations) lives in the driver configuration.

/// Grammar family a statement is parsed and analyzed under.
///
/// ```
/// use rebind_types::Dialect;
///
/// assert_eq!(Dialect::parse("Postgres"), Some(Dialect::PostgreSQL));
/// assert_eq!(Dialect::PostgreSQL.as_str(), "postgresql");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Dialect-neutral parsing rules
    #[default]
    Generic,

    /// SQLite - `?` positional placeholders
    SQLite,

    /// PostgreSQL - `$1, $2, ...` numbered placeholders
    PostgreSQL,

    /// MySQL - `?` positional placeholders
    MySQL,

    /// BigQuery - `@name` named placeholders
    BigQuery,

    /// Oracle - `:name` and `:1` placeholders
    Oracle,
}

/// One row per dialect: the canonical name first, then every accepted
/// alias. `parse` matches any column; `as_str` reports the first.
const DIALECT_NAMES: &[(Dialect, &[&str])] = &[
    (Dialect::Generic, &["generic", "ansi"]),
    (Dialect::SQLite, &["sqlite", "turso", "libsql"]),
    (Dialect::PostgreSQL, &["postgresql", "postgres", "pg"]),
    (Dialect::MySQL, &["mysql", "mariadb"]),
    (Dialect::BigQuery, &["bigquery", "bq"]),
    (Dialect::Oracle, &["oracle"]),
];

impl Dialect {
    /// Resolves a dialect name or alias, ignoring ASCII case. Unknown
    /// names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        DIALECT_NAMES.iter().find_map(|(dialect, aliases)| {
            aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
                .then_some(*dialect)
        })
    }

    /// The canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        DIALECT_NAMES
            .iter()
            .find(|(dialect, _)| dialect == self)
            .and_then(|(_, aliases)| aliases.first().copied())
            .unwrap_or("generic")
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::parse(s).ok_or(UnknownDialect)
    }
}

/// A name that matched no row of the dialect table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownDialect;

impl core::fmt::Display for UnknownDialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("no dialect is registered under that name")
    }
}

impl std::error::Error for UnknownDialect {}
