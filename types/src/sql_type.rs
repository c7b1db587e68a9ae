use core::fmt;

/// Symbolic SQL type attached to a wrapped parameter value.
///
/// Drivers use these tags to decide last-mile coercions; they are
/// deliberately coarse (one tag per coercion family, not per dialect type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Null,
    Boolean,
    Integer,
    BigInt,
    Float,
    Decimal,
    Date,
    Timestamp,
    Binary,
    Array,
    Json,
    Varchar,
}

impl SqlType {
    /// Get the type name as it would appear in DDL
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SqlType::Null => "NULL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Decimal => "DECIMAL",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Binary => "BINARY",
            SqlType::Array => "ARRAY",
            SqlType::Json => "JSON",
            SqlType::Varchar => "VARCHAR",
        }
    }

    /// Short lowercase tag used for fast dispatch and diagnostics
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        match self {
            SqlType::Null => "null",
            SqlType::Boolean => "boolean",
            SqlType::Integer => "integer",
            SqlType::BigInt => "bigint",
            SqlType::Float => "float",
            SqlType::Decimal => "decimal",
            SqlType::Date => "date",
            SqlType::Timestamp => "timestamp",
            SqlType::Binary => "binary",
            SqlType::Array => "array",
            SqlType::Json => "json",
            SqlType::Varchar => "str",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
