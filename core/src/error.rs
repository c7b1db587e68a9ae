//! Error types for rebind-core

use thiserror::Error;

/// Core error type for parameter normalization
///
/// Every failure mode is a distinct variant; messages are single lines
/// carrying the placeholder context, the observed input shape, and the
/// expected shape.
#[derive(Debug, Error)]
pub enum RebindError {
    /// Placeholders are named but an ordered container was supplied, or
    /// vice versa
    #[error("Parameter style mismatch: {0}")]
    ParameterStyleMismatch(compact_str::CompactString),

    /// A placeholder has no corresponding value
    #[error("Missing parameter: {0}")]
    MissingParameter(compact_str::CompactString),

    /// The container carries values no placeholder references
    #[error("Extra parameter: {0}")]
    ExtraParameter(compact_str::CompactString),

    /// The detected placeholder style cannot be accepted or rewritten
    #[error("Unsupported parameter style: {0}")]
    UnsupportedParameterStyle(compact_str::CompactString),

    /// The AST oracle rejected the SQL under strict parsing
    #[error("Parse error: {0}")]
    Parse(compact_str::CompactString),

    /// A parameter value has no safe literal rendering for static embedding
    #[error("Invalid literal for static embedding: {0}")]
    InvalidLiteralForStatic(compact_str::CompactString),
}

/// Result type for normalization operations
pub type Result<T> = core::result::Result<T, RebindError>;
