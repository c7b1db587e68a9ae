//! # Rebind
//!
//! Database-agnostic SQL parameter and placeholder normalization:
//! detect placeholders across eight styles, rewrite SQL between styles,
//! reshape parameter containers to what the target driver expects, attach
//! type metadata to values, and cache the expensive stages behind
//! thread-safe LRU structures.
//!
//! ```
//! use rebind::prelude::*;
//!
//! let state = compile(
//!     "SELECT * FROM t WHERE a = ? AND b = ?",
//!     Params::positional([ParamValue::Int(1), ParamValue::Int(2)]),
//!     &DriverConfig::postgres(),
//!     &CompileOptions::default().dialect(Dialect::PostgreSQL),
//! )
//! .unwrap();
//! assert_eq!(state.final_sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
//! ```

// Shared data model
pub use rebind_types::{Dialect, ParamValue, Parameter, ParameterInfo, ParameterStyle, Params, SqlType, TypedParam};

// Engine
pub use rebind_core::{
    Analysis, CacheConfig, CacheStats, CacheStatsReport, CompileOptions, ConversionState, DriverConfig,
    OperationKind, PipelineFlags, ProcessedState, RebindError, Result, TargetShape,
    cache_stats, clear_caches, compile, configure_caches, dominant_style, embed_static, lex,
    reset_cache_stats, reshape, rewrite, validate, wrap_parameters, wrap_value,
};

/// A comprehensive prelude that brings all commonly used items into scope.
pub mod prelude {
    pub use rebind_core::{
        CacheConfig, CompileOptions, DriverConfig, PipelineFlags, ProcessedState, RebindError, Result,
        cache_stats, clear_caches, compile, configure_caches, lex, reshape, rewrite, validate, wrap_parameters,
    };
    pub use rebind_types::{
        Dialect, ParamValue, Parameter, ParameterInfo, ParameterStyle, Params, SqlType, TypedParam,
    };
}
