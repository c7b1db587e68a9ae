//! Rebind Core - SQL parameter normalization engine
//!
//! The processing core behind database-agnostic statement handling:
//!
//! - a placeholder lexer covering eight styles while skipping strings,
//!   dollar-quoted blocks, and comments;
//! - parameter-style conversion with container reshaping between ordered
//!   and keyed forms;
//! - typed parameter wrapping so drivers can coerce values correctly;
//! - a single-pass statement transformation pipeline (literal
//!   parameterization, NULL elision, COPY staging, safety scan, metadata
//!   and returns-rows analysis, many-statement expansion);
//! - thread-safe bounded LRU caches for lexed placeholders, parsed trees,
//!   and compiled statements.
//!
//! Everything is synchronous and CPU-bound; parallel callers need no
//! external synchronization. The entry point drivers use is
//! [`compile`]; the pieces are public for direct use.

pub mod cache;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod processor;
pub mod reshape;
pub mod rewrite;
pub mod transform;
pub mod wrap;

// Re-export key types and operations
pub use cache::{
    CacheConfig, CacheStats, CacheStatsReport, LruCache, cache_stats, clear_caches, configure_caches,
    reset_cache_stats,
};
pub use config::DriverConfig;
pub use error::{RebindError, Result};
pub use lexer::{dominant_style, extract_placeholders, lex, needs_conversion, styles};
pub use parser::ConversionState;
pub use processor::{CompileOptions, ProcessedState, compile};
pub use reshape::{TargetShape, reshape, target_shape, validate};
pub use rewrite::{embed_static, rewrite};
pub use transform::{Analysis, OperationKind, Pipeline, PipelineFlags, TransformContext};
pub use wrap::{MAX_32BIT_INT, wrap_parameters, wrap_value};
