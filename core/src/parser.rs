//! AST oracle wrapper
//!
//! Thin layer over `sqlparser` that (a) maps [`Dialect`] onto parser
//! dialects, (b) routes parses through the AST fragment cache with
//! double-checked locking, and (c) pre-converts placeholder forms the
//! tokenizer cannot accept.
//!
//! The oracle's serialization is never used to rewrite user SQL; rewriting
//! stays text-level in [`crate::rewrite`]. Parsed trees feed analysis and
//! the literal-parameterization step only.

use std::ops::ControlFlow;

use compact_str::format_compact;
use sqlparser::ast::{self, Statement};
use sqlparser::dialect::{
    BigQueryDialect, Dialect as SqlparserDialect, GenericDialect, MySqlDialect, OracleDialect,
    PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;

use rebind_types::{Dialect, ParameterInfo, ParameterStyle};

use crate::cache::{self, AstKey, CachedFragment};
use crate::error::{RebindError, Result};

/// What the pre-parse placeholder conversion did, so later stages can still
/// honor the caller's original placeholder names and styles.
#[derive(Debug, Clone, Default)]
pub struct ConversionState {
    pub was_transformed: bool,
    pub original_styles: Vec<ParameterStyle>,
    pub original_placeholders: Vec<ParameterInfo>,
}

fn sqlparser_dialect(dialect: Dialect) -> Box<dyn SqlparserDialect> {
    match dialect {
        Dialect::Generic => Box::new(GenericDialect {}),
        Dialect::SQLite => Box::new(SQLiteDialect {}),
        Dialect::PostgreSQL => Box::new(PostgreSqlDialect {}),
        Dialect::MySQL => Box::new(MySqlDialect {}),
        Dialect::BigQuery => Box::new(BigQueryDialect {}),
        Dialect::Oracle => Box::new(OracleDialect {}),
    }
}

fn count_placeholders(statement: &Statement) -> usize {
    let mut count = 0usize;
    let _ = ast::visit_expressions(statement, |expr: &ast::Expr| {
        if let ast::Expr::Value(value) = expr
            && matches!(value.value, ast::Value::Placeholder(_))
        {
            count += 1;
        }
        ControlFlow::<()>::Continue(())
    });
    count
}

/// Parses one statement, caching the result per normalized SQL and dialect.
///
/// Lookups clone the cached tree, so callers may transform the returned
/// statement freely.
pub fn parse(sql: &str, dialect: Dialect) -> Result<Statement> {
    let key = AstKey::new(sql, dialect);
    // The parse itself runs outside the cache lock; the second read under
    // the lock discards this parse when a concurrent fill won the race.
    let fragment = cache::ast_cache().try_get_or_insert_with(&key, || {
        let statement = parse_uncached(sql, dialect)?;
        Ok::<_, RebindError>(CachedFragment {
            sql: statement.to_string(),
            parameter_count: count_placeholders(&statement),
            statement,
        })
    })?;
    Ok(fragment.statement)
}

fn parse_uncached(sql: &str, dialect: Dialect) -> Result<Statement> {
    let parsed = Parser::parse_sql(&*sqlparser_dialect(dialect), sql)
        .map_err(|e| RebindError::Parse(format_compact!("{e}")))?;
    parsed
        .into_iter()
        .next()
        .ok_or_else(|| RebindError::Parse(format_compact!("no statement found in input")))
}

/// Parses a multi-statement script without caching.
pub fn parse_script(sql: &str, dialect: Dialect) -> Result<Vec<Statement>> {
    Parser::parse_sql(&*sqlparser_dialect(dialect), sql)
        .map_err(|e| RebindError::Parse(format_compact!("{e}")))
}

/// Rewrites every placeholder to the tokenizer-universal `?N` form.
///
/// `:name`, `@name`, `$name`, `:1`, `%s`, and `%(name)s` are not uniformly
/// tokenizable across dialects; numbered question marks are, and they keep
/// the ordinal inside the node for the transformer.
#[must_use]
pub fn canonicalize_placeholders(sql: &str, placeholders: &[ParameterInfo]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0usize;
    for (i, info) in placeholders.iter().enumerate() {
        out.push_str(&sql[cursor..info.position]);
        out.push('?');
        out.push_str(&(i + 1).to_string());
        cursor = info.position + info.placeholder_text.len();
    }
    out.push_str(&sql[cursor..]);
    out
}

/// Parses SQL for the transformation pipeline, pre-converting placeholders
/// to the canonical `?N` form and recording what was done.
pub fn parse_for_pipeline(
    sql: &str,
    placeholders: &[ParameterInfo],
    dialect: Dialect,
) -> Result<(Statement, ConversionState)> {
    if placeholders.is_empty() {
        return Ok((parse(sql, dialect)?, ConversionState::default()));
    }

    let canonical = canonicalize_placeholders(sql, placeholders);
    let statement = parse(&canonical, dialect)?;
    let mut original_styles: Vec<ParameterStyle> = Vec::new();
    for info in placeholders {
        if !original_styles.contains(&info.style) {
            original_styles.push(info.style);
        }
    }
    Ok((
        statement,
        ConversionState {
            was_transformed: canonical != sql,
            original_styles,
            original_placeholders: placeholders.to_vec(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::extract_placeholders;

    #[test]
    fn test_canonicalize() {
        let sql = "UPDATE u SET e = :email WHERE id = :id";
        let placeholders = extract_placeholders(sql);
        assert_eq!(
            canonicalize_placeholders(sql, &placeholders),
            "UPDATE u SET e = ?1 WHERE id = ?2"
        );
    }

    #[test]
    fn test_parse_canonical_under_all_dialects() {
        let sql = "SELECT * FROM t WHERE a = ?1 AND b = ?2";
        for dialect in [
            Dialect::Generic,
            Dialect::SQLite,
            Dialect::PostgreSQL,
            Dialect::MySQL,
            Dialect::BigQuery,
            Dialect::Oracle,
        ] {
            assert!(parse(sql, dialect).is_ok(), "canonical form parses under {dialect}");
        }
    }

    #[test]
    fn test_parse_for_pipeline_records_conversion() {
        let sql = "SELECT * FROM t WHERE id = %(id)s";
        let placeholders = extract_placeholders(sql);
        let (_, state) = parse_for_pipeline(sql, &placeholders, Dialect::Generic).unwrap();
        assert!(state.was_transformed);
        assert_eq!(state.original_styles, vec![ParameterStyle::NamedPyformat]);
        assert_eq!(state.original_placeholders.len(), 1);
    }

    #[test]
    fn test_parse_failure_surfaces() {
        assert!(matches!(
            parse("SELEC broken FRM", Dialect::Generic),
            Err(RebindError::Parse(_))
        ));
    }

    #[test]
    fn test_parameter_count_in_cache() {
        cache::clear_caches();
        let sql = "SELECT * FROM t WHERE a = ?1 AND b = ?2";
        parse(sql, Dialect::Generic).unwrap();
        let key = AstKey::new(sql, Dialect::Generic);
        let fragment = cache::ast_cache().get(&key).unwrap();
        assert_eq!(fragment.parameter_count, 2);
    }
}
