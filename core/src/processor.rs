//! The compile pipeline
//!
//! Orchestrates the lexer, the AST steps, container reshaping, placeholder
//! rewriting, and the caches into the single entry point drivers call:
//! [`compile`]. The order of operations follows one contract: probe the
//! compiled cache, lex, parse or degrade, run the enabled tree steps,
//! expand IN lists, coerce values, select the execution style, run the
//! driver's output hook, and embed statically when asked to.

use compact_str::format_compact;
use smallvec::SmallVec;

use rebind_types::{Dialect, ParamValue, Parameter, ParameterInfo, ParameterStyle, Params};

use crate::cache::{self, CompiledKey};
use crate::config::DriverConfig;
use crate::error::{RebindError, Result};
use crate::lexer::{self, extract_placeholders};
use crate::parser;
use crate::reshape;
use crate::rewrite;
use crate::transform::{Analysis, Pipeline, PipelineFlags, TransformContext};
use crate::wrap;

/// Per-call knobs for [`compile`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub dialect: Dialect,
    /// Run the AST pipeline; `false` stays on the text-level path.
    pub is_parsed: bool,
    /// Surface oracle parse errors instead of degrading.
    pub strict_parsing: bool,
    /// The parameter container is a list of parameter sets.
    pub is_many: bool,
    pub flags: PipelineFlags,
    /// Force a target style regardless of the driver's execution set;
    /// `Static` inlines every value.
    pub target_style: Option<ParameterStyle>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Generic,
            is_parsed: true,
            strict_parsing: false,
            is_many: false,
            flags: PipelineFlags::default(),
            target_style: None,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn unparsed(mut self) -> Self {
        self.is_parsed = false;
        self
    }

    #[must_use]
    pub fn many(mut self) -> Self {
        self.is_many = true;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: PipelineFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn target(mut self, style: ParameterStyle) -> Self {
        self.target_style = Some(style);
        self
    }

    fn key_bits(&self) -> u32 {
        self.flags.bits()
            | (self.is_many as u32) << 12
            | (self.strict_parsing as u32) << 13
            | style_code(self.target_style) << 16
            | dialect_code(self.dialect) << 24
    }
}

const fn style_code(style: Option<ParameterStyle>) -> u32 {
    match style {
        None => 0,
        Some(ParameterStyle::None) => 1,
        Some(ParameterStyle::Static) => 2,
        Some(ParameterStyle::Qmark) => 3,
        Some(ParameterStyle::Numeric) => 4,
        Some(ParameterStyle::NamedColon) => 5,
        Some(ParameterStyle::PositionalColon) => 6,
        Some(ParameterStyle::NamedAt) => 7,
        Some(ParameterStyle::NamedDollar) => 8,
        Some(ParameterStyle::NamedPyformat) => 9,
        Some(ParameterStyle::PositionalPyformat) => 10,
    }
}

const fn dialect_code(dialect: Dialect) -> u32 {
    match dialect {
        Dialect::Generic => 0,
        Dialect::SQLite => 1,
        Dialect::PostgreSQL => 2,
        Dialect::MySQL => 3,
        Dialect::BigQuery => 4,
        Dialect::Oracle => 5,
    }
}

/// The processor's output: final SQL, the container shaped for the
/// driver's execution style, the placeholder list over the final SQL, and
/// everything the pipeline learned along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedState {
    pub final_sql: String,
    pub final_parameters: Params,
    pub placeholder_list: Vec<ParameterInfo>,
    pub analysis: Analysis,
}

/// Normalizes one statement for one driver.
pub fn compile(sql: &str, params: Params, config: &DriverConfig, options: &CompileOptions) -> Result<ProcessedState> {
    let key = CompiledKey {
        sql: sql.to_string(),
        shape_hash: params.shape_hash(),
        value_hash: params.value_fingerprint(),
        config_id: config.identity(),
        is_parsed: options.is_parsed,
        flag_bits: options.key_bits(),
    };
    if let Some(state) = cache::compiled_cache().get(&key) {
        return Ok(state);
    }

    let state = compile_uncached(sql, params, config, options)?;
    cache::compiled_cache().insert(key, state.clone());
    Ok(state)
}

fn compile_uncached(
    sql: &str,
    params: Params,
    config: &DriverConfig,
    options: &CompileOptions,
) -> Result<ProcessedState> {
    let placeholders = lexer::lex(sql);
    let static_requested = options.target_style == Some(ParameterStyle::Static)
        || config.default_parameter_style == ParameterStyle::Static;

    let detected = lexer::styles(&placeholders);
    if detected.len() > 1
        && !config.allow_mixed_parameter_styles
        && !detected.is_subset(&config.supported_parameter_styles)
    {
        let mut names: Vec<&'static str> = detected.iter().map(ParameterStyle::as_str).collect();
        names.sort_unstable();
        return Err(RebindError::UnsupportedParameterStyle(format_compact!(
            "mixed placeholder styles ({}) cannot be rewritten for driver {}",
            names.join(", "),
            config.label
        )));
    }

    // A many-statement container is a list of parameter sets, which never
    // matches the per-statement placeholder count.
    if options.flags.validate && !options.is_many {
        reshape::validate(&placeholders, &params)?;
    }

    // Statements with nothing to normalize pass straight through.
    if placeholders.is_empty()
        && config.type_coercion_map.is_empty()
        && config.output_transformer.is_none()
        && !options.flags.parameterize_literals
        && !options.is_many
        && !static_requested
    {
        return Ok(ProcessedState {
            final_sql: sql.to_string(),
            final_parameters: params,
            placeholder_list: Vec::new(),
            analysis: Analysis::default(),
        });
    }

    let original_kind = params.kind();
    let parameters = wrap::wrap_parameters(params, &placeholders);
    let mut ctx = TransformContext {
        sql: sql.to_string(),
        placeholders,
        statement: None,
        parameters,
        dialect: options.dialect,
        analysis: Analysis::default(),
        conversion: Default::default(),
    };

    if options.is_parsed {
        match parser::parse_for_pipeline(&ctx.sql, &ctx.placeholders, ctx.dialect) {
            Ok((statement, conversion)) => {
                ctx.statement = Some(statement);
                ctx.conversion = conversion;
            }
            Err(error) if options.strict_parsing => return Err(error),
            Err(error) => {
                tracing::debug!(%error, "oracle rejected statement; degrading to text-level pipeline");
                ctx.analysis.parse_failed = true;
            }
        }
    }

    let mut flags = options.flags;
    flags.expand_many = options.is_many;
    Pipeline::new(flags).run(&mut ctx)?;

    if !config.has_native_list_expansion && !options.is_many {
        expand_in_lists(&mut ctx);
    }

    if !config.type_coercion_map.is_empty() {
        let coercions = &config.type_coercion_map;
        ctx.parameters.map_in_place(|slot| match coercions.get(&slot.sql_type()) {
            Some(coerce) => Parameter::Plain(coerce(slot.into_value())),
            None => slot,
        });
    }

    let mut final_sql = ctx.sql;
    let mut final_params = ctx.parameters;
    let mut current_placeholders = ctx.placeholders;

    if !static_requested && !current_placeholders.is_empty() {
        let target = match options.target_style {
            Some(style) => (style != ParameterStyle::None).then_some(style),
            None => {
                let current = lexer::styles(&current_placeholders);
                if current.is_subset(config.execution_styles()) {
                    None
                } else {
                    let target = config.execution_target();
                    // `:1` already satisfies a named-colon driver.
                    lexer::needs_conversion(&current_placeholders, target).then_some(target)
                }
            }
        };
        if let Some(target) = target {
            final_params = reshape::reshape(final_params, &current_placeholders, target)?;
            final_sql = rewrite::rewrite(&final_sql, &current_placeholders, target);
            current_placeholders = extract_placeholders(&final_sql);
        }
    }

    if config.preserve_parameter_format {
        final_params = restore_parameter_format(original_kind, final_params);
    }

    if let Some(transformer) = &config.output_transformer {
        let (transformed_sql, transformed_params) = transformer(final_sql, final_params);
        final_sql = transformed_sql;
        final_params = transformed_params;
        current_placeholders = extract_placeholders(&final_sql);
    }

    if static_requested {
        let (embedded, none_params) = rewrite::embed_static(&final_sql, &current_placeholders, final_params)?;
        final_sql = embedded;
        final_params = none_params;
        current_placeholders = extract_placeholders(&final_sql);
    }

    let mut analysis = ctx.analysis;
    analysis.parameter_count = final_params.len();
    Ok(ProcessedState {
        final_sql,
        final_parameters: final_params,
        placeholder_list: current_placeholders,
        analysis,
    })
}

/// How an `IN` keyword precedes a placeholder.
enum InForm {
    /// `... IN ?` — the placeholder supplies its own parentheses.
    Bare,
    /// `... IN (?)` — the parentheses are already in the SQL.
    Parenthesized,
}

/// Expands `IN` placeholders bound to array values into one placeholder
/// per element, flattening the array into the sequence. An empty array
/// becomes `(NULL)` so the predicate matches nothing.
fn expand_in_lists(ctx: &mut TransformContext) {
    let Params::Positional(values) = &ctx.parameters else {
        return;
    };
    if ctx.placeholders.is_empty() || values.is_empty() {
        return;
    }

    let values = values.clone();
    let mut out = String::with_capacity(ctx.sql.len());
    let mut expanded: SmallVec<[Parameter; 8]> = SmallVec::new_const();
    let mut cursor = 0usize;
    let mut changed = false;

    for (i, info) in ctx.placeholders.iter().enumerate() {
        out.push_str(&ctx.sql[cursor..info.position]);
        cursor = info.position + info.placeholder_text.len();

        let slot = values.get(i);
        let form = slot
            .filter(|slot| matches!(slot.value(), ParamValue::Array(_)))
            .and_then(|_| in_form(&ctx.sql[..info.position]));
        match (slot, form) {
            (Some(slot), Some(form)) if matches!(slot.value(), ParamValue::Array(_)) => {
                let items = match slot.clone().into_value() {
                    ParamValue::Array(items) => items,
                    _ => Vec::new(),
                };
                let rendered = if items.is_empty() {
                    None
                } else {
                    Some(vec!["?"; items.len()].join(", "))
                };
                match (form, rendered) {
                    (InForm::Bare, Some(list)) => out.push_str(&format!("({list})")),
                    (InForm::Bare, None) => out.push_str("(NULL)"),
                    (InForm::Parenthesized, Some(list)) => out.push_str(&list),
                    (InForm::Parenthesized, None) => out.push_str("NULL"),
                }
                expanded.extend(items.into_iter().map(Parameter::Plain));
                changed = true;
            }
            (Some(slot), _) => {
                out.push_str(&info.placeholder_text);
                expanded.push(slot.clone());
            }
            (None, _) => out.push_str(&info.placeholder_text),
        }
    }
    if !changed {
        return;
    }
    out.push_str(&ctx.sql[cursor..]);

    ctx.sql = out;
    ctx.placeholders = extract_placeholders(&ctx.sql);
    ctx.parameters = Params::Positional(expanded.into_vec());
}

fn in_form(before: &str) -> Option<InForm> {
    let trimmed = before.trim_end();
    if ends_with_in_keyword(trimmed) {
        return Some(InForm::Bare);
    }
    let inner = trimmed.strip_suffix('(')?.trim_end();
    ends_with_in_keyword(inner).then_some(InForm::Parenthesized)
}

fn ends_with_in_keyword(text: &str) -> bool {
    let bytes = text.as_bytes();
    let n = bytes.len();
    n >= 2
        && bytes[n - 2].eq_ignore_ascii_case(&b'i')
        && bytes[n - 1].eq_ignore_ascii_case(&b'n')
        && (n == 2 || !(bytes[n - 3].is_ascii_alphanumeric() || bytes[n - 3] == b'_'))
}

/// Converts a synthetic named container back into the caller's original
/// ordered shape when its keys are all `param_{N}` or all 1-based digits.
fn restore_parameter_format(original_kind: &'static str, params: Params) -> Params {
    if original_kind != "sequence" && original_kind != "scalar" {
        return params;
    }
    let Params::Named(map) = params else {
        return params;
    };

    let all_param_n = map
        .keys()
        .all(|key| key.strip_prefix("param_").is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())));
    let all_digits = !map.is_empty() && map.keys().all(|key| !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()));
    if !all_param_n && !all_digits {
        return Params::Named(map);
    }

    let mut indexed: Vec<(usize, Parameter)> = map
        .into_iter()
        .map(|(key, value)| {
            let index = if all_param_n {
                key["param_".len()..].parse::<usize>().unwrap_or(usize::MAX)
            } else {
                key.parse::<usize>().unwrap_or(usize::MAX)
            };
            (index, value)
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    Params::Positional(indexed.into_iter().map(|(_, value)| value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_keyword_detection() {
        assert!(matches!(in_form("SELECT * FROM t WHERE id IN "), Some(InForm::Bare)));
        assert!(matches!(in_form("SELECT * FROM t WHERE id IN ("), Some(InForm::Parenthesized)));
        assert!(matches!(in_form("... WHERE id in ( "), Some(InForm::Parenthesized)));
        assert!(in_form("SELECT * FROM t WHERE margin ").is_none());
        assert!(in_form("SELECT f(").is_none());
    }

    #[test]
    fn test_restore_parameter_format() {
        let named = Params::named([("param_1", ParamValue::Int(2)), ("param_0", ParamValue::Int(1))]);
        assert_eq!(
            restore_parameter_format("sequence", named),
            Params::positional([ParamValue::Int(1), ParamValue::Int(2)])
        );

        let digits = Params::named([("2", ParamValue::Int(2)), ("1", ParamValue::Int(1))]);
        assert_eq!(
            restore_parameter_format("sequence", digits),
            Params::positional([ParamValue::Int(1), ParamValue::Int(2)])
        );

        let keyed = Params::named([("email", ParamValue::Int(1))]);
        assert_eq!(restore_parameter_format("sequence", keyed.clone()), keyed);
        let map = Params::named([("param_0", ParamValue::Int(1))]);
        assert_eq!(restore_parameter_format("map", map.clone()), map);
    }
}
