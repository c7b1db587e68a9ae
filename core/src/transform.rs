//! Single-pass statement transformation steps
//!
//! The transformation context carries the SQL text, the parsed tree when
//! the oracle produced one, the parameter container, and the accumulated
//! [`Analysis`]. Each step is a plain function over the context; the
//! [`Pipeline`] runs the enabled subset in a fixed order: COPY extraction,
//! NULL elision, literal parameterization, then the analysis passes, then
//! many-statement expansion.
//!
//! Mutating steps rewrite the SQL text through the placeholder list so
//! untouched bytes survive; only literal parameterization regenerates text
//! from the tree, since it rewrites literals by definition.

use std::ops::ControlFlow;

use compact_str::{CompactString, format_compact};
use sqlparser::ast::{
    self, CopyTarget, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, Join, JoinConstraint,
    JoinOperator, OrderByKind, Query, SelectItem, SetExpr, SetOperator, Statement, Value,
};

use rebind_types::{Dialect, ParamValue, Parameter, ParameterInfo, ParameterStyle, Params, SqlType, TypedParam};

use crate::error::Result;
use crate::lexer::extract_placeholders;
use crate::parser::{self, ConversionState};
use crate::reshape;
use crate::wrap;

/// Which pipeline steps run during a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineFlags {
    /// Validate the container against the placeholder list up front.
    pub validate: bool,
    /// Replace literals with fresh placeholders when no parameters were
    /// given.
    pub parameterize_literals: bool,
    /// Detect COPY statements and stage their data out of the container.
    pub extract_copy: bool,
    /// Replace NULL-valued binds with literal `NULL` and renumber.
    pub elide_null_parameters: bool,
    /// Walk the tree for suspicious constructs.
    pub safety_scan: bool,
    /// Escalate unguarded UPDATE/DELETE and TRUNCATE findings from
    /// warnings to fatal issues.
    pub strict_safety: bool,
    /// Collect tables, columns, operation kind, and joins.
    pub extract_metadata: bool,
    /// Decide whether the statement returns rows.
    pub analyze_returns_rows: bool,
    /// Expand a parameter-set list into one statement per set.
    pub expand_many: bool,
}

impl Default for PipelineFlags {
    fn default() -> Self {
        Self {
            validate: true,
            parameterize_literals: false,
            extract_copy: false,
            elide_null_parameters: false,
            safety_scan: false,
            strict_safety: false,
            extract_metadata: true,
            analyze_returns_rows: true,
            expand_many: false,
        }
    }
}

impl PipelineFlags {
    /// Bit encoding for cache keys.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        (self.validate as u32)
            | (self.parameterize_literals as u32) << 1
            | (self.extract_copy as u32) << 2
            | (self.elide_null_parameters as u32) << 3
            | (self.safety_scan as u32) << 4
            | (self.strict_safety as u32) << 5
            | (self.extract_metadata as u32) << 6
            | (self.analyze_returns_rows as u32) << 7
            | (self.expand_many as u32) << 8
    }
}

/// The statement's top-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Text the oracle could not classify (pass-through mode).
    Anonymous,
    #[default]
    Other,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Select => "SELECT",
            OperationKind::Insert => "INSERT",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
            OperationKind::Anonymous => "ANONYMOUS",
            OperationKind::Other => "OTHER",
        }
    }
}

/// Everything the pipeline learned about a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub operation: OperationKind,
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub joins: Vec<&'static str>,
    pub returns_rows: Option<bool>,
    /// The oracle rejected the SQL and the pipeline degraded to
    /// text-level rewriting.
    pub parse_failed: bool,
    pub copy_operation: bool,
    /// Parameters staged out of the container for STDIN/STDOUT COPY.
    pub copy_data: Option<Params>,
    /// Zero-based ordinals of binds removed by NULL elision.
    pub null_ordinals: Vec<usize>,
    pub validation_warnings: Vec<String>,
    pub validation_issues: Vec<String>,
    pub literals_parameterized: bool,
    pub parameter_count: usize,
    /// Distinct symbolic types among the parameter values, in first-seen
    /// order.
    pub parameter_types: Vec<&'static str>,
    /// Statement count after many-statement expansion, zero otherwise.
    pub statements_expanded: usize,
}

/// State threaded through the pipeline steps.
#[derive(Debug)]
pub struct TransformContext {
    /// Current SQL text; mutating steps keep this byte-accurate.
    pub sql: String,
    /// Placeholder list over `sql`, refreshed after every text mutation.
    pub placeholders: Vec<ParameterInfo>,
    /// Parsed tree over the canonical `?N` rendering, when available.
    pub statement: Option<Statement>,
    pub parameters: Params,
    pub dialect: Dialect,
    pub analysis: Analysis,
    pub conversion: ConversionState,
}

impl TransformContext {
    #[must_use]
    pub fn new(sql: &str, parameters: Params, dialect: Dialect) -> Self {
        let placeholders = extract_placeholders(sql);
        Self {
            sql: sql.to_string(),
            placeholders,
            statement: None,
            parameters,
            dialect,
            analysis: Analysis::default(),
            conversion: ConversionState::default(),
        }
    }
}

/// Runs the enabled steps in their contract order.
pub struct Pipeline {
    flags: PipelineFlags,
}

impl Pipeline {
    #[must_use]
    pub const fn new(flags: PipelineFlags) -> Self {
        Self { flags }
    }

    pub fn run(&self, ctx: &mut TransformContext) -> Result<()> {
        // Mutating steps need the tree; in pass-through mode the pipeline
        // degrades to text-level rewriting plus the self-guarding analysis
        // passes.
        let parsed = ctx.statement.is_some();
        if self.flags.extract_copy && parsed {
            copy_extraction_step(ctx);
        }
        if self.flags.elide_null_parameters && parsed {
            null_elision_step(ctx)?;
        }
        if self.flags.parameterize_literals && parsed {
            literal_parameterization_step(ctx)?;
        }
        if self.flags.safety_scan {
            safety_scan_step(ctx, self.flags.strict_safety);
        }
        if self.flags.extract_metadata {
            metadata_extraction_step(ctx);
        }
        if self.flags.analyze_returns_rows {
            returns_rows_step(ctx);
        }
        if self.flags.expand_many {
            many_statement_expansion_step(ctx)?;
        }
        ctx.analysis.parameter_count = ctx.parameters.len();
        ctx.analysis.parameter_types = parameter_type_histogram(&ctx.parameters);
        Ok(())
    }
}

/// Distinct type tags across the container's values, in first-seen order.
fn parameter_type_histogram(params: &Params) -> Vec<&'static str> {
    let mut tags: Vec<&'static str> = Vec::new();
    let mut push = |slot: &Parameter| {
        let tag = slot.sql_type().hint();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    };
    match params {
        Params::None => {}
        Params::Scalar(slot) => push(slot),
        Params::Positional(values) => values.iter().for_each(push),
        Params::Named(values) => values.values().for_each(push),
    }
    tags
}

// ---- E2: COPY extraction ----

/// Marks COPY statements and stages STDIN/STDOUT payloads into the
/// analysis so drivers can feed them through their bulk interfaces.
pub fn copy_extraction_step(ctx: &mut TransformContext) {
    let Some(Statement::Copy { target, .. }) = &ctx.statement else {
        return;
    };
    ctx.analysis.copy_operation = true;
    if matches!(target, CopyTarget::Stdin | CopyTarget::Stdout) && !ctx.parameters.is_empty() {
        ctx.analysis.copy_data = Some(std::mem::take(&mut ctx.parameters));
    }
}

// ---- E3: NULL elision ----

/// Replaces NULL-valued binds with literal `NULL` and renumbers the
/// surviving positional placeholders so the sequence stays contiguous.
///
/// Keying is by ordinal, matching wire-level bind order. Running the step
/// twice is a no-op: the second pass sees no NULL-valued binds.
pub fn null_elision_step(ctx: &mut TransformContext) -> Result<()> {
    if ctx.placeholders.is_empty() || ctx.parameters.is_empty() {
        return Ok(());
    }

    let ordered = match reshape::reshape(ctx.parameters.clone(), &ctx.placeholders, ParameterStyle::Qmark)? {
        Params::Positional(values) => values,
        _ => return Ok(()),
    };

    let null_ordinals: Vec<usize> = ordered
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.value().is_null())
        .map(|(i, _)| i)
        .collect();
    if null_ordinals.is_empty() {
        return Ok(());
    }

    let mut out = String::with_capacity(ctx.sql.len());
    let mut cursor = 0usize;
    let mut surviving = 0usize;
    for info in &ctx.placeholders {
        out.push_str(&ctx.sql[cursor..info.position]);
        if null_ordinals.contains(&info.ordinal) {
            out.push_str("NULL");
        } else {
            out.push_str(&renumbered_placeholder(info, surviving));
            surviving += 1;
        }
        cursor = info.position + info.placeholder_text.len();
    }
    out.push_str(&ctx.sql[cursor..]);

    ctx.parameters = drop_ordinals(std::mem::take(&mut ctx.parameters), &ctx.placeholders, &null_ordinals);
    ctx.sql = out;
    ctx.placeholders = extract_placeholders(&ctx.sql);
    ctx.analysis.null_ordinals = null_ordinals;
    Ok(())
}

/// Re-renders a surviving placeholder after elision. Position-numbered
/// styles are renumbered; name-carrying styles keep their text.
fn renumbered_placeholder(info: &ParameterInfo, new_index: usize) -> String {
    match info.style {
        ParameterStyle::Numeric => format!("${}", new_index + 1),
        ParameterStyle::PositionalColon => format!(":{}", new_index + 1),
        ParameterStyle::Qmark if info.name.is_some() => format!("?{}", new_index + 1),
        _ => info.placeholder_text.to_string(),
    }
}

/// Removes the values behind the elided ordinals, preserving the
/// container's shape.
fn drop_ordinals(params: Params, placeholders: &[ParameterInfo], null_ordinals: &[usize]) -> Params {
    match params {
        Params::Scalar(value) => {
            if null_ordinals.is_empty() {
                Params::Scalar(value)
            } else {
                Params::None
            }
        }
        Params::Positional(values) => Params::Positional(
            values
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !null_ordinals.contains(i))
                .map(|(_, v)| v)
                .collect(),
        ),
        Params::Named(map) => {
            // Drop the keys that resolved to the elided placeholders.
            let mut elided_keys: Vec<CompactString> = Vec::new();
            for &ordinal in null_ordinals {
                let Some(info) = placeholders.get(ordinal) else { continue };
                let named = info.name.as_deref().filter(|name| map.contains_key(*name));
                let key = named
                    .map(CompactString::new)
                    .or_else(|| {
                        let fallback = format_compact!("param_{ordinal}");
                        map.contains_key(fallback.as_str()).then_some(fallback)
                    })
                    .or_else(|| {
                        let fallback = format_compact!("{}", ordinal + 1);
                        map.contains_key(fallback.as_str()).then_some(fallback)
                    })
                    .or_else(|| map.get_index(ordinal).map(|(k, _)| k.clone()));
                if let Some(key) = key {
                    elided_keys.push(key);
                }
            }
            Params::Named(
                map.into_iter()
                    .filter(|(key, _)| !elided_keys.contains(key))
                    .collect(),
            )
        }
        other => other,
    }
}

// ---- E1: literal parameterization ----

/// Replaces literal values with fresh placeholders bound to `param_{k}`
/// names, wrapping each extracted value with its inferred type.
///
/// Runs only when the container is empty. A literal that *is* a
/// SELECT-list item, an aliased projection value, or an ORDER BY entry
/// stays in place, but literals nested inside those expressions become
/// binds, as do literals in WHERE, HAVING, join constraints, SET
/// assignment values, and VALUES rows. LIMIT/OFFSET/FETCH clauses and
/// window frames are never entered. Idempotent: a second run sees
/// placeholders, not literals.
pub fn literal_parameterization_step(ctx: &mut TransformContext) -> Result<()> {
    // Binding literals next to pre-existing placeholders would interleave
    // two numbering schemes; the step only applies to fully-literal SQL.
    if !ctx.parameters.is_empty() || !ctx.placeholders.is_empty() {
        ctx.analysis.literals_parameterized = false;
        return Ok(());
    }
    let Some(mut statement) = ctx.statement.take() else {
        return Ok(());
    };

    let mut extracted: Vec<(CompactString, Parameter)> = Vec::new();
    walk_statement_bind_sites(&mut statement, &mut extracted);

    if extracted.is_empty() {
        ctx.statement = Some(statement);
        ctx.analysis.literals_parameterized = false;
        return Ok(());
    }

    ctx.sql = statement.to_string();
    ctx.placeholders = extract_placeholders(&ctx.sql);
    ctx.parameters = Params::Named(extracted.into_iter().collect());
    ctx.statement = Some(statement);
    ctx.analysis.literals_parameterized = true;
    Ok(())
}

/// Replaces literals inside one bind-site expression tree.
///
/// The recursion is a whitelist: expression forms it does not know stay
/// opaque, and subqueries re-enter through the query walker so their
/// projections and LIMIT clauses keep their literals.
fn parameterize_expr(expr: &mut Expr, extracted: &mut Vec<(CompactString, Parameter)>) {
    match expr {
        Expr::Value(value_with_span) => {
            if let Some(extracted_value) = literal_to_value(&value_with_span.value) {
                let name = format_compact!("param_{}", extracted.len());
                let wrapped = wrap_literal(extracted_value, &name);
                extracted.push((name.clone(), wrapped));
                *expr = Expr::Value(Value::Placeholder(format!(":{name}")).into());
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            parameterize_expr(left, extracted);
            parameterize_expr(right, extracted);
        }
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) | Expr::Cast { expr: inner, .. } => {
            parameterize_expr(inner, extracted);
        }
        Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotFalse(inner)
        | Expr::IsUnknown(inner)
        | Expr::IsNotUnknown(inner) => parameterize_expr(inner, extracted),
        Expr::InList { expr: inner, list, .. } => {
            parameterize_expr(inner, extracted);
            for item in list {
                parameterize_expr(item, extracted);
            }
        }
        Expr::Between { expr: inner, low, high, .. } => {
            parameterize_expr(inner, extracted);
            parameterize_expr(low, extracted);
            parameterize_expr(high, extracted);
        }
        Expr::Like { expr: inner, pattern, .. }
        | Expr::ILike { expr: inner, pattern, .. }
        | Expr::SimilarTo { expr: inner, pattern, .. } => {
            parameterize_expr(inner, extracted);
            parameterize_expr(pattern, extracted);
        }
        Expr::AnyOp { left, right, .. } | Expr::AllOp { left, right, .. } => {
            parameterize_expr(left, extracted);
            parameterize_expr(right, extracted);
        }
        Expr::Tuple(items) => {
            for item in items {
                parameterize_expr(item, extracted);
            }
        }
        Expr::Function(function) => {
            if let FunctionArguments::List(list) = &mut function.args {
                for arg in &mut list.args {
                    match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(inner))
                        | FunctionArg::Named { arg: FunctionArgExpr::Expr(inner), .. } => {
                            parameterize_expr(inner, extracted);
                        }
                        _ => {}
                    }
                }
            }
        }
        Expr::InSubquery { expr: inner, subquery, .. } => {
            parameterize_expr(inner, extracted);
            walk_query_bind_sites(subquery, extracted);
        }
        Expr::Subquery(subquery) => walk_query_bind_sites(subquery, extracted),
        Expr::Exists { subquery, .. } => walk_query_bind_sites(subquery, extracted),
        _ => {}
    }
}

/// Maps a literal AST value to a runtime value; placeholders and NULLs
/// pass (NULL binds would defeat elision downstream).
fn literal_to_value(value: &Value) -> Option<ParamValue> {
    match value {
        Value::Number(repr, _) => {
            if let Ok(int) = repr.parse::<i64>() {
                Some(ParamValue::Int(int))
            } else {
                repr.parse::<f64>().ok().map(ParamValue::Float)
            }
        }
        Value::SingleQuotedString(text) | Value::NationalStringLiteral(text) => {
            Some(ParamValue::Text(text.clone()))
        }
        Value::Boolean(flag) => Some(ParamValue::Bool(*flag)),
        _ => None,
    }
}

/// Wraps an extracted literal the way the parameter wrapper would, with
/// integers and floats typed for the histogram even when small.
fn wrap_literal(value: ParamValue, name: &str) -> Parameter {
    let wrapped = wrap::wrap_value(value, Some(name));
    match wrapped {
        Parameter::Plain(value) => {
            let data_type = match &value {
                ParamValue::Int(_) => SqlType::Integer,
                ParamValue::Float(_) => SqlType::Float,
                _ => SqlType::Varchar,
            };
            Parameter::Typed(TypedParam::new(value, data_type, Some(name)))
        }
        typed => typed,
    }
}

/// Visits every expression position where a bind parameter is legal.
fn walk_statement_bind_sites(statement: &mut Statement, extracted: &mut Vec<(CompactString, Parameter)>) {
    match statement {
        Statement::Query(query) => walk_query_bind_sites(query, extracted),
        Statement::Insert(insert) => {
            if let Some(source) = insert.source.as_deref_mut() {
                walk_query_bind_sites(source, extracted);
            }
        }
        Statement::Update(update) => {
            for assignment in &mut update.assignments {
                parameterize_expr(&mut assignment.value, extracted);
            }
            if let Some(selection) = &mut update.selection {
                parameterize_expr(selection, extracted);
            }
        }
        Statement::Delete(delete) => {
            if let Some(selection) = &mut delete.selection {
                parameterize_expr(selection, extracted);
            }
        }
        _ => {}
    }
}

fn walk_query_bind_sites(query: &mut Query, extracted: &mut Vec<(CompactString, Parameter)>) {
    if let Some(with) = &mut query.with {
        for cte in &mut with.cte_tables {
            walk_query_bind_sites(&mut cte.query, extracted);
        }
    }
    walk_set_expr_bind_sites(&mut query.body, extracted);
    if let Some(order_by) = &mut query.order_by
        && let OrderByKind::Expressions(entries) = &mut order_by.kind
    {
        for entry in entries {
            // A bare literal here is a positional sort ordinal and must
            // stay a literal; anything nested inside the sort expression
            // is a value.
            if !is_bare_literal(&entry.expr) {
                parameterize_expr(&mut entry.expr, extracted);
            }
        }
    }
}

fn walk_set_expr_bind_sites(body: &mut SetExpr, extracted: &mut Vec<(CompactString, Parameter)>) {
    match body {
        SetExpr::Select(select) => {
            for item in &mut select.projection {
                parameterize_projection_item(item, extracted);
            }
            for table in &mut select.from {
                for join in &mut table.joins {
                    if let Some(JoinConstraint::On(on)) = join_constraint_mut(join) {
                        parameterize_expr(on, extracted);
                    }
                }
            }
            if let Some(selection) = &mut select.selection {
                parameterize_expr(selection, extracted);
            }
            if let Some(having) = &mut select.having {
                parameterize_expr(having, extracted);
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr_bind_sites(left, extracted);
            walk_set_expr_bind_sites(right, extracted);
        }
        SetExpr::Query(query) => walk_query_bind_sites(query, extracted),
        SetExpr::Values(values) => {
            for row in &mut values.rows {
                for expr in row {
                    parameterize_expr(expr, extracted);
                }
            }
        }
        _ => {}
    }
}

/// Only the literal that is itself the projection item (plain or aliased)
/// is left alone; literals nested inside a projection expression are
/// ordinary binds.
fn parameterize_projection_item(item: &mut SelectItem, extracted: &mut Vec<(CompactString, Parameter)>) {
    match item {
        SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
            if !is_bare_literal(expr) {
                parameterize_expr(expr, extracted);
            }
        }
        _ => {}
    }
}

fn is_bare_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Value(value) if literal_to_value(&value.value).is_some())
}

fn join_constraint_mut(join: &mut Join) -> Option<&mut JoinConstraint> {
    match &mut join.join_operator {
        JoinOperator::Join(constraint)
        | JoinOperator::Inner(constraint)
        | JoinOperator::Left(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::Right(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint) => Some(constraint),
        _ => None,
    }
}

// ---- E5: safety scan ----

const SUSPICIOUS_FUNCTIONS: &[&str] = &[
    "sleep",
    "benchmark",
    "load_file",
    "outfile",
    "dumpfile",
    "exec",
    "xp_cmdshell",
    "sp_executesql",
];

/// Walks the tree once for injection-shaped constructs. Findings land in
/// `validation_warnings`; hard violations move to `validation_issues`
/// when `strict` is set.
pub fn safety_scan_step(ctx: &mut TransformContext, strict: bool) {
    let Some(statement) = &ctx.statement else {
        return;
    };
    let mut warnings: Vec<String> = Vec::new();
    let mut hard: Vec<String> = Vec::new();

    let _ = ast::visit_expressions(statement, |expr: &Expr| {
        match expr {
            Expr::Function(function) => {
                if let Some(ast::ObjectNamePart::Identifier(ident)) = function.name.0.last() {
                    let name = ident.value.to_lowercase();
                    if SUSPICIOUS_FUNCTIONS.contains(&name.as_str()) {
                        warnings.push(format!("suspicious function detected: {name}"));
                    }
                }
            }
            Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right } => {
                if let (Expr::Value(l), Expr::Value(r)) = (left.as_ref(), right.as_ref())
                    && !matches!(l.value, Value::Placeholder(_))
                    && l.value == r.value
                {
                    warnings.push(format!("tautology condition detected: {l} = {r}"));
                }
            }
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });

    scan_statement_shape(statement, &mut warnings);

    match statement {
        Statement::Update(update) if update.selection.is_none() => {
            let finding = "UPDATE without WHERE clause".to_string();
            if strict { hard.push(finding) } else { warnings.push(finding) }
        }
        Statement::Delete(delete) if delete.selection.is_none() => {
            let finding = "DELETE without WHERE clause".to_string();
            if strict { hard.push(finding) } else { warnings.push(finding) }
        }
        Statement::Truncate { .. } => {
            let finding = "TRUNCATE operation".to_string();
            if strict { hard.push(finding) } else { warnings.push(finding) }
        }
        _ => {}
    }

    ctx.analysis.validation_warnings.extend(warnings);
    ctx.analysis.validation_issues.extend(hard);
}

/// UNION arms padded with NULL columns are the classic column-count probe.
fn scan_statement_shape(statement: &Statement, warnings: &mut Vec<String>) {
    if let Statement::Query(query) = statement {
        scan_set_expr(&query.body, warnings);
    }
}

fn scan_set_expr(body: &SetExpr, warnings: &mut Vec<String>) {
    match body {
        SetExpr::SetOperation { op: SetOperator::Union, left, right, .. } => {
            for side in [left.as_ref(), right.as_ref()] {
                if let SetExpr::Select(select) = side {
                    let null_columns = select
                        .projection
                        .iter()
                        .filter(|item| {
                            matches!(
                                item,
                                SelectItem::UnnamedExpr(Expr::Value(value))
                                    if matches!(value.value, Value::Null)
                            )
                        })
                        .count();
                    if null_columns >= 4 {
                        warnings.push("potential UNION injection pattern detected".to_string());
                    }
                }
            }
            scan_set_expr(left, warnings);
            scan_set_expr(right, warnings);
        }
        SetExpr::Query(query) => scan_set_expr(&query.body, warnings),
        _ => {}
    }
}

// ---- E6: metadata extraction ----

/// Collects distinct table references, column names (`*` excluded), the
/// operation kind, and join sides.
pub fn metadata_extraction_step(ctx: &mut TransformContext) {
    let Some(statement) = &ctx.statement else {
        ctx.analysis.operation = OperationKind::Anonymous;
        return;
    };

    let mut tables: Vec<String> = Vec::new();
    let _ = ast::visit_relations(statement, |name: &ast::ObjectName| {
        if let Some(ast::ObjectNamePart::Identifier(ident)) = name.0.last()
            && !tables.contains(&ident.value)
        {
            tables.push(ident.value.clone());
        }
        ControlFlow::<()>::Continue(())
    });

    let mut columns: Vec<String> = Vec::new();
    let _ = ast::visit_expressions(statement, |expr: &Expr| {
        let candidate = match expr {
            Expr::Identifier(ident) => Some(&ident.value),
            Expr::CompoundIdentifier(parts) => parts.last().map(|ident| &ident.value),
            _ => None,
        };
        if let Some(name) = candidate
            && name != "*"
            && !columns.contains(name)
        {
            columns.push(name.clone());
        }
        ControlFlow::<()>::Continue(())
    });

    let mut joins: Vec<&'static str> = Vec::new();
    collect_joins(statement, &mut joins);

    ctx.analysis.operation = match statement {
        Statement::Query(_) => OperationKind::Select,
        Statement::Insert(_) => OperationKind::Insert,
        Statement::Update(_) => OperationKind::Update,
        Statement::Delete(_) => OperationKind::Delete,
        _ => OperationKind::Other,
    };
    ctx.analysis.tables = tables;
    ctx.analysis.columns = columns;
    ctx.analysis.joins = joins;
}

fn collect_joins(statement: &Statement, joins: &mut Vec<&'static str>) {
    if let Statement::Query(query) = statement {
        collect_query_joins(query, joins);
    }
}

fn collect_query_joins(query: &Query, joins: &mut Vec<&'static str>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            collect_query_joins(&cte.query, joins);
        }
    }
    collect_set_expr_joins(&query.body, joins);
}

fn collect_set_expr_joins(body: &SetExpr, joins: &mut Vec<&'static str>) {
    match body {
        SetExpr::Select(select) => {
            for table in &select.from {
                for join in &table.joins {
                    joins.push(join_side(join));
                }
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_expr_joins(left, joins);
            collect_set_expr_joins(right, joins);
        }
        SetExpr::Query(query) => collect_query_joins(query, joins),
        _ => {}
    }
}

fn join_side(join: &Join) -> &'static str {
    match &join.join_operator {
        JoinOperator::Left(_) | JoinOperator::LeftOuter(_) => "LEFT",
        JoinOperator::Right(_) | JoinOperator::RightOuter(_) => "RIGHT",
        JoinOperator::FullOuter(_) => "FULL",
        JoinOperator::CrossJoin(_) => "CROSS",
        _ => "INNER",
    }
}

// ---- E7: returns-rows analysis ----

/// A statement returns rows when it is a query, a DML statement with a
/// RETURNING clause, or a SHOW/DESCRIBE/EXPLAIN/PRAGMA command.
pub fn returns_rows_step(ctx: &mut TransformContext) {
    let returns = match &ctx.statement {
        Some(statement) => statement_returns_rows(statement),
        None => first_keyword_returns_rows(&ctx.sql),
    };
    ctx.analysis.returns_rows = Some(returns);
}

fn statement_returns_rows(statement: &Statement) -> bool {
    match statement {
        Statement::Query(_) => true,
        Statement::Insert(insert) => insert.returning.is_some(),
        Statement::Update(update) => update.returning.is_some(),
        Statement::Delete(delete) => delete.returning.is_some(),
        Statement::Explain { .. }
        | Statement::ExplainTable { .. }
        | Statement::Pragma { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCollation { .. } => true,
        _ => false,
    }
}

/// Keyword sniff for pass-through mode, where no tree exists.
fn first_keyword_returns_rows(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split_whitespace()
        .next()
        .map(str::to_uppercase)
        .unwrap_or_default();
    matches!(
        first.as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "PRAGMA" | "WITH" | "VALUES"
    ) || sql.to_uppercase().split_whitespace().any(|word| word == "RETURNING")
}

// ---- E4: many-statement expansion ----

/// Renders one statement per parameter set, `";\n"`-separated, for engines
/// without native multi-row DML binds. Subsequent processing sees a single
/// script.
pub fn many_statement_expansion_step(ctx: &mut TransformContext) -> Result<()> {
    let Params::Positional(sets) = &ctx.parameters else {
        return Ok(());
    };
    if sets.is_empty() || !sets.iter().all(|set| matches!(set.value(), ParamValue::Array(_))) {
        return Ok(());
    }

    let script = vec![ctx.sql.clone(); sets.len()].join(";\n");
    tracing::debug!(sets = sets.len(), "expanding parameter sets into a statement script");
    // Re-parse so downstream consumers still get a tree for the script.
    match parser::parse_script(&script, ctx.dialect) {
        Ok(statements) => {
            ctx.analysis.statements_expanded = statements.len();
            ctx.statement = statements.into_iter().next();
        }
        Err(_) => {
            ctx.analysis.statements_expanded = sets.len();
            ctx.statement = None;
        }
    }
    ctx.sql = script;
    ctx.placeholders = extract_placeholders(&ctx.sql);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_for_pipeline;

    fn parsed_context(sql: &str, parameters: Params, dialect: Dialect) -> TransformContext {
        let mut ctx = TransformContext::new(sql, parameters, dialect);
        let (statement, conversion) =
            parse_for_pipeline(&ctx.sql, &ctx.placeholders, dialect).expect("test SQL parses");
        ctx.statement = Some(statement);
        ctx.conversion = conversion;
        ctx
    }

    #[test]
    fn test_null_elision_renumbers_numeric() {
        let mut ctx = parsed_context(
            "INSERT INTO t (a,b,c) VALUES ($1,$2,$3)",
            Params::positional([
                ParamValue::Text("x".into()),
                ParamValue::Null,
                ParamValue::Text("y".into()),
            ]),
            Dialect::PostgreSQL,
        );
        null_elision_step(&mut ctx).unwrap();
        assert_eq!(ctx.sql, "INSERT INTO t (a,b,c) VALUES ($1,NULL,$2)");
        assert_eq!(
            ctx.parameters,
            Params::positional([ParamValue::Text("x".into()), ParamValue::Text("y".into())])
        );
        assert_eq!(ctx.analysis.null_ordinals, vec![1]);
    }

    #[test]
    fn test_null_elision_is_idempotent() {
        let mut ctx = parsed_context(
            "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $3",
            Params::positional([ParamValue::Int(1), ParamValue::Null, ParamValue::Int(3)]),
            Dialect::PostgreSQL,
        );
        null_elision_step(&mut ctx).unwrap();
        let (sql_once, params_once) = (ctx.sql.clone(), ctx.parameters.clone());
        null_elision_step(&mut ctx).unwrap();
        assert_eq!(ctx.sql, sql_once);
        assert_eq!(ctx.parameters, params_once);
    }

    #[test]
    fn test_null_elision_named_container() {
        let mut ctx = parsed_context(
            "UPDATE t SET a = :a, b = :b WHERE id = :id",
            Params::named([
                ("a", ParamValue::Int(1)),
                ("b", ParamValue::Null),
                ("id", ParamValue::Int(9)),
            ]),
            Dialect::Generic,
        );
        null_elision_step(&mut ctx).unwrap();
        assert_eq!(ctx.sql, "UPDATE t SET a = :a, b = NULL WHERE id = :id");
        assert_eq!(
            ctx.parameters,
            Params::named([("a", ParamValue::Int(1)), ("id", ParamValue::Int(9))])
        );
        assert_eq!(ctx.analysis.null_ordinals, vec![1]);
    }

    #[test]
    fn test_literal_parameterization() {
        let mut ctx = parsed_context(
            "SELECT * FROM users WHERE age > 21 AND name = 'alice'",
            Params::None,
            Dialect::Generic,
        );
        literal_parameterization_step(&mut ctx).unwrap();
        assert!(ctx.analysis.literals_parameterized);
        assert_eq!(ctx.sql, "SELECT * FROM users WHERE age > :param_0 AND name = :param_1");
        let Params::Named(map) = &ctx.parameters else {
            panic!("literal parameterization produces a named container");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map["param_0"].value(), &ParamValue::Int(21));
        assert_eq!(map["param_1"].value(), &ParamValue::Text("alice".into()));
        assert_eq!(map["param_0"].sql_type(), SqlType::Integer);
    }

    #[test]
    fn test_literal_parameterization_skips_projection_and_limit() {
        let mut ctx = parsed_context(
            "SELECT 1, 'label' FROM t WHERE x = 5 LIMIT 10",
            Params::None,
            Dialect::Generic,
        );
        literal_parameterization_step(&mut ctx).unwrap();
        let Params::Named(map) = &ctx.parameters else {
            panic!("named container expected");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(map["param_0"].value(), &ParamValue::Int(5));
        assert!(ctx.sql.contains("LIMIT 10"));
        assert!(ctx.sql.contains("1"));
    }

    #[test]
    fn test_literal_parameterization_descends_projection_expressions() {
        let mut ctx = parsed_context(
            "SELECT a + 5 FROM t WHERE b = 1",
            Params::None,
            Dialect::Generic,
        );
        literal_parameterization_step(&mut ctx).unwrap();
        assert_eq!(ctx.sql, "SELECT a + :param_0 FROM t WHERE b = :param_1");
        let Params::Named(map) = &ctx.parameters else {
            panic!("named container expected");
        };
        assert_eq!(map["param_0"].value(), &ParamValue::Int(5));
        assert_eq!(map["param_1"].value(), &ParamValue::Int(1));
    }

    #[test]
    fn test_literal_parameterization_keeps_aliased_projection_literal() {
        let mut ctx = parsed_context(
            "SELECT 5 AS x FROM t WHERE b = 1",
            Params::None,
            Dialect::Generic,
        );
        literal_parameterization_step(&mut ctx).unwrap();
        assert_eq!(ctx.sql, "SELECT 5 AS x FROM t WHERE b = :param_0");
        let Params::Named(map) = &ctx.parameters else {
            panic!("named container expected");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(map["param_0"].value(), &ParamValue::Int(1));
    }

    #[test]
    fn test_literal_parameterization_order_by() {
        let mut ctx = parsed_context(
            "SELECT * FROM t WHERE a = 1 ORDER BY b + 2, 3",
            Params::None,
            Dialect::Generic,
        );
        literal_parameterization_step(&mut ctx).unwrap();
        // The sort ordinal stays a literal; the offset inside the sort
        // expression becomes a bind.
        assert_eq!(ctx.sql, "SELECT * FROM t WHERE a = :param_0 ORDER BY b + :param_1, 3");
        let Params::Named(map) = &ctx.parameters else {
            panic!("named container expected");
        };
        assert_eq!(map["param_0"].value(), &ParamValue::Int(1));
        assert_eq!(map["param_1"].value(), &ParamValue::Int(2));
    }

    #[test]
    fn test_literal_parameterization_requires_empty_params() {
        let mut ctx = parsed_context(
            "SELECT * FROM t WHERE a = 1",
            Params::positional([ParamValue::Int(9)]),
            Dialect::Generic,
        );
        let before = ctx.sql.clone();
        literal_parameterization_step(&mut ctx).unwrap();
        assert!(!ctx.analysis.literals_parameterized);
        assert_eq!(ctx.sql, before);
    }

    #[test]
    fn test_literal_parameterization_is_idempotent() {
        let mut ctx = parsed_context(
            "SELECT * FROM t WHERE a = 1",
            Params::None,
            Dialect::Generic,
        );
        literal_parameterization_step(&mut ctx).unwrap();
        let (sql_once, params_once) = (ctx.sql.clone(), ctx.parameters.clone());

        // Re-parse the output and run again with an emptied container.
        let mut again = TransformContext::new(&sql_once, Params::None, Dialect::Generic);
        let (statement, conversion) =
            parse_for_pipeline(&again.sql, &again.placeholders, Dialect::Generic).unwrap();
        again.statement = Some(statement);
        again.conversion = conversion;
        literal_parameterization_step(&mut again).unwrap();
        assert!(!again.analysis.literals_parameterized);
        assert_eq!(again.sql, sql_once);

        assert!(params_once.len() == 1);
    }

    #[test]
    fn test_metadata_extraction() {
        let mut ctx = parsed_context(
            "SELECT u.id, o.total FROM users u JOIN orders o ON u.id = o.user_id WHERE o.total > ?1",
            Params::positional([ParamValue::Int(10)]),
            Dialect::Generic,
        );
        metadata_extraction_step(&mut ctx);
        assert_eq!(ctx.analysis.operation, OperationKind::Select);
        assert!(ctx.analysis.tables.contains(&"users".to_string()));
        assert!(ctx.analysis.tables.contains(&"orders".to_string()));
        assert!(ctx.analysis.columns.contains(&"id".to_string()));
        assert!(ctx.analysis.columns.contains(&"total".to_string()));
        assert_eq!(ctx.analysis.joins, vec!["INNER"]);
    }

    #[test]
    fn test_metadata_left_join_side() {
        let mut ctx = parsed_context(
            "SELECT * FROM a LEFT JOIN b ON a.x = b.x",
            Params::None,
            Dialect::Generic,
        );
        metadata_extraction_step(&mut ctx);
        assert_eq!(ctx.analysis.joins, vec!["LEFT"]);
    }

    #[test]
    fn test_returns_rows_matrix() {
        for (sql, expected) in [
            ("SELECT * FROM t", true),
            ("INSERT INTO t (a) VALUES (1)", false),
            ("INSERT INTO t (a) VALUES (1) RETURNING id", true),
            ("UPDATE t SET a = 1 WHERE id = 2", false),
            ("DELETE FROM t WHERE id = 2 RETURNING id", true),
            ("VALUES (1), (2)", true),
            ("WITH x AS (SELECT 1 AS n) SELECT * FROM x", true),
        ] {
            let mut ctx = parsed_context(sql, Params::None, Dialect::PostgreSQL);
            returns_rows_step(&mut ctx);
            assert_eq!(ctx.analysis.returns_rows, Some(expected), "for {sql}");
        }
    }

    #[test]
    fn test_returns_rows_text_fallback() {
        for (sql, expected) in [
            ("SELECT 1", true),
            ("  with cte as (select 1) select * from cte", true),
            ("EXPLAIN SELECT 1", true),
            ("CREATE TABLE t (a INT)", false),
            ("INSERT INTO t VALUES (1)", false),
        ] {
            let mut ctx = TransformContext::new(sql, Params::None, Dialect::Generic);
            returns_rows_step(&mut ctx);
            assert_eq!(ctx.analysis.returns_rows, Some(expected), "for {sql}");
        }
    }

    #[test]
    fn test_safety_scan_warnings() {
        let mut ctx = parsed_context(
            "SELECT * FROM t WHERE 'x' = 'x' AND sleep(5) = 0",
            Params::None,
            Dialect::Generic,
        );
        safety_scan_step(&mut ctx, false);
        assert!(
            ctx.analysis
                .validation_warnings
                .iter()
                .any(|w| w.contains("tautology"))
        );
        assert!(
            ctx.analysis
                .validation_warnings
                .iter()
                .any(|w| w.contains("suspicious function"))
        );
        assert!(ctx.analysis.validation_issues.is_empty());
    }

    #[test]
    fn test_safety_scan_unguarded_dml() {
        let mut ctx = parsed_context("DELETE FROM t", Params::None, Dialect::Generic);
        safety_scan_step(&mut ctx, false);
        assert!(
            ctx.analysis
                .validation_warnings
                .iter()
                .any(|w| w.contains("DELETE without WHERE"))
        );

        let mut strict = parsed_context("UPDATE t SET a = 1", Params::None, Dialect::Generic);
        safety_scan_step(&mut strict, true);
        assert!(
            strict
                .analysis
                .validation_issues
                .iter()
                .any(|w| w.contains("UPDATE without WHERE"))
        );
    }

    #[test]
    fn test_safety_scan_union_null_probe() {
        let mut ctx = parsed_context(
            "SELECT a, b, c, d FROM t UNION SELECT NULL, NULL, NULL, NULL",
            Params::None,
            Dialect::Generic,
        );
        safety_scan_step(&mut ctx, false);
        assert!(
            ctx.analysis
                .validation_warnings
                .iter()
                .any(|w| w.contains("UNION injection"))
        );
    }

    #[test]
    fn test_copy_extraction() {
        let mut ctx = parsed_context(
            "COPY t (a, b) TO STDOUT",
            Params::positional([ParamValue::Text("payload".into())]),
            Dialect::PostgreSQL,
        );
        copy_extraction_step(&mut ctx);
        assert!(ctx.analysis.copy_operation);
        assert_eq!(
            ctx.analysis.copy_data,
            Some(Params::positional([ParamValue::Text("payload".into())]))
        );
        assert!(ctx.parameters.is_empty());
    }

    #[test]
    fn test_many_statement_expansion() {
        let mut ctx = parsed_context(
            "INSERT INTO t (a, b) VALUES (?1, ?2)",
            Params::Positional(vec![
                Parameter::Plain(ParamValue::array([1i64, 2])),
                Parameter::Plain(ParamValue::array([3i64, 4])),
                Parameter::Plain(ParamValue::array([5i64, 6])),
            ]),
            Dialect::Generic,
        );
        many_statement_expansion_step(&mut ctx).unwrap();
        assert_eq!(ctx.analysis.statements_expanded, 3);
        assert_eq!(ctx.sql.matches("INSERT INTO t").count(), 3);
        assert_eq!(ctx.sql.matches(";\n").count(), 2);
        assert_eq!(ctx.placeholders.len(), 6);
    }
}
