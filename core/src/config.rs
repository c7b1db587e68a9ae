//! Driver parameter configuration
//!
//! A [`DriverConfig`] declares how one database driver wants parameters:
//! which placeholder styles it accepts, which style reaches the wire, the
//! last-mile value coercions, and whether the driver expands `IN (?)` list
//! binds natively. The processor treats the record as opaque data.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use compact_str::CompactString;

use rebind_types::{ParamValue, ParameterStyle, Params, SqlType};

/// Per-type value coercion applied before emission.
pub type CoercionFn = Arc<dyn Fn(ParamValue) -> ParamValue + Send + Sync>;

/// Final per-driver hook over the emitted pair.
pub type OutputTransformer = Arc<dyn Fn(String, Params) -> (String, Params) + Send + Sync>;

/// Declarative description of a driver's parameter handling.
#[derive(Clone)]
pub struct DriverConfig {
    /// Stable name anchoring this config's cache identity.
    pub label: CompactString,
    /// The style the driver prefers after normalization.
    pub default_parameter_style: ParameterStyle,
    /// Styles accepted as input.
    pub supported_parameter_styles: HashSet<ParameterStyle>,
    /// Styles the driver can put on the wire; `None` means the same as
    /// `supported_parameter_styles`.
    pub supported_execution_parameter_styles: Option<HashSet<ParameterStyle>>,
    pub default_execution_parameter_style: Option<ParameterStyle>,
    /// Last-mile coercions keyed by symbolic type.
    pub type_coercion_map: HashMap<SqlType, CoercionFn>,
    /// Whether the driver expands `IN (?)` list binds itself.
    pub has_native_list_expansion: bool,
    pub output_transformer: Option<OutputTransformer>,
    pub allow_mixed_parameter_styles: bool,
    /// Keep the caller's container shape in the output when possible.
    pub preserve_parameter_format: bool,
}

impl DriverConfig {
    pub fn new(label: &str, default_parameter_style: ParameterStyle) -> Self {
        Self {
            label: CompactString::new(label),
            default_parameter_style,
            supported_parameter_styles: HashSet::from([default_parameter_style]),
            supported_execution_parameter_styles: None,
            default_execution_parameter_style: None,
            type_coercion_map: HashMap::new(),
            has_native_list_expansion: false,
            output_transformer: None,
            allow_mixed_parameter_styles: false,
            preserve_parameter_format: false,
        }
    }

    #[must_use]
    pub fn with_supported_styles(mut self, styles: impl IntoIterator<Item = ParameterStyle>) -> Self {
        self.supported_parameter_styles = styles.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_execution_style(mut self, style: ParameterStyle) -> Self {
        self.supported_execution_parameter_styles = Some(HashSet::from([style]));
        self.default_execution_parameter_style = Some(style);
        self
    }

    #[must_use]
    pub fn with_execution_styles(
        mut self,
        styles: impl IntoIterator<Item = ParameterStyle>,
        default: ParameterStyle,
    ) -> Self {
        self.supported_execution_parameter_styles = Some(styles.into_iter().collect());
        self.default_execution_parameter_style = Some(default);
        self
    }

    #[must_use]
    pub fn with_coercion(
        mut self,
        sql_type: SqlType,
        coerce: impl Fn(ParamValue) -> ParamValue + Send + Sync + 'static,
    ) -> Self {
        self.type_coercion_map.insert(sql_type, Arc::new(coerce));
        self
    }

    #[must_use]
    pub fn with_output_transformer(
        mut self,
        transformer: impl Fn(String, Params) -> (String, Params) + Send + Sync + 'static,
    ) -> Self {
        self.output_transformer = Some(Arc::new(transformer));
        self
    }

    #[must_use]
    pub fn with_native_list_expansion(mut self) -> Self {
        self.has_native_list_expansion = true;
        self
    }

    #[must_use]
    pub fn with_mixed_styles_allowed(mut self) -> Self {
        self.allow_mixed_parameter_styles = true;
        self
    }

    #[must_use]
    pub fn with_preserved_parameter_format(mut self) -> Self {
        self.preserve_parameter_format = true;
        self
    }

    /// The execution-style set this config effectively advertises.
    #[must_use]
    pub fn execution_styles(&self) -> &HashSet<ParameterStyle> {
        self.supported_execution_parameter_styles
            .as_ref()
            .unwrap_or(&self.supported_parameter_styles)
    }

    /// The style the processor rewrites toward when the detected styles
    /// are not executable as-is.
    #[must_use]
    pub fn execution_target(&self) -> ParameterStyle {
        self.default_execution_parameter_style
            .unwrap_or(self.default_parameter_style)
    }

    /// Hash identity for cache keys: the label, the style fields, the flag
    /// bits, and which hooks are present. Hook closures count by presence
    /// only, so reconstructing an identical config hits the same entries.
    #[must_use]
    pub fn identity(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.label.hash(&mut hasher);
        self.default_parameter_style.hash(&mut hasher);
        hash_style_set(&self.supported_parameter_styles, &mut hasher);
        match &self.supported_execution_parameter_styles {
            Some(styles) => hash_style_set(styles, &mut hasher),
            None => u8::MAX.hash(&mut hasher),
        }
        self.default_execution_parameter_style.hash(&mut hasher);
        let mut coercion_keys: Vec<&'static str> =
            self.type_coercion_map.keys().map(SqlType::hint).collect();
        coercion_keys.sort_unstable();
        coercion_keys.hash(&mut hasher);
        self.has_native_list_expansion.hash(&mut hasher);
        self.output_transformer.is_some().hash(&mut hasher);
        self.allow_mixed_parameter_styles.hash(&mut hasher);
        self.preserve_parameter_format.hash(&mut hasher);
        hasher.finish()
    }

    // ---- presets ----

    /// SQLite-family drivers: `?` in and out, text-level IN expansion.
    #[must_use]
    pub fn sqlite() -> Self {
        Self::new("sqlite", ParameterStyle::Qmark)
            .with_supported_styles([ParameterStyle::Qmark, ParameterStyle::NamedColon])
            .with_execution_style(ParameterStyle::Qmark)
    }

    /// PostgreSQL wire protocol: `$1` only.
    #[must_use]
    pub fn postgres() -> Self {
        Self::new("postgres", ParameterStyle::Numeric).with_execution_style(ParameterStyle::Numeric)
    }

    /// PostgreSQL `%s`-binding drivers.
    #[must_use]
    pub fn postgres_pyformat() -> Self {
        Self::new("postgres-pyformat", ParameterStyle::PositionalPyformat)
            .with_supported_styles([
                ParameterStyle::PositionalPyformat,
                ParameterStyle::NamedPyformat,
                ParameterStyle::Numeric,
            ])
            .with_execution_style(ParameterStyle::PositionalPyformat)
    }

    /// MySQL drivers: pyformat in, `%s` out.
    #[must_use]
    pub fn mysql() -> Self {
        Self::new("mysql", ParameterStyle::PositionalPyformat)
            .with_supported_styles([ParameterStyle::PositionalPyformat, ParameterStyle::NamedPyformat])
            .with_execution_style(ParameterStyle::PositionalPyformat)
    }

    /// Oracle drivers: `:name` and `:1`, native list expansion.
    #[must_use]
    pub fn oracle() -> Self {
        Self::new("oracle", ParameterStyle::NamedColon)
            .with_supported_styles([ParameterStyle::NamedColon, ParameterStyle::PositionalColon])
            .with_execution_style(ParameterStyle::NamedColon)
            .with_native_list_expansion()
    }

    /// BigQuery: `@name` only, native list expansion.
    #[must_use]
    pub fn bigquery() -> Self {
        Self::new("bigquery", ParameterStyle::NamedAt)
            .with_execution_style(ParameterStyle::NamedAt)
            .with_native_list_expansion()
    }
}

fn hash_style_set(styles: &HashSet<ParameterStyle>, hasher: &mut impl Hasher) {
    let mut ranked: Vec<&'static str> = styles.iter().map(ParameterStyle::as_str).collect();
    ranked.sort_unstable();
    ranked.hash(hasher);
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("label", &self.label)
            .field("default_parameter_style", &self.default_parameter_style)
            .field("supported_parameter_styles", &self.supported_parameter_styles)
            .field(
                "supported_execution_parameter_styles",
                &self.supported_execution_parameter_styles,
            )
            .field("default_execution_parameter_style", &self.default_execution_parameter_style)
            .field("coercions", &self.type_coercion_map.len())
            .field("has_native_list_expansion", &self.has_native_list_expansion)
            .field("output_transformer", &self.output_transformer.is_some())
            .field("allow_mixed_parameter_styles", &self.allow_mixed_parameter_styles)
            .field("preserve_parameter_format", &self.preserve_parameter_format)
            .finish()
    }
}
