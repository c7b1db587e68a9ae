use compact_str::CompactString;
use indexmap::IndexMap;

use crate::sql_type::SqlType;

/// A runtime parameter value.
///
/// This is the closed set of value variants the normalization engine moves
/// around; drivers convert from here into their wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Decimal(rust_decimal::Decimal),
    Date(chrono::NaiveDate),
    Timestamp(chrono::NaiveDateTime),
    Array(Vec<ParamValue>),
    Json(serde_json::Value),
}

impl ParamValue {
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// The natural symbolic SQL type of this value, without any wrapping
    /// rules applied. Large integers still report [`SqlType::Integer`]; the
    /// wrapper is what promotes them to [`SqlType::BigInt`].
    #[must_use]
    pub const fn sql_type(&self) -> SqlType {
        match self {
            ParamValue::Null => SqlType::Null,
            ParamValue::Bool(_) => SqlType::Boolean,
            ParamValue::Int(_) => SqlType::Integer,
            ParamValue::Float(_) => SqlType::Float,
            ParamValue::Text(_) => SqlType::Varchar,
            ParamValue::Bytes(_) => SqlType::Binary,
            ParamValue::Decimal(_) => SqlType::Decimal,
            ParamValue::Date(_) => SqlType::Date,
            ParamValue::Timestamp(_) => SqlType::Timestamp,
            ParamValue::Array(_) => SqlType::Array,
            ParamValue::Json(_) => SqlType::Json,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(value: Vec<u8>) -> Self {
        ParamValue::Bytes(value)
    }
}

impl From<rust_decimal::Decimal> for ParamValue {
    fn from(value: rust_decimal::Decimal) -> Self {
        ParamValue::Decimal(value)
    }
}

impl From<chrono::NaiveDate> for ParamValue {
    fn from(value: chrono::NaiveDate) -> Self {
        ParamValue::Date(value)
    }
}

impl From<chrono::NaiveDateTime> for ParamValue {
    fn from(value: chrono::NaiveDateTime) -> Self {
        ParamValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        ParamValue::Json(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => ParamValue::Null,
        }
    }
}

impl ParamValue {
    /// Builds an [`ParamValue::Array`] from any iterator of convertible
    /// values. `Vec<u8>` deliberately converts to [`ParamValue::Bytes`]
    /// instead, so byte strings never round-trip as integer arrays.
    pub fn array<V: Into<ParamValue>>(values: impl IntoIterator<Item = V>) -> Self {
        ParamValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(value: Vec<i64>) -> Self {
        ParamValue::array(value)
    }
}

impl From<Vec<i32>> for ParamValue {
    fn from(value: Vec<i32>) -> Self {
        ParamValue::array(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(value: Vec<&str>) -> Self {
        ParamValue::array(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::array(value)
    }
}

/// A parameter value carrying explicit type metadata.
///
/// Created by the typed-parameter wrapper for values whose type a driver
/// cannot safely infer from the raw value alone (NULLs, booleans, large
/// integers, temporals, and so on). The `type_hint` tag allows dispatch
/// without inspecting `data_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedParam {
    /// The wrapped runtime value.
    pub value: ParamValue,
    /// Symbolic SQL type the driver should coerce toward.
    pub data_type: SqlType,
    /// Short tag for fast dispatch; redundant with `data_type`.
    pub type_hint: &'static str,
    /// The parameter name, when known, for diagnostics.
    pub semantic_name: Option<CompactString>,
}

impl TypedParam {
    pub fn new(value: ParamValue, data_type: SqlType, semantic_name: Option<&str>) -> Self {
        Self {
            value,
            data_type,
            type_hint: data_type.hint(),
            semantic_name: semantic_name.map(CompactString::new),
        }
    }
}

/// One slot in a parameter container: either a bare value or a value that
/// the wrapper annotated with type metadata.
///
/// Keeping the two cases distinct preserves the fast path: strings, small
/// integers, and floats travel unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Plain(ParamValue),
    Typed(TypedParam),
}

impl Parameter {
    /// The runtime value, regardless of wrapping.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> &ParamValue {
        match self {
            Parameter::Plain(v) => v,
            Parameter::Typed(t) => &t.value,
        }
    }

    /// Consumes the slot, discarding type metadata if present.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> ParamValue {
        match self {
            Parameter::Plain(v) => v,
            Parameter::Typed(t) => t.value,
        }
    }

    /// The symbolic SQL type: the wrapper's annotation when wrapped,
    /// otherwise the value's natural type.
    #[inline]
    #[must_use]
    pub const fn sql_type(&self) -> SqlType {
        match self {
            Parameter::Plain(v) => v.sql_type(),
            Parameter::Typed(t) => t.data_type,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_wrapped(&self) -> bool {
        matches!(self, Parameter::Typed(_))
    }
}

impl From<ParamValue> for Parameter {
    fn from(value: ParamValue) -> Self {
        Parameter::Plain(value)
    }
}

impl From<TypedParam> for Parameter {
    fn from(value: TypedParam) -> Self {
        Parameter::Typed(value)
    }
}

macro_rules! impl_parameter_from {
    ($($t:ty),+ $(,)?) => {
        $(
            impl From<$t> for Parameter {
                fn from(value: $t) -> Self {
                    Parameter::Plain(value.into())
                }
            }
        )+
    };
}

impl_parameter_from!(bool, i32, i64, f64, &str, String, Vec<u8>);

/// The caller-supplied parameter container.
///
/// The named form preserves insertion order because positional fallback
/// resolution ("the i-th value in insertion order") depends on it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    /// No parameters (also the result of static embedding).
    #[default]
    None,
    /// A single bare value for single-placeholder SQL.
    Scalar(Parameter),
    /// An ordered sequence matched to placeholders by position.
    Positional(Vec<Parameter>),
    /// A keyed map matched to placeholders by name.
    Named(IndexMap<CompactString, Parameter>),
}

impl Params {
    /// Number of values carried by the container.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Scalar(_) => 1,
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Container kind, for error messages and shape hashing.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Params::None => "none",
            Params::Scalar(_) => "scalar",
            Params::Positional(_) => "sequence",
            Params::Named(_) => "map",
        }
    }

    /// Value at positional index `i`, where scalars act as a one-element
    /// sequence and named containers fall back to insertion order.
    #[must_use]
    pub fn get_index(&self, i: usize) -> Option<&Parameter> {
        match self {
            Params::None => None,
            Params::Scalar(value) => (i == 0).then_some(value),
            Params::Positional(values) => values.get(i),
            Params::Named(values) => values.get_index(i).map(|(_, v)| v),
        }
    }

    /// Value under `key` for named containers.
    #[must_use]
    pub fn get_named(&self, key: &str) -> Option<&Parameter> {
        match self {
            Params::Named(values) => values.get(key),
            _ => None,
        }
    }

    /// Applies `f` to every value slot in place.
    pub fn map_in_place(&mut self, mut f: impl FnMut(Parameter) -> Parameter) {
        match self {
            Params::None => {}
            Params::Scalar(value) => {
                let taken = core::mem::replace(value, Parameter::Plain(ParamValue::Null));
                *value = f(taken);
            }
            Params::Positional(values) => {
                for slot in values.iter_mut() {
                    let taken = core::mem::replace(slot, Parameter::Plain(ParamValue::Null));
                    *slot = f(taken);
                }
            }
            Params::Named(values) => {
                for (_, slot) in values.iter_mut() {
                    let taken = core::mem::replace(slot, Parameter::Plain(ParamValue::Null));
                    *slot = f(taken);
                }
            }
        }
    }

    /// Hash of the container's shape: its kind plus, per slot, the key (for
    /// named containers) or the value's type tag (for sequences). Values do
    /// not participate, so two calls that differ only in values share cache
    /// entries.
    #[must_use]
    pub fn shape_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.kind().hash(&mut hasher);
        match self {
            Params::None => {}
            Params::Scalar(value) => value.sql_type().hint().hash(&mut hasher),
            Params::Positional(values) => {
                for value in values {
                    value.sql_type().hint().hash(&mut hasher);
                }
            }
            Params::Named(values) => {
                for key in values.keys() {
                    key.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    /// Hash of the container's values, via their canonical debug
    /// rendering. Compiled-statement caching needs this alongside
    /// [`Params::shape_hash`]: NULL elision and IN-list expansion make the
    /// output SQL depend on the values themselves, not just their shape.
    #[must_use]
    pub fn value_fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        format!("{self:?}").hash(&mut hasher);
        hasher.finish()
    }

    /// Builds a named container from key/value pairs, preserving order.
    pub fn named<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Parameter>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (CompactString::new(k.as_ref()), v.into()))
                .collect(),
        )
    }

    /// Builds an ordered sequence container.
    pub fn positional<V: Into<Parameter>>(values: impl IntoIterator<Item = V>) -> Self {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<Parameter>> for Params {
    fn from(values: Vec<Parameter>) -> Self {
        Params::Positional(values)
    }
}

impl From<IndexMap<CompactString, Parameter>> for Params {
    fn from(values: IndexMap<CompactString, Parameter>) -> Self {
        Params::Named(values)
    }
}
