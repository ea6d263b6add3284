use std::collections::BTreeMap;
use std::collections::btree_map;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A single configuration value inside a [`ConfigLayer`].
///
/// Only [`ConfigValue::Map`] values are merged recursively. Every other kind,
/// including [`ConfigValue::List`] and [`ConfigValue::Opaque`], replaces an
/// earlier value wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Explicit absence. Inside `headers` this is the deletion sentinel.
    Null,
    /// A boolean flag
    Bool(bool),
    /// An integer or floating point number
    Number(Number),
    /// A string
    String(String),
    /// A sequence of values, never merged element-wise
    List(Vec<ConfigValue>),
    /// A nested layer, merged key by key
    Map(ConfigLayer),
    /// Binary or form payload, never merged element-wise
    #[serde(skip)]
    Opaque(OpaquePayload),
}

impl ConfigValue {
    /// Returns the nested layer if this is a [`ConfigValue::Map`]
    #[must_use]
    pub const fn as_map(&self) -> Option<&ConfigLayer> {
        match self {
            Self::Map(layer) => Some(layer),
            _ => None,
        }
    }

    /// Returns the string if this is a [`ConfigValue::String`]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for the [`ConfigValue::Null`] sentinel
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value kind, used in error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Opaque(_) => "opaque payload",
        }
    }
}

/// Payload that is carried through a merge untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpaquePayload {
    /// Raw bytes
    Bytes(Bytes),
    /// Form fields in submission order
    Form(Vec<(String, String)>),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for ConfigValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for ConfigValue {
    /// Non-finite numbers have no JSON representation and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<ConfigLayer> for ConfigValue {
    fn from(value: ConfigLayer) -> Self {
        Self::Map(value)
    }
}

impl From<OpaquePayload> for ConfigValue {
    fn from(value: OpaquePayload) -> Self {
        Self::Opaque(value)
    }
}

impl<T: Into<ConfigValue>> From<Option<T>> for ConfigValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => Self::Map(map.into()),
        }
    }
}

/// One partial configuration source.
///
/// Keys are kept in sorted order, so two layers with the same entries always
/// compare equal and iterate identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigLayer(BTreeMap<String, ConfigValue>);

impl ConfigLayer {
    /// Create an empty layer
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous one for this key
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Option<ConfigValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Get a value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut ConfigValue> {
        self.0.get_mut(key)
    }

    /// Whether `key` is present, regardless of its value
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, ConfigValue> {
        self.0.iter()
    }

    /// Number of top-level entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the layer has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ConfigLayer {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = btree_map::Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigLayer
where
    K: Into<String>,
    V: Into<ConfigValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Map<String, Value>> for ConfigLayer {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}
