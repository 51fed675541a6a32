//! Bindable values and selection-argument sets.
//!
//! [`Value`] is the closed set of kinds that can be bound to a statement
//! parameter or read back from a result column. [`Parameters`] carries the
//! arguments for one statement: nothing, an ordered sequence for `?`
//! markers, or a name-keyed map for `:name` markers. Both forms can never be
//! supplied at once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A value that can be bound to a statement parameter or read from a
/// result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean, stored by engines without a native type as 0/1.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit unsigned integer.
    Unsigned(u64),
    /// Double-precision float.
    Double(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob.
    Blob(Vec<u8>),
    /// Point in time, UTC.
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Short name of the value's kind, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Unsigned(_) => "unsigned integer",
            Self::Double(_) => "double",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Returns `true` if this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Unsigned(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Column name to value map used for inserted/updated content and for
/// named parameters.
///
/// A `BTreeMap` keeps column order stable, so the same content always
/// renders the same statement text.
pub type ContentValues = BTreeMap<String, Value>;

/// Arguments bound to a single statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Parameters {
    /// No bound values.
    #[default]
    None,
    /// Values bound in order to `?` markers.
    Positional(Vec<Value>),
    /// Values bound by name to `:name` markers. Keys are given without the
    /// leading colon.
    Named(ContentValues),
}

impl Parameters {
    /// Returns `true` when the arguments bind by name.
    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }

    /// Number of bound values.
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(values) => values.len(),
            Self::Named(values) => values.len(),
        }
    }

    /// Returns `true` when no values are bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::None => "nowhere",
            Self::Positional(_) => "positionally",
            Self::Named(_) => "by name",
        }
    }
}

impl From<Vec<Value>> for Parameters {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<ContentValues> for Parameters {
    fn from(values: ContentValues) -> Self {
        Self::Named(values)
    }
}

/// Builds a [`ContentValues`] map from `key => value` pairs.
///
/// ```
/// use sqlhelper_core::{content_values, Value};
///
/// let values = content_values! { "platform" => "ios", "build" => 42_i64 };
/// assert_eq!(values["build"], Value::Integer(42));
/// ```
#[macro_export]
macro_rules! content_values {
    ($($key:expr => $val:expr),* $(,)?) => {{
        let mut map = $crate::ContentValues::new();
        $(map.insert(::std::string::String::from($key), $crate::Value::from($val));)*
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_converts_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }

    #[test]
    fn test_parameters_len() {
        assert!(Parameters::None.is_empty());
        assert_eq!(Parameters::from(vec![Value::from(1_i64), Value::Null]).len(), 2);
        let named = Parameters::from(content_values! { "id" => 7_i64 });
        assert!(named.is_named());
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn test_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::Integer(3),
            Value::Text("a".to_string()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,3,"a"]"#);
    }
}
