//! Property values flowing between resource declarations.

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::secret::Secret;

/// A resolved property value.
///
/// Objects keep their keys ordered so that two declarations built from the
/// same configuration compare and serialise identically.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Numeric value (ports, CPU cores, memory sizes).
    Number(f64),
    /// Plain string.
    String(String),
    /// Secret string, never rendered in plain output.
    Secret(Secret),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed map.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Builds an object value from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns true if this value, or any value nested in it, is secret.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        match self {
            Self::Secret(_) => true,
            Self::List(items) => items.iter().any(Self::is_secret),
            Self::Object(map) => map.values().any(Self::is_secret),
            _ => false,
        }
    }

    /// Returns the string contents of a plain string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric contents of a number value.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the secret contents of a secret value.
    #[must_use]
    pub const fn as_secret(&self) -> Option<&Secret> {
        match self {
            Self::Secret(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the entry stored under `key` if this is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Returns the element at `index` if this is a list.
    #[must_use]
    pub fn index(&self, index: usize) -> Option<&Self> {
        match self {
            Self::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Renders a scalar as text for string interpolation.
    ///
    /// Returns the text and whether it came from a secret. Lists, objects
    /// and null have no textual form and yield `None`.
    #[must_use]
    pub fn interpolation_text(&self) -> Option<(String, bool)> {
        match self {
            Self::String(s) => Some((s.clone(), false)),
            Self::Number(n) => Some((format_number(*n), false)),
            Self::Bool(b) => Some((b.to_string(), false)),
            Self::Secret(s) => Some((s.expose().to_owned(), true)),
            Self::Null | Self::List(_) | Self::Object(_) => None,
        }
    }

    /// Converts to JSON with secrets in plain text.
    ///
    /// Only for handing values to a provider; never log the result.
    #[must_use]
    pub fn reveal(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Secret(s) => serde_json::Value::String(s.expose().to_owned()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::reveal).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.reveal())).collect(),
            ),
        }
    }

    /// Converts to JSON with secrets replaced by the redaction marker.
    #[must_use]
    pub fn redacted(&self) -> serde_json::Value {
        match self {
            Self::Secret(_) => serde_json::Value::String(crate::secret::REDACTED.to_owned()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::redacted).collect())
            }
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.redacted())).collect(),
            ),
            other => other.reveal(),
        }
    }

    /// Reads a redacted JSON document back into a value.
    ///
    /// Redaction markers come back as plain strings; the original secret is
    /// gone by construction.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Formats a number the way it is written in configuration: integers
/// without a fractional part.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(_) => self.reveal().serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Secret(s) => s.serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<Secret> for Value {
    fn from(value: Secret) -> Self {
        Self::Secret(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_secret_is_detected() {
        let v = Value::object([(
            "registries",
            Value::List(vec![Value::object([("password", Value::from(Secret::new("p")))])]),
        )]);
        assert!(v.is_secret());
        assert!(!Value::object([("a", Value::from("b"))]).is_secret());
    }

    #[test]
    fn serialization_redacts_secrets() {
        let v = Value::object([
            ("key", Value::from(Secret::new("abc123"))),
            ("port", Value::from(6380_u16)),
        ]);
        let json = serde_json::to_string(&v).expect("serialize");
        assert_eq!(json, r#"{"key":"[secret]","port":6380}"#);
    }

    #[test]
    fn reveal_exposes_secrets() {
        let v = Value::from(Secret::new("abc123"));
        assert_eq!(v.reveal(), serde_json::json!("abc123"));
        assert_eq!(v.redacted(), serde_json::json!("[secret]"));
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(format_number(8080.0), "8080");
        assert_eq!(format_number(1.5), "1.5");
    }

    #[test]
    fn interpolation_text_marks_secret_origin() {
        assert_eq!(
            Value::from("host").interpolation_text(),
            Some(("host".to_owned(), false))
        );
        assert_eq!(
            Value::from(Secret::new("k")).interpolation_text(),
            Some(("k".to_owned(), true))
        );
        assert_eq!(Value::List(vec![]).interpolation_text(), None);
    }

    #[test]
    fn json_round_trip_of_plain_values() {
        let json = serde_json::json!({"ip": "20.1.2.3", "ports": [{"port": 80}]});
        let v = Value::from_json(&json);
        assert_eq!(v.get("ip").and_then(Value::as_str), Some("20.1.2.3"));
        assert_eq!(v.redacted(), json);
    }
}
