//! Opaque secret strings.
//!
//! A [`Secret`] carries the "secret" capability through the resource graph.
//! Its `Debug`, `Display` and `Serialize` implementations never reveal the
//! wrapped value; the only way out is [`Secret::expose`].

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

/// Placeholder written wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[secret]";

/// A secret string value.
#[derive(Clone)]
pub struct Secret(SecretString);

impl Secret {
    /// Wraps a plain string as a secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Returns the plain value. Callers must not log or persist it.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns whether the secret holds an empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), REDACTED);
        assert_eq!(secret.to_string(), REDACTED);
    }

    #[test]
    fn serializes_as_placeholder() {
        let secret = Secret::new("hunter2");
        let json = serde_json::to_string(&secret).expect("serialize");
        assert_eq!(json, "\"[secret]\"");
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn expose_returns_plain_value() {
        assert_eq!(Secret::new("k").expose(), "k");
        assert!(Secret::new("").is_empty());
    }

    #[test]
    fn equality_compares_contents() {
        assert_eq!(Secret::new("a"), Secret::from("a"));
        assert_ne!(Secret::new("a"), Secret::new("b"));
    }
}
