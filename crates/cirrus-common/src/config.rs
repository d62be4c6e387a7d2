//! Deployment-scoped configuration store.
//!
//! Settings live in a YAML stack file:
//!
//! ```yaml
//! project: weather
//! stack: dev
//! config:
//!   weather:prefixName: demo
//!   weather:containerPort: 8080
//!   weather:weatherApiKey:
//!     secure: "..."
//! ```
//!
//! Keys may be written with or without the `<project>:` namespace. A value
//! given as a mapping with a `secure` entry is held as a [`Secret`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{DEFAULT_STACK_NAME, ENV_CONFIG_PREFIX, SECURE_KEY};
use crate::error::{CirrusError, Result};
use crate::secret::Secret;

/// A single stored configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Plain text value.
    Plain(String),
    /// Secret value.
    Secret(Secret),
}

#[derive(Debug, Deserialize)]
struct StackFile {
    project: Option<String>,
    stack: Option<String>,
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

/// Typed access to the settings of one stack.
#[derive(Debug, Clone)]
pub struct Config {
    project: String,
    stack: String,
    entries: BTreeMap<String, ConfigValue>,
}

impl Config {
    /// Creates an empty store for the given project and stack.
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads a stack file from disk.
    ///
    /// `default_project` is used when the file does not name a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid stack file.
    pub fn from_file(path: &Path, default_project: &str) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading stack configuration");
        let content = std::fs::read_to_string(path).map_err(|e| CirrusError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content, default_project)
    }

    /// Parses a stack file from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a value has an
    /// unsupported shape.
    pub fn from_yaml(content: &str, default_project: &str) -> Result<Self> {
        let file: StackFile = serde_yaml::from_str(content).map_err(|e| CirrusError::Config {
            message: format!("malformed stack file: {e}"),
        })?;

        let mut config = Self::new(
            file.project.unwrap_or_else(|| default_project.to_owned()),
            file.stack.unwrap_or_else(|| DEFAULT_STACK_NAME.to_owned()),
        );
        for (key, raw) in file.config {
            let value = convert_yaml(&key, raw)?;
            let _ = config.entries.insert(key, value);
        }
        tracing::debug!(
            project = %config.project,
            stack = %config.stack,
            keys = config.entries.len(),
            "stack configuration parsed"
        );
        Ok(config)
    }

    /// Stores a plain value, replacing any previous one.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self
            .entries
            .insert(key.into(), ConfigValue::Plain(value.into()));
        self
    }

    /// Stores a secret value, replacing any previous one.
    #[must_use]
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self
            .entries
            .insert(key.into(), ConfigValue::Secret(Secret::new(value)));
        self
    }

    /// Removes a key in either its namespaced or bare form.
    pub fn remove(&mut self, key: &str) {
        let namespaced = self.qualify(key);
        let _ = self.entries.remove(&namespaced);
        let _ = self.entries.remove(key);
    }

    /// Applies `CIRRUS_CONFIG_<KEY>` overrides from the given variables.
    ///
    /// The key part is matched case-insensitively against the bare key.
    /// Overriding a secret keeps it secret.
    pub fn apply_env_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(suffix) = name.strip_prefix(ENV_CONFIG_PREFIX) else {
                continue;
            };
            let Some(key) = self.find_key_by_env_suffix(suffix) else {
                continue;
            };
            tracing::debug!(key = %key, "configuration overridden from environment");
            let replaced = match self.entries.get(&key) {
                Some(ConfigValue::Secret(_)) => ConfigValue::Secret(Secret::new(value)),
                _ => ConfigValue::Plain(value),
            };
            let _ = self.entries.insert(key, replaced);
        }
    }

    fn find_key_by_env_suffix(&self, suffix: &str) -> Option<String> {
        self.entries
            .keys()
            .find(|k| env_suffix(self.bare(k)) == suffix)
            .cloned()
    }

    /// Project the configuration belongs to.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Stack (deployment environment) name.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Returns a plain optional value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds a secret: secrets are only
    /// readable through [`Config::require_secret`].
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(ConfigValue::Plain(v)) => Ok(Some(v.clone())),
            Some(ConfigValue::Secret(_)) => Err(CirrusError::InvalidConfig {
                key: self.qualify(key),
                message: "value is secret; read it with require_secret".into(),
            }),
        }
    }

    /// Returns a required plain string.
    ///
    /// # Errors
    ///
    /// Returns [`CirrusError::MissingConfig`] if the key is absent.
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)?.ok_or_else(|| CirrusError::MissingConfig {
            key: self.qualify(key),
        })
    }

    /// Returns a required number.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or not numeric.
    pub fn require_number(&self, key: &str) -> Result<f64> {
        let raw = self.require(key)?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| CirrusError::InvalidConfig {
                key: self.qualify(key),
                message: format!("expected a number, got '{raw}'"),
            })
    }

    /// Returns a required TCP port.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or not an integer in `1..=65535`.
    pub fn require_port(&self, key: &str) -> Result<u16> {
        let raw = self.require(key)?;
        raw.trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| CirrusError::InvalidConfig {
                key: self.qualify(key),
                message: format!("expected a port number between 1 and 65535, got '{raw}'"),
            })
    }

    /// Returns a required value as a secret.
    ///
    /// Plain values are promoted to secrets.
    ///
    /// # Errors
    ///
    /// Returns [`CirrusError::MissingConfig`] if the key is absent.
    pub fn require_secret(&self, key: &str) -> Result<Secret> {
        match self.lookup(key) {
            Some(ConfigValue::Secret(s)) => Ok(s.clone()),
            Some(ConfigValue::Plain(v)) => Ok(Secret::new(v.clone())),
            None => Err(CirrusError::MissingConfig {
                key: self.qualify(key),
            }),
        }
    }

    fn lookup(&self, key: &str) -> Option<&ConfigValue> {
        self.entries
            .get(&self.qualify(key))
            .or_else(|| self.entries.get(key))
    }

    fn qualify(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_owned()
        } else {
            format!("{}:{key}", self.project)
        }
    }

    fn bare<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.project.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key)
    }
}

fn env_suffix(key: &str) -> String {
    key.replace(':', "_").to_uppercase()
}

fn convert_yaml(key: &str, raw: serde_yaml::Value) -> Result<ConfigValue> {
    match raw {
        serde_yaml::Value::String(s) => Ok(ConfigValue::Plain(s)),
        serde_yaml::Value::Number(n) => Ok(ConfigValue::Plain(n.to_string())),
        serde_yaml::Value::Bool(b) => Ok(ConfigValue::Plain(b.to_string())),
        serde_yaml::Value::Mapping(map) => match map.get(SECURE_KEY) {
            Some(serde_yaml::Value::String(s)) => Ok(ConfigValue::Secret(Secret::new(s.clone()))),
            _ => Err(CirrusError::InvalidConfig {
                key: key.to_owned(),
                message: "mappings are only allowed as { secure: <string> }".into(),
            }),
        },
        _ => Err(CirrusError::InvalidConfig {
            key: key.to_owned(),
            message: "unsupported value type".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"
project: weather
stack: dev
config:
  weather:appPath: ../app
  prefixName: demo
  weather:containerPort: 8080
  weather:cpu: 1.5
  weather:weatherApiKey:
    secure: s3cr3t
"#;

    #[test]
    fn parses_namespaced_and_bare_keys() {
        let config = Config::from_yaml(STACK, "fallback").expect("parse");
        assert_eq!(config.project(), "weather");
        assert_eq!(config.stack(), "dev");
        assert_eq!(config.require("appPath").expect("appPath"), "../app");
        assert_eq!(config.require("prefixName").expect("prefix"), "demo");
    }

    #[test]
    fn typed_accessors() {
        let config = Config::from_yaml(STACK, "weather").expect("parse");
        assert_eq!(config.require_port("containerPort").expect("port"), 8080);
        assert!((config.require_number("cpu").expect("cpu") - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_key_names_qualified_key() {
        let config = Config::from_yaml(STACK, "weather").expect("parse");
        let err = config.require("imageTag").unwrap_err();
        assert!(matches!(err, CirrusError::MissingConfig { ref key } if key == "weather:imageTag"));
    }

    #[test]
    fn secure_values_are_secret() {
        let config = Config::from_yaml(STACK, "weather").expect("parse");
        let secret = config.require_secret("weatherApiKey").expect("secret");
        assert_eq!(secret.expose(), "s3cr3t");
        assert!(config.require("weatherApiKey").is_err());
    }

    #[test]
    fn non_numeric_number_is_rejected() {
        let config = Config::new("weather", "dev").with("cpu", "lots");
        let err = config.require_number("cpu").unwrap_err();
        assert!(err.to_string().contains("expected a number"), "got: {err}");
    }

    #[test]
    fn port_out_of_range_is_rejected() {
        let config = Config::new("weather", "dev")
            .with("containerPort", "70000")
            .with("publicPort", "0");
        assert!(config.require_port("containerPort").is_err());
        assert!(config.require_port("publicPort").is_err());
    }

    #[test]
    fn default_stack_name_applies() {
        let config = Config::from_yaml("config: {}\n", "weather").expect("parse");
        assert_eq!(config.project(), "weather");
        assert_eq!(config.stack(), DEFAULT_STACK_NAME);
    }

    #[test]
    fn malformed_mapping_is_rejected() {
        let yaml = "config:\n  weather:cpu:\n    cores: 2\n";
        assert!(Config::from_yaml(yaml, "weather").is_err());
    }

    #[test]
    fn env_overrides_replace_values_and_keep_secrets_secret() {
        let mut config = Config::from_yaml(STACK, "weather").expect("parse");
        config.apply_env_overrides([
            ("CIRRUS_CONFIG_PREFIXNAME".to_owned(), "prod".to_owned()),
            ("CIRRUS_CONFIG_WEATHERAPIKEY".to_owned(), "rotated".to_owned()),
            ("UNRELATED".to_owned(), "x".to_owned()),
        ]);
        assert_eq!(config.require("prefixName").expect("prefix"), "prod");
        assert_eq!(
            config.require_secret("weatherApiKey").expect("key").expose(),
            "rotated"
        );
        assert!(config.get("weatherApiKey").is_err());
    }

    #[test]
    fn remove_drops_either_form() {
        let mut config = Config::from_yaml(STACK, "weather").expect("parse");
        config.remove("appPath");
        config.remove("prefixName");
        assert!(config.require("appPath").is_err());
        assert!(config.require("prefixName").is_err());
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Cirrus.dev.yaml");
        std::fs::write(&path, STACK).expect("write");
        let config = Config::from_file(&path, "weather").expect("load");
        assert_eq!(config.require("prefixName").expect("prefix"), "demo");
        assert!(Config::from_file(&dir.path().join("missing.yaml"), "weather").is_err());
    }
}
