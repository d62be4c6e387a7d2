//! Input expressions attached to resource declarations.
//!
//! An [`Input`] is either known at declaration time or refers to an output
//! of an earlier node that only exists once the provider has materialised
//! it. Every [`OutputRef`] inside an input is a consumer edge in the graph.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cirrus_common::error::{CirrusError, Result};
use cirrus_common::secret::Secret;
use cirrus_common::value::Value;

/// Position of a node in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a node ID from its declaration index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the declaration index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One step of a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// List index.
    Index(usize),
}

/// Path into a node's outputs, e.g. `passwords[0].value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath(Vec<PathSegment>);

impl PropertyPath {
    /// A path of a single object key.
    pub fn key(key: impl Into<String>) -> Self {
        Self(vec![PathSegment::Key(key.into())])
    }

    /// Parses a dotted path with optional `[n]` indices.
    ///
    /// # Errors
    ///
    /// Returns an error for a segment without a key or a malformed index.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid =
            |why: &str| CirrusError::graph(format!("invalid property path '{path}': {why}"));
        let mut segments = Vec::new();
        for part in path.split('.') {
            let (key, mut rest) = part.find('[').map_or((part, ""), |i| part.split_at(i));
            if key.is_empty() {
                return Err(invalid("every segment must start with a key"));
            }
            segments.push(PathSegment::Key(key.to_owned()));
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                let index = rest
                    .get(1..close)
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| invalid("index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected text after index"));
                }
            }
        }
        Ok(Self(segments))
    }

    /// Follows the path through a value.
    #[must_use]
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |value, segment| match segment {
            PathSegment::Key(key) => value.get(key),
            PathSegment::Index(index) => value.index(*index),
        })
    }

    /// Path segments in order.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Reference to an output of another node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    /// Node producing the value.
    pub node: NodeId,
    /// Location of the value in that node's outputs.
    pub path: PropertyPath,
}

/// An input expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Value known at declaration time.
    Value(Value),
    /// Value produced by another node.
    Output(OutputRef),
    /// String built by concatenating the text of each part.
    Interpolate(Vec<Input>),
    /// List of inputs.
    List(Vec<Input>),
    /// Map of inputs.
    Object(BTreeMap<String, Input>),
}

impl Input {
    /// Builds an object input from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a list input.
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Builds a string interpolation.
    pub fn interpolate(parts: impl IntoIterator<Item = Self>) -> Self {
        Self::Interpolate(parts.into_iter().collect())
    }

    /// Every node this input depends on.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<NodeId> {
        let mut deps = BTreeSet::new();
        self.collect_dependencies(&mut deps);
        deps
    }

    fn collect_dependencies(&self, deps: &mut BTreeSet<NodeId>) {
        match self {
            Self::Value(_) => {}
            Self::Output(r) => {
                let _ = deps.insert(r.node);
            }
            Self::Interpolate(parts) | Self::List(parts) => {
                for part in parts {
                    part.collect_dependencies(deps);
                }
            }
            Self::Object(map) => {
                for part in map.values() {
                    part.collect_dependencies(deps);
                }
            }
        }
    }

    /// Returns true if a literal secret appears anywhere in the input.
    #[must_use]
    pub fn has_literal_secret(&self) -> bool {
        match self {
            Self::Value(v) => v.is_secret(),
            Self::Output(_) => false,
            Self::Interpolate(parts) | Self::List(parts) => {
                parts.iter().any(Self::has_literal_secret)
            }
            Self::Object(map) => map.values().any(Self::has_literal_secret),
        }
    }

    /// Resolves the input using `lookup` for output references.
    ///
    /// An interpolation containing any secret part yields a secret.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference does not resolve or an interpolated
    /// part has no textual form.
    pub fn resolve<F>(&self, lookup: &F) -> Result<Value>
    where
        F: Fn(&OutputRef) -> Result<Value>,
    {
        match self {
            Self::Value(v) => Ok(v.clone()),
            Self::Output(r) => lookup(r),
            Self::Interpolate(parts) => {
                let mut text = String::new();
                let mut secret = false;
                for part in parts {
                    let value = part.resolve(lookup)?;
                    let (piece, is_secret) = value.interpolation_text().ok_or_else(|| {
                        CirrusError::graph("only scalar values can be interpolated into a string")
                    })?;
                    text.push_str(&piece);
                    secret |= is_secret;
                }
                Ok(if secret {
                    Value::Secret(Secret::new(text))
                } else {
                    Value::String(text)
                })
            }
            Self::List(items) => items
                .iter()
                .map(|item| item.resolve(lookup))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Self::Object(map) => map
                .iter()
                .map(|(k, v)| v.resolve(lookup).map(|value| (k.clone(), value)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Object),
        }
    }

    /// Renders the input for display without resolving it.
    ///
    /// References appear as `${<node>.<path>}` using `name_of` to name the
    /// node; secrets are redacted.
    pub fn render<F>(&self, name_of: &F) -> serde_json::Value
    where
        F: Fn(NodeId) -> String,
    {
        match self {
            Self::Value(v) => v.redacted(),
            Self::Output(r) => {
                serde_json::Value::String(format!("${{{}.{}}}", name_of(r.node), r.path))
            }
            Self::Interpolate(parts) => {
                let text: String = parts
                    .iter()
                    .map(|p| match p.render(name_of) {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                serde_json::Value::String(text)
            }
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(|i| i.render(name_of)).collect())
            }
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.render(name_of))).collect(),
            ),
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<OutputRef> for Input {
    fn from(value: OutputRef) -> Self {
        Self::Output(value)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Self::Value(value.into())
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Self::Value(value.into())
    }
}

impl From<f64> for Input {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

impl From<u16> for Input {
    fn from(value: u16) -> Self {
        Self::Value(value.into())
    }
}

impl From<Secret> for Input {
    fn from(value: Secret) -> Self {
        Self::Value(value.into())
    }
}
