//! Timeout policy applied by the evaluator.
//!
//! Resolution order for a resource operation: the node's own
//! `custom_timeouts`, then an override for its type token, then the default.

use std::collections::HashMap;
use std::time::Duration;

use cirrus_common::error::{CirrusError, Result};
use cirrus_common::types::Operation;
use cirrus_graph::{CustomTimeouts, Declaration};

/// Default timeout of resource operations.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default timeout of provider function calls.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Per-operation timeouts with type and node overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutPolicy {
    default: Duration,
    invoke: Duration,
    by_type: HashMap<String, CustomTimeouts>,
}

impl TimeoutPolicy {
    /// Policy using `default` for every resource operation.
    #[must_use]
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            invoke: DEFAULT_INVOKE_TIMEOUT,
            by_type: HashMap::new(),
        }
    }

    /// Sets the timeout of provider function calls.
    #[must_use]
    pub const fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke = timeout;
        self
    }

    /// Overrides the timeouts of every resource of a type.
    #[must_use]
    pub fn with_type_override(
        mut self,
        type_token: impl Into<String>,
        timeouts: CustomTimeouts,
    ) -> Self {
        let _ = self.by_type.insert(type_token.into(), timeouts);
        self
    }

    /// Effective timeout of `operation` on the declared node.
    #[must_use]
    pub fn timeout_for(&self, declaration: &Declaration, operation: Operation) -> Duration {
        declaration
            .options
            .custom_timeouts
            .and_then(|t| t.get(operation))
            .or_else(|| {
                self.by_type
                    .get(&declaration.type_token)
                    .and_then(|t| t.get(operation))
            })
            .unwrap_or(self.default)
    }

    /// Timeout of provider function calls.
    #[must_use]
    pub const fn invoke_timeout(&self) -> Duration {
        self.invoke
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATION_TIMEOUT)
    }
}

/// Parses durations such as `30m`, `90s`, `1h30m` or `250ms`.
///
/// # Errors
///
/// Returns an error for empty input, unknown units, a number without a
/// unit, or a value too large to represent.
pub fn parse_duration(text: &str) -> Result<Duration> {
    humantime::parse_duration(text.trim()).map_err(|e| CirrusError::Config {
        message: format!("invalid duration '{text}': {e} (expected e.g. 30m, 90s, 1h30m)"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use cirrus_common::types::Urn;
    use cirrus_graph::{NodeId, NodeKind, ResourceOptions};

    use super::*;

    fn decl(type_token: &str, custom: Option<CustomTimeouts>) -> Declaration {
        Declaration {
            id: NodeId::new(0),
            kind: NodeKind::Resource,
            type_token: type_token.into(),
            name: "n".into(),
            urn: Urn::new("dev", "p", type_token, "n"),
            inputs: BTreeMap::new(),
            options: ResourceOptions {
                custom_timeouts: custom,
                ..ResourceOptions::default()
            },
        }
    }

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("30m").expect("30m"), Duration::from_secs(1800));
        assert_eq!(parse_duration("90s").expect("90s"), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").expect("1h"), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").expect("ms"), Duration::from_millis(250));
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_duration("1h30m").expect("1h30m"), Duration::from_secs(5400));
    }

    #[test]
    fn rejects_malformed_durations() {
        for bad in ["", "30", "m", "5x", "1h30", "x5m"] {
            assert!(parse_duration(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn oversized_durations_are_errors() {
        for huge in ["307445734561825861m", "18446744073709551615s1s", "99999999999999999999h"] {
            let err = parse_duration(huge).unwrap_err();
            assert!(matches!(err, CirrusError::Config { .. }), "{huge}: {err}");
        }
    }

    #[test]
    fn default_applies_without_overrides() {
        let policy = TimeoutPolicy::default();
        assert_eq!(
            policy.timeout_for(&decl("a:b:C", None), Operation::Create),
            DEFAULT_OPERATION_TIMEOUT
        );
        assert_eq!(policy.invoke_timeout(), DEFAULT_INVOKE_TIMEOUT);
    }

    #[test]
    fn type_override_applies_to_matching_type_only() {
        let policy = TimeoutPolicy::default().with_type_override(
            "azure-native:redis:Redis",
            CustomTimeouts::uniform(Duration::from_secs(1800)),
        );
        assert_eq!(
            policy.timeout_for(&decl("azure-native:redis:Redis", None), Operation::Delete),
            Duration::from_secs(1800)
        );
        assert_eq!(
            policy.timeout_for(
                &decl("azure-native:resources:ResourceGroup", None),
                Operation::Create,
            ),
            DEFAULT_OPERATION_TIMEOUT
        );
    }

    #[test]
    fn node_override_beats_type_override() {
        let policy = TimeoutPolicy::default()
            .with_type_override("a:b:C", CustomTimeouts::uniform(Duration::from_secs(60)));
        let node = CustomTimeouts {
            create: Some(Duration::from_secs(5)),
            ..CustomTimeouts::default()
        };
        let d = decl("a:b:C", Some(node));
        assert_eq!(policy.timeout_for(&d, Operation::Create), Duration::from_secs(5));
        assert_eq!(policy.timeout_for(&d, Operation::Update), Duration::from_secs(60));
    }
}
