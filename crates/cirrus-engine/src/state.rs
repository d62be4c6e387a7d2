//! Persistent deployment record.
//!
//! Written after a successful run so exported outputs can be read back
//! without redeploying. Secrets are redacted before anything touches disk.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use cirrus_common::error::{CirrusError, Result};
use cirrus_common::types::{DeploymentId, Urn};
use cirrus_graph::NodeKind;
use serde::{Deserialize, Serialize};

use crate::engine::Deployment;

/// Persistent record of one materialised node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    /// URN of the declaration.
    pub urn: Urn,
    /// Provider type or function token.
    #[serde(rename = "type")]
    pub type_token: String,
    /// `resource` or `invoke`.
    pub kind: String,
    /// Provider-assigned ID, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Outputs with secrets redacted.
    pub outputs: serde_json::Value,
}

/// Persistent record of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    /// ID of the run that produced this state.
    pub deployment: DeploymentId,
    /// Project name.
    pub project: String,
    /// Stack name.
    pub stack: String,
    /// When the run finished.
    pub updated_at: DateTime<Utc>,
    /// Materialised nodes in evaluation order.
    pub resources: Vec<StateEntry>,
    /// Exported outputs with secrets redacted.
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl StateFile {
    /// Builds the redacted record of a deployment.
    #[must_use]
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let resources = deployment
            .nodes
            .iter()
            .map(|node| StateEntry {
                urn: node.urn.clone(),
                type_token: node.type_token.clone(),
                kind: match node.kind {
                    NodeKind::Resource => "resource".into(),
                    NodeKind::Invoke => "invoke".into(),
                },
                id: node.id.clone(),
                outputs: serde_json::Value::Object(
                    node.outputs
                        .iter()
                        .map(|(k, v)| (k.clone(), v.redacted()))
                        .collect(),
                ),
            })
            .collect();
        Self {
            deployment: deployment.id.clone(),
            project: deployment.project.clone(),
            stack: deployment.stack.clone(),
            updated_at: deployment.finished_at,
            resources,
            outputs: deployment
                .exports
                .iter()
                .map(|(k, v)| (k.clone(), v.redacted()))
                .collect(),
        }
    }
}

/// Loads the state file, returning `None` if it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_state(path: &Path) -> Result<Option<StateFile>> {
    tracing::debug!(path = %path.display(), "loading state file");
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| CirrusError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Persists the state file atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_state(path: &Path, state: &StateFile) -> Result<()> {
    tracing::debug!(path = %path.display(), "saving state file");
    let io_err = |source: std::io::Error| CirrusError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use cirrus_common::secret::Secret;
    use cirrus_common::value::Value;

    use super::*;
    use crate::engine::NodeState;

    fn deployment() -> Deployment {
        Deployment {
            id: DeploymentId::new("d-1"),
            project: "weather".into(),
            stack: "dev".into(),
            nodes: vec![NodeState {
                urn: Urn::new("dev", "weather", "azure-native:redis:listRedisKeys", "keys"),
                type_token: "azure-native:redis:listRedisKeys".into(),
                kind: NodeKind::Invoke,
                id: None,
                outputs: BTreeMap::from([(
                    "primaryKey".to_owned(),
                    Value::from(Secret::new("hunter2")),
                )]),
            }],
            exports: BTreeMap::from([
                ("ip".to_owned(), Value::from("20.1.2.3")),
                ("redis".to_owned(), Value::from(Secret::new("rediss://:hunter2@h:6380"))),
            ]),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn state_never_contains_secrets() {
        let state = StateFile::from_deployment(&deployment());
        let json = serde_json::to_string(&state).expect("serialize");
        assert!(!json.contains("hunter2"), "secret leaked: {json}");
        assert_eq!(state.outputs["redis"], serde_json::json!("[secret]"));
        assert_eq!(state.outputs["ip"], serde_json::json!("20.1.2.3"));
        assert_eq!(state.resources[0].kind, "invoke");
    }

    #[test]
    fn save_then_load_returns_same_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");
        let state = StateFile::from_deployment(&deployment());
        save_state(&path, &state).expect("save");
        let loaded = load_state(&path).expect("load").expect("present");
        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_state_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_state(&dir.path().join("state.json")).expect("load").is_none());
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(load_state(&path).is_err());
    }
}
