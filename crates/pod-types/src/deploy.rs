//! The deploy manifest, its operation variants, and the lock file shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A parsed `pod.deploy.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub targets: BTreeMap<String, Target>,
}

/// One named target entry. `kind`/`host` together select the transport
/// strategy; any other top-level key lands in
/// `extra` and is available to `${key}` interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(rename = "keyPath", default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(rename = "deployPath", default)]
    pub deploy_path: Option<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The transport a target resolves to. Not part of the manifest's own
/// shape — computed by `pod-deploy`'s strategy selection from `Target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Ssh,
    Local,
}

/// The `when` discipline governing whether an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum When {
    #[default]
    Always,
    Once,
    Never,
}

/// One manifest operation. Untagged: the presence of `ensure`/`action`/
/// `verify` as the discriminating key mirrors how the manifest actually
/// reads (each list entry is a small map naming exactly one of the three).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operation {
    Ensure {
        ensure: EnsureKind,
        #[serde(default)]
        name: Option<String>,
    },
    Action {
        action: ActionKind,
        #[serde(default)]
        when: When,
        name: String,
    },
    Verify {
        verify: VerifyKind,
        name: String,
    },
}

impl Operation {
    /// A stable display name for diagnostics and for the `once_actions`
    /// identifier (`action_<operation-name>`).
    pub fn name(&self) -> String {
        match self {
            Operation::Ensure { name, ensure } => {
                name.clone().unwrap_or_else(|| ensure.lock_key())
            }
            Operation::Action { name, .. } => name.clone(),
            Operation::Verify { name, .. } => name.clone(),
        }
    }
}

/// A resource the target must have.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnsureKind {
    Swap { swap: String },
    Docker { docker: String },
    Directory { directory: String, owner: String },
}

impl EnsureKind {
    /// The deterministic per-kind lock key: `swap`, `docker`, or
    /// `directory_<path>`.
    pub fn lock_key(&self) -> String {
        match self {
            EnsureKind::Swap { .. } => "swap".to_string(),
            EnsureKind::Docker { .. } => "docker".to_string(),
            EnsureKind::Directory { directory, .. } => format!("directory_{directory}"),
        }
    }

    /// The config value compared against the lock entry by deep equality.
    pub fn config(&self) -> serde_json::Value {
        match self {
            EnsureKind::Swap { swap } => serde_json::json!({ "swap": swap }),
            EnsureKind::Docker { docker } => serde_json::json!({ "docker": docker }),
            EnsureKind::Directory { directory, owner } => {
                serde_json::json!({ "directory": directory, "owner": owner })
            }
        }
    }
}

/// An imperative deploy step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionKind {
    Sync {
        sync: SyncSpec,
    },
    Command {
        command: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSpec {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A post-condition check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerifyKind {
    Http {
        http: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    Command {
        command: String,
    },
}

/// The persisted per-target state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LockFile {
    #[serde(default)]
    pub deployment_version: String,
    #[serde(default)]
    pub ensures: BTreeMap<String, LockEnsureEntry>,
    #[serde(default)]
    pub once_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEnsureEntry {
    pub version: String,
    pub config: serde_json::Value,
}

impl LockFile {
    pub const FILE_NAME: &'static str = "pod-lock.json";

    /// The `once_actions` identifier for an action operation: format is
    /// `action_<operation-name>`; duplicates are rejected at manifest load
    /// time rather than detected here.
    pub fn once_action_id(operation_name: &str) -> String {
        format!("action_{operation_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_lock_keys_use_expected_format() {
        assert_eq!(
            EnsureKind::Swap {
                swap: "2G".into()
            }
            .lock_key(),
            "swap"
        );
        assert_eq!(
            EnsureKind::Directory {
                directory: "/srv/app".into(),
                owner: "deploy".into()
            }
            .lock_key(),
            "directory_/srv/app"
        );
    }

    #[test]
    fn once_action_id_format() {
        assert_eq!(LockFile::once_action_id("restart_app"), "action_restart_app");
    }

    #[test]
    fn operation_untagged_deserializes_from_yaml_shape() {
        let yaml = r#"
- ensure:
    swap: 2G
- action:
    command: "systemctl restart app"
  when: once
  name: restart_app
- verify:
    http: "http://localhost:3000/health"
  name: health_check
"#;
        let ops: Vec<Operation> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], Operation::Ensure { .. }));
        assert!(matches!(ops[1], Operation::Action { when: When::Once, .. }));
        assert!(matches!(ops[2], Operation::Verify { .. }));
    }
}
