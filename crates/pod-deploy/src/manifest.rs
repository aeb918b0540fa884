//! Manifest loading and `${key}` interpolation against the merged
//! manifest ∪ target context.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, bail};
use pod_types::{ActionKind, EnsureKind, Manifest, Operation, SyncSpec, Target, VerifyKind};

/// Parses `pod.deploy.yml` at `path`.
pub fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: Manifest = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse manifest {}", path.display()))?;

    if manifest.name.is_empty() || manifest.version.is_empty() {
        bail!("manifest must set both `name` and `version`");
    }
    if manifest.targets.is_empty() {
        bail!("manifest must declare at least one target");
    }
    for (target_name, target) in &manifest.targets {
        if target.kind.as_deref() != Some("local") && target.host.is_none() {
            bail!(
                "target `{target_name}` must set `type: local` or provide a `host`"
            );
        }
        reject_duplicate_action_names(target_name, target)?;
    }
    Ok(manifest)
}

/// The `once_actions` identifier format is `action_<operation-name>`; if
/// two actions share a name, two distinct `once` actions would silently
/// collide on one lock-file entry. This rejects that collision up front,
/// at manifest load time.
fn reject_duplicate_action_names(target_name: &str, target: &Target) -> anyhow::Result<()> {
    let mut seen = BTreeSet::new();
    for op in &target.operations {
        if let Operation::Action { name, .. } = op {
            if !seen.insert(name.clone()) {
                bail!(
                    "target `{target_name}` declares the action `{name}` more than once; \
                     action names must be unique within a target"
                );
            }
        }
    }
    Ok(())
}

/// Builds the `${key}` lookup context for one target: manifest-level
/// `name`/`version` first, then the target's own extra keys (a target key
/// that collides with `name`/`version` wins, since it's the more specific
/// scope).
pub fn build_context(manifest: &Manifest, target: &Target) -> BTreeMap<String, String> {
    let mut ctx = BTreeMap::new();
    ctx.insert("name".to_string(), manifest.name.clone());
    ctx.insert("version".to_string(), manifest.version.clone());
    for (key, value) in &target.extra {
        ctx.insert(key.clone(), display_json(value));
    }
    ctx
}

fn display_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns a copy of `target` with every manifest-interpolatable string
/// field expanded against `context`. `keyPath` is deliberately left
/// un-interpolated here — it's resolved to a local filesystem path by
/// [`crate::pathutil::resolve_local_path`] instead, after interpolation of
/// the raw string (there's no conflict: interpolate first, then resolve).
pub fn interpolate_target(target: &Target, context: &BTreeMap<String, String>) -> Target {
    use crate::interpolate::interpolate;

    Target {
        kind: target.kind.clone(),
        host: target.host.as_deref().map(|s| interpolate(s, context)),
        user: target.user.as_deref().map(|s| interpolate(s, context)),
        key_path: target.key_path.as_deref().map(|s| interpolate(s, context)),
        port: target.port,
        deploy_path: target.deploy_path.as_deref().map(|s| interpolate(s, context)),
        operations: target
            .operations
            .iter()
            .map(|op| interpolate_operation(op, context))
            .collect(),
        extra: target.extra.clone(),
    }
}

fn interpolate_operation(op: &Operation, context: &BTreeMap<String, String>) -> Operation {
    match op {
        Operation::Ensure { ensure, name } => Operation::Ensure {
            ensure: interpolate_ensure(ensure, context),
            name: name.clone(),
        },
        Operation::Action { action, when, name } => Operation::Action {
            action: interpolate_action(action, context),
            when: *when,
            name: name.clone(),
        },
        Operation::Verify { verify, name } => Operation::Verify {
            verify: interpolate_verify(verify, context),
            name: name.clone(),
        },
    }
}

fn interpolate_ensure(ensure: &EnsureKind, context: &BTreeMap<String, String>) -> EnsureKind {
    use crate::interpolate::interpolate;

    match ensure {
        EnsureKind::Swap { swap } => EnsureKind::Swap {
            swap: interpolate(swap, context),
        },
        EnsureKind::Docker { docker } => EnsureKind::Docker {
            docker: interpolate(docker, context),
        },
        EnsureKind::Directory { directory, owner } => EnsureKind::Directory {
            directory: interpolate(directory, context),
            owner: interpolate(owner, context),
        },
    }
}

fn interpolate_action(action: &ActionKind, context: &BTreeMap<String, String>) -> ActionKind {
    use crate::interpolate::interpolate;

    match action {
        ActionKind::Sync { sync } => ActionKind::Sync {
            sync: SyncSpec {
                source: interpolate(&sync.source, context),
                destination: interpolate(&sync.destination, context),
                exclude: sync.exclude.iter().map(|e| interpolate(e, context)).collect(),
            },
        },
        ActionKind::Command { command } => ActionKind::Command {
            command: interpolate(command, context),
        },
    }
}

fn interpolate_verify(verify: &VerifyKind, context: &BTreeMap<String, String>) -> VerifyKind {
    use crate::interpolate::interpolate;

    match verify {
        VerifyKind::Http { http, timeout_secs } => VerifyKind::Http {
            http: interpolate(http, context),
            timeout_secs: *timeout_secs,
        },
        VerifyKind::Command { command } => VerifyKind::Command {
            command: interpolate(command, context),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_types::When;

    fn sample_manifest() -> Manifest {
        let yaml = r#"
name: blog
version: 1.2.0
targets:
  prod:
    host: "${host}"
    user: deploy
    keyPath: ~/.ssh/id_ed25519
    deployPath: /srv/${name}
    host_ip: 10.0.0.5
    operations:
      - action:
          command: "echo ${version}"
        when: always
        name: announce
"#;
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn rejects_duplicate_action_names_within_a_target() {
        let yaml = r#"
name: blog
version: "1.0.0"
targets:
  prod:
    type: local
    operations:
      - action:
          command: "echo one"
        name: deploy_step
      - action:
          command: "echo two"
        name: deploy_step
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).unwrap();
        let target = manifest.targets["prod"].clone();
        let err = reject_duplicate_action_names("prod", &target).unwrap_err();
        assert!(format!("{err}").contains("deploy_step"));
    }

    #[test]
    fn target_without_local_type_or_host_is_rejected_at_load() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "name: blog\nversion: \"1.0.0\"\ntargets:\n  prod:\n    operations: []\n"
        )
        .unwrap();

        let err = load_manifest(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("must set `type: local`"));
    }

    #[test]
    fn interpolates_deploy_path_with_manifest_name() {
        let manifest = sample_manifest();
        let target = &manifest.targets["prod"];
        let mut ctx = build_context(&manifest, target);
        ctx.insert("host".to_string(), "ignored".to_string());
        let interpolated = interpolate_target(target, &ctx);
        assert_eq!(interpolated.deploy_path.as_deref(), Some("/srv/blog"));
    }

    #[test]
    fn interpolates_action_command_with_target_extra_key() {
        let manifest = sample_manifest();
        let target = &manifest.targets["prod"];
        let context = build_context(&manifest, target);
        let interpolated = interpolate_target(target, &context);
        match &interpolated.operations[0] {
            Operation::Action { action: ActionKind::Command { command }, when, .. } => {
                assert_eq!(command, "echo 1.2.0");
                assert_eq!(*when, When::Always);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }
}
