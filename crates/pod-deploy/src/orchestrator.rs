//! Operation dispatch. Iterates a target's operations in declared order;
//! any failure aborts the remainder and leaves whatever was already
//! recorded in the lock file in place — the next run resumes rather than
//! restarts.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use pod_retry::{RetryExecutor, RetryPolicy};
use pod_types::{ActionKind, DeployError, EnsureKind, LockEnsureEntry, Manifest, Operation, Target, Transport, VerifyKind, When};

use crate::lockfile::{apply_version_handshake, lock_path_for, read_lock, write_lock};
use crate::local::LocalStrategy;
use crate::manifest::{build_context, interpolate_target};
use crate::pathutil::resolve_local_path;
use crate::ssh::SshStrategy;
use crate::strategy::Strategy;

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub force_install: bool,
}

/// Runs the named target's full operation list against a manifest already
/// loaded from disk.
pub fn deploy(manifest: &Manifest, target_name: &str, cwd: &Path, options: &DeployOptions) -> anyhow::Result<()> {
    let target = manifest
        .targets
        .get(target_name)
        .ok_or_else(|| anyhow::anyhow!("no target named `{target_name}` in manifest"))?;

    let context = build_context(manifest, target);
    let target = interpolate_target(target, &context);

    let (transport, mut strategy, deploy_root) = open_strategy(&target, cwd)?;
    tracing::info!(target = target_name, transport = ?transport, "opening deploy target");

    let lock_path = lock_path_for(&deploy_root);
    let mut lock = read_lock(strategy.as_mut(), &lock_path);
    apply_version_handshake(strategy.as_mut(), &lock_path, &mut lock, &manifest.version)?;

    for op in &target.operations {
        let name = op.name();
        match op {
            Operation::Ensure { ensure, .. } => {
                dispatch_ensure(strategy.as_mut(), &lock_path, &mut lock, ensure, &name, options, &context)
                    .map_err(|e| e.into_operation(name.clone()))?;
            }
            Operation::Action { action, when, .. } => {
                dispatch_action(strategy.as_mut(), &lock_path, &mut lock, action, *when, &name)
                    .map_err(|e| e.into_operation(name.clone()))?;
            }
            Operation::Verify { verify, .. } => {
                dispatch_verify(strategy.as_mut(), verify, &name)
                    .map_err(|e| e.into_operation(name.clone()))?;
            }
        }
    }

    tracing::info!(target = target_name, "deploy completed");
    Ok(())
}

fn open_strategy(target: &Target, cwd: &Path) -> anyhow::Result<(Transport, Box<dyn Strategy>, std::path::PathBuf)> {
    let is_ssh = target.kind.as_deref() != Some("local") && target.host.is_some();

    if is_ssh {
        let host = target.host.as_deref().context("ssh target must set `host`")?;
        let user = target.user.as_deref().context("ssh target must set `user`")?;
        let key_path_raw = target.key_path.as_deref().context("ssh target must set `keyPath`")?;
        let deploy_path = target.deploy_path.as_deref().context("ssh target must set `deployPath`")?;
        let key_path = resolve_local_path(key_path_raw, cwd);
        let port = target.port.unwrap_or(22);

        let strategy = SshStrategy::connect(host, port, user, &key_path, deploy_path)?;
        Ok((Transport::Ssh, Box::new(strategy), std::path::PathBuf::from(deploy_path)))
    } else {
        if target.kind.as_deref() != Some("local") && target.host.is_none() {
            bail!("target must set `type: local` or provide a `host`");
        }
        Ok((Transport::Local, Box::new(LocalStrategy::new(cwd.to_path_buf())), cwd.to_path_buf()))
    }
}

pub(crate) fn dispatch_ensure(
    strategy: &mut dyn Strategy,
    lock_path: &Path,
    lock: &mut pod_types::LockFile,
    ensure: &EnsureKind,
    name: &str,
    options: &DeployOptions,
    context: &BTreeMap<String, String>,
) -> Result<(), DeployError> {
    let key = ensure.lock_key();
    let config = ensure.config();

    // Deep-equality on `config` is the actual convergence check: a
    // manifest version bump alone must not force a reinstall when an
    // ensure's own config is unchanged. `version` on the lock entry is
    // bookkeeping for which deployment last validated this config,
    // stamped on every successful install — not a second independent
    // trigger alongside config.
    let existing = lock.ensures.get(&key);
    let needs_install = options.force_install
        || existing.is_none()
        || existing.map(|e| e.config != config).unwrap_or(true);

    if !needs_install {
        tracing::debug!(operation = name, ensure = key, "already satisfied");
        return Ok(());
    }

    tracing::info!(operation = name, ensure = key, "installing");
    let script = install_script_for(ensure);
    let output = strategy.run_script(&key, &script, context)?;
    if !output.success() {
        return Err(DeployError::Operation {
            operation: name.to_string(),
            source: anyhow::anyhow!("install script exited {}: {}", output.exit_code, output.stderr),
        });
    }

    lock.ensures.insert(
        key,
        LockEnsureEntry {
            version: lock.deployment_version.clone(),
            config,
        },
    );
    write_lock(strategy, lock_path, lock).map_err(DeployError::Transport)
}

/// Built-in convergence scripts for each ensure kind. These are pod's own
/// infrastructure primitives, not user-authored — the manifest only
/// supplies their parameters.
fn install_script_for(ensure: &EnsureKind) -> String {
    match ensure {
        EnsureKind::Swap { swap } => format!(
            "set -e\nfallocate -l {swap} /swapfile || dd if=/dev/zero of=/swapfile bs=1M count=$(( $(numfmt --from=iec {swap}) / 1048576 ))\nchmod 600 /swapfile\nmkswap /swapfile\nswapon /swapfile\n"
        ),
        EnsureKind::Docker { docker } => format!(
            "set -e\ncurl -fsSL https://get.docker.com | sh -s -- --version {docker}\nsystemctl enable --now docker\n"
        ),
        EnsureKind::Directory { directory, owner } => format!(
            "set -e\nmkdir -p {directory}\nchown {owner} {directory}\n"
        ),
    }
}

pub(crate) fn dispatch_action(
    strategy: &mut dyn Strategy,
    lock_path: &Path,
    lock: &mut pod_types::LockFile,
    action: &ActionKind,
    when: When,
    name: &str,
) -> Result<(), DeployError> {
    if when == When::Never {
        tracing::debug!(operation = name, "skipped (when: never)");
        return Ok(());
    }

    let once_id = pod_types::LockFile::once_action_id(name);
    if when == When::Once && lock.once_actions.contains(&once_id) {
        tracing::debug!(operation = name, "skipped (already ran once)");
        return Ok(());
    }

    match action {
        ActionKind::Sync { sync } => {
            strategy.sync_directory(Path::new(&sync.source), Path::new(&sync.destination), &sync.exclude)?;
        }
        ActionKind::Command { command } => {
            let output = strategy.run(command)?;
            if !output.success() {
                return Err(DeployError::Operation {
                    operation: name.to_string(),
                    source: anyhow::anyhow!("command exited {}: {}", output.exit_code, output.stderr),
                });
            }
        }
    }

    if when == When::Once {
        lock.once_actions.push(once_id);
        write_lock(strategy, lock_path, lock).map_err(DeployError::Transport)?;
    }

    Ok(())
}

pub(crate) fn dispatch_verify(strategy: &mut dyn Strategy, verify: &VerifyKind, name: &str) -> Result<(), DeployError> {
    let executor = RetryExecutor::from_policy(RetryPolicy::Default);

    let result = executor.run(|_attempt| -> Result<(), String> {
        match verify {
            VerifyKind::Http { http, timeout_secs } => {
                let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
                let client = reqwest::blocking::Client::builder()
                    .timeout(timeout)
                    .build()
                    .map_err(|e| e.to_string())?;
                let response = client.get(http).send().map_err(|e| e.to_string())?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(format!("GET {http} returned {}", response.status()))
                }
            }
            VerifyKind::Command { command } => {
                let output = strategy.run(command).map_err(|e| e.to_string())?;
                if output.success() {
                    Ok(())
                } else {
                    Err(format!("command exited {}: {}", output.exit_code, output.stderr))
                }
            }
        }
    });

    result.map_err(|_| DeployError::VerificationFailed {
        operation: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_types::{LockFile, Target};
    use std::collections::BTreeMap as Map;

    fn local_target() -> Target {
        Target {
            kind: Some("local".to_string()),
            host: None,
            user: None,
            key_path: None,
            port: None,
            deploy_path: None,
            operations: vec![],
            extra: Map::new(),
        }
    }

    #[test]
    fn local_transport_is_selected_when_type_is_local() {
        let dir = tempfile::tempdir().unwrap();
        let target = local_target();
        let (transport, _strategy, root) = open_strategy(&target, dir.path()).unwrap();
        assert_eq!(transport, Transport::Local);
        assert_eq!(root, dir.path());
    }

    #[test]
    fn ssh_transport_is_selected_when_host_is_present_without_explicit_type() {
        let mut target = local_target();
        target.kind = None;
        target.host = Some("example.com".to_string());
        // Connection itself will fail in a unit test (no real host); we
        // only assert the transport decision, so check the branch logic
        // directly rather than actually dialing out.
        let is_ssh = target.kind.as_deref() != Some("local") && target.host.is_some();
        assert!(is_ssh);
    }

    #[test]
    fn local_target_without_type_or_host_is_rejected() {
        let mut target = local_target();
        target.kind = None;
        let dir = tempfile::tempdir().unwrap();
        let err = open_strategy(&target, dir.path()).unwrap_err();
        assert!(err.to_string().contains("type: local"));
    }

    #[test]
    fn ensure_skips_reinstall_when_config_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut strategy = LocalStrategy::new(dir.path().to_path_buf());
        let lock_path = lock_path_for(dir.path());
        let mut lock = LockFile::default();
        lock.ensures.insert(
            "swap".to_string(),
            LockEnsureEntry {
                version: "1.0.0".to_string(),
                config: serde_json::json!({ "swap": "2G" }),
            },
        );

        let ensure = EnsureKind::Swap { swap: "2G".to_string() };
        let options = DeployOptions::default();
        dispatch_ensure(&mut strategy, &lock_path, &mut lock, &ensure, "swap", &options, &Map::new()).unwrap();

        // Nothing should have changed: no lock file write happened since
        // we returned before reaching write_lock.
        assert_eq!(lock.ensures["swap"].config, serde_json::json!({ "swap": "2G" }));
    }

    #[test]
    fn action_once_records_id_and_skips_on_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut strategy = LocalStrategy::new(dir.path().to_path_buf());
        let lock_path = lock_path_for(dir.path());
        let mut lock = LockFile::default();

        let action = ActionKind::Command {
            command: "true".to_string(),
        };
        dispatch_action(&mut strategy, &lock_path, &mut lock, &action, When::Once, "seed_db").unwrap();
        assert_eq!(lock.once_actions, vec!["action_seed_db".to_string()]);

        let counter_before = lock.once_actions.len();
        dispatch_action(&mut strategy, &lock_path, &mut lock, &action, When::Once, "seed_db").unwrap();
        assert_eq!(lock.once_actions.len(), counter_before);
    }
}
