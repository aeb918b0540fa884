//! Lock-file persistence. The lock file lives wherever the target lives —
//! a local target's `<cwd>/pod-lock.json`, an ssh target's
//! `<deployPath>/pod-lock.json` on the remote host — so every read and
//! write goes through the [`crate::strategy::Strategy`] the same way any
//! other target effect does.

use std::path::{Path, PathBuf};

use anyhow::Context;
use pod_types::{DeployError, LockFile};

use crate::strategy::Strategy;

pub fn lock_path_for(deploy_cwd: &Path) -> PathBuf {
    deploy_cwd.join(LockFile::FILE_NAME)
}

/// Reads the lock file, tolerating both a missing file and an unparseable
/// one — both are treated as an empty lock.
pub fn read_lock(strategy: &mut dyn Strategy, path: &Path) -> LockFile {
    strategy
        .read_json(path)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Rewrites the lock file in full; it is never patched in place.
pub fn write_lock(strategy: &mut dyn Strategy, path: &Path, lock: &LockFile) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(lock).context("failed to serialize lock file")?;
    strategy
        .upload_content(path, &bytes)
        .map_err(anyhow::Error::from)
        .with_context(|| format!("failed to persist lock file at {}", path.display()))
}

/// Applies the version handshake: if the lock's recorded version differs
/// from the manifest's, clear `once_actions` and persist the version bump
/// immediately. `ensures` are left untouched — they reconverge on their own
/// version/config check during operation dispatch.
pub fn apply_version_handshake(
    strategy: &mut dyn Strategy,
    path: &Path,
    lock: &mut LockFile,
    manifest_version: &str,
) -> anyhow::Result<()> {
    if lock.deployment_version != manifest_version {
        lock.once_actions.clear();
        lock.deployment_version = manifest_version.to_string();
        write_lock(strategy, path, lock)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStrategy;
    use pod_types::LockEnsureEntry;
    use tempfile::tempdir;

    #[test]
    fn read_lock_is_empty_when_file_is_missing() {
        let dir = tempdir().unwrap();
        let mut strategy = LocalStrategy::new(dir.path().to_path_buf());
        let lock = read_lock(&mut strategy, &lock_path_for(dir.path()));
        assert_eq!(lock.deployment_version, "");
        assert!(lock.ensures.is_empty());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut strategy = LocalStrategy::new(dir.path().to_path_buf());
        let path = lock_path_for(dir.path());

        let mut lock = LockFile::default();
        lock.deployment_version = "1.0.0".to_string();
        lock.ensures.insert(
            "swap".to_string(),
            LockEnsureEntry {
                version: "1.0.0".to_string(),
                config: serde_json::json!({ "swap": "2G" }),
            },
        );
        write_lock(&mut strategy, &path, &lock).unwrap();

        let reloaded = read_lock(&mut strategy, &path);
        assert_eq!(reloaded.deployment_version, "1.0.0");
        assert_eq!(reloaded.ensures["swap"].config, serde_json::json!({ "swap": "2G" }));
    }

    #[test]
    fn version_bump_clears_once_actions_but_keeps_ensures() {
        let dir = tempdir().unwrap();
        let mut strategy = LocalStrategy::new(dir.path().to_path_buf());
        let path = lock_path_for(dir.path());

        let mut lock = LockFile::default();
        lock.deployment_version = "1.0.0".to_string();
        lock.once_actions.push("action_seed_db".to_string());
        lock.ensures.insert(
            "swap".to_string(),
            LockEnsureEntry {
                version: "1.0.0".to_string(),
                config: serde_json::json!({ "swap": "2G" }),
            },
        );

        apply_version_handshake(&mut strategy, &path, &mut lock, "1.1.0").unwrap();

        assert_eq!(lock.deployment_version, "1.1.0");
        assert!(lock.once_actions.is_empty());
        assert!(lock.ensures.contains_key("swap"));

        let persisted = read_lock(&mut strategy, &path);
        assert_eq!(persisted.deployment_version, "1.1.0");
        assert!(persisted.once_actions.is_empty());
    }
}
