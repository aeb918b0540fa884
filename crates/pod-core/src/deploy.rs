//! The `deploy` subcommand's entry point: loads `pod.deploy.yml` from the
//! current directory and runs [`pod_deploy::deploy`] against the named
//! target.

use std::path::Path;

use anyhow::{Context, Result};
use pod_deploy::{DeployOptions, deploy, load_manifest};

/// Loads `pod.deploy.yml` from `cwd` and deploys `target_name`, honoring
/// the `--force-install` flag by mapping it straight onto
/// `DeployOptions::force_install`.
pub fn run_deploy(cwd: &Path, target_name: &str, force_install: bool) -> Result<()> {
    let manifest_path = cwd.join("pod.deploy.yml");
    let manifest = load_manifest(&manifest_path)
        .with_context(|| format!("failed to load {}", manifest_path.display()))?;

    tracing::info!(target = target_name, version = %manifest.version, "starting deploy");

    let options = DeployOptions { force_install };
    deploy(&manifest, target_name, cwd, &options)
        .with_context(|| format!("deploy of target `{target_name}` failed"))?;

    tracing::info!(target = target_name, "deploy finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn deploys_a_local_target_from_a_manifest_on_disk() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pod.deploy.yml"),
            r#"
name: blog
version: "1.0.0"
targets:
  prod:
    type: local
    operations:
      - action:
          command: "true"
        name: noop
"#,
        )
        .unwrap();

        run_deploy(dir.path(), "prod", false).unwrap();
        assert!(dir.path().join("pod-lock.json").exists());
    }

    #[test]
    fn unknown_target_name_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pod.deploy.yml"),
            "name: blog\nversion: \"1.0.0\"\ntargets:\n  prod:\n    type: local\n    operations: []\n",
        )
        .unwrap();

        let err = run_deploy(dir.path(), "staging", false).unwrap_err();
        assert!(format!("{err:#}").contains("staging"));
    }
}
