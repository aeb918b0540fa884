//! The idempotent deploy orchestrator: manifest loading and `${key}`
//! interpolation, a `Strategy` abstraction over `local`/`ssh` transports,
//! and lock-file-backed convergence so a repeated `deploy` invocation
//! only ever does the work that's still outstanding.

mod exclude;
mod interpolate;
mod local;
mod lockfile;
mod manifest;
mod orchestrator;
mod pathutil;
mod ssh;
mod strategy;

pub use exclude::is_excluded;
pub use interpolate::interpolate;
pub use local::LocalStrategy;
pub use lockfile::{apply_version_handshake, lock_path_for, read_lock, write_lock};
pub use manifest::{build_context, load_manifest};
pub use orchestrator::{DeployOptions, deploy};
pub use pod_types::{DeployError, LockFile, Manifest, Target, Transport};
pub use ssh::SshStrategy;
pub use strategy::{CommandOutput, Strategy};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::interpolate_target;
    use crate::orchestrator::{DeployOptions, dispatch_action, dispatch_ensure};
    use pod_types::Operation;
    use std::collections::{BTreeMap, HashMap};
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// A strategy mock that counts how many times each named script
    /// actually runs, wrapping a real [`LocalStrategy`] so lock-file and
    /// filesystem effects are genuine.
    struct CountingStrategy {
        inner: LocalStrategy,
        run_script_calls: Mutex<HashMap<String, u32>>,
    }

    impl CountingStrategy {
        fn new(cwd: std::path::PathBuf) -> Self {
            Self {
                inner: LocalStrategy::new(cwd),
                run_script_calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls_for(&self, name: &str) -> u32 {
            *self.run_script_calls.lock().unwrap().get(name).unwrap_or(&0)
        }
    }

    impl Strategy for CountingStrategy {
        fn run(&mut self, command: &str) -> Result<CommandOutput, DeployError> {
            self.inner.run(command)
        }

        fn run_script(
            &mut self,
            name: &str,
            content: &str,
            context: &BTreeMap<String, String>,
        ) -> Result<CommandOutput, DeployError> {
            *self.run_script_calls.lock().unwrap().entry(name.to_string()).or_insert(0) += 1;
            self.inner.run_script(name, content, context)
        }

        fn upload_content(&mut self, path: &Path, bytes: &[u8]) -> Result<(), DeployError> {
            self.inner.upload_content(path, bytes)
        }

        fn read_json(&mut self, path: &Path) -> Option<serde_json::Value> {
            self.inner.read_json(path)
        }

        fn sync_directory(&mut self, source: &Path, destination: &Path, exclude: &[String]) -> Result<(), DeployError> {
            self.inner.sync_directory(source, destination, exclude)
        }
    }

    fn swap_manifest(version: &str) -> Manifest {
        let yaml = format!(
            r#"
name: blog
version: {version}
targets:
  prod:
    type: local
    operations:
      - ensure:
          swap: 2G
      - action:
          command: "true"
        when: once
        name: seed_db
"#
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    /// Drives one full pass over a target's operations against an already
    /// version-handshaken lock, the same sequence `orchestrator::deploy`
    /// runs per target.
    fn run_once(strategy: &mut dyn Strategy, lock_path: &Path, lock: &mut LockFile, target: &Target, options: &DeployOptions) {
        for op in &target.operations {
            let name = op.name();
            match op {
                Operation::Ensure { ensure, .. } => {
                    dispatch_ensure(strategy, lock_path, lock, ensure, &name, options, &BTreeMap::new()).unwrap();
                }
                Operation::Action { action, when, .. } => {
                    dispatch_action(strategy, lock_path, lock, action, *when, &name).unwrap();
                }
                Operation::Verify { .. } => unreachable!("fixture has no verify operations"),
            }
        }
    }

    #[test]
    fn idempotent_deploy_runs_install_and_once_action_exactly_once() {
        let dir = tempdir().unwrap();
        let manifest = swap_manifest("1.0.0");
        let raw_target = &manifest.targets["prod"];
        let context = build_context(&manifest, raw_target);
        let target = interpolate_target(raw_target, &context);

        let mut strategy = CountingStrategy::new(dir.path().to_path_buf());
        let lock_path = lock_path_for(dir.path());
        let options = DeployOptions::default();

        for _ in 0..2 {
            let mut lock = read_lock(&mut strategy, &lock_path);
            apply_version_handshake(&mut strategy, &lock_path, &mut lock, &manifest.version).unwrap();
            run_once(&mut strategy, &lock_path, &mut lock, &target, &options);
        }

        assert_eq!(strategy.calls_for("swap"), 1);
        let final_lock = read_lock(&mut strategy, &lock_path);
        assert!(final_lock.ensures.contains_key("swap"));
        assert_eq!(final_lock.once_actions, vec!["action_seed_db".to_string()]);
    }

    #[test]
    fn version_bump_reruns_new_once_action_but_not_the_unchanged_ensure() {
        let dir = tempdir().unwrap();
        let lock_path = lock_path_for(dir.path());
        let options = DeployOptions::default();

        let mut strategy = LocalStrategy::new(dir.path().to_path_buf());
        let mut seeded = LockFile {
            deployment_version: "1.0.0".to_string(),
            ..LockFile::default()
        };
        seeded.ensures.insert(
            "swap".to_string(),
            pod_types::LockEnsureEntry {
                version: "1.0.0".to_string(),
                config: serde_json::json!({ "swap": "2G" }),
            },
        );
        seeded.once_actions.push("action_seed_db".to_string());
        write_lock(&mut strategy, &lock_path, &seeded).unwrap();

        let manifest = swap_manifest("1.1.0");
        let raw_target = &manifest.targets["prod"];
        let mut target = interpolate_target(raw_target, &build_context(&manifest, raw_target));
        target.operations.push(Operation::Action {
            action: pod_types::ActionKind::Command { command: "true".to_string() },
            when: pod_types::When::Once,
            name: "migrate_v2".to_string(),
        });

        let mut lock = read_lock(&mut strategy, &lock_path);
        apply_version_handshake(&mut strategy, &lock_path, &mut lock, &manifest.version).unwrap();
        run_once(&mut strategy, &lock_path, &mut lock, &target, &options);

        let final_lock = read_lock(&mut strategy, &lock_path);
        assert_eq!(final_lock.deployment_version, "1.1.0");
        assert!(!final_lock.once_actions.contains(&"action_seed_db".to_string()));
        assert!(final_lock.once_actions.contains(&"action_migrate_v2".to_string()));
        // The ensure's config is unchanged, so it must not be reinstalled —
        // its recorded version tracks the deployment version it last
        // successfully converged against, not last run's version.
        assert_eq!(final_lock.ensures["swap"].config, serde_json::json!({ "swap": "2G" }));
    }
}
