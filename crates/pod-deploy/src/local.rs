//! The `local` transport strategy: the current machine's shell, rooted at
//! the target's initial working directory.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use pod_types::DeployError;

use crate::exclude::is_excluded;
use crate::interpolate::interpolate;
use crate::strategy::{CommandOutput, Strategy, as_cd_command};

pub struct LocalStrategy {
    cwd: PathBuf,
}

impl LocalStrategy {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }

    fn run_in_cwd(&self, command: &str) -> Result<CommandOutput, DeployError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DeployError::Transport(anyhow::Error::new(e).context(format!(
                "failed to spawn `{command}` in {}",
                self.cwd.display()
            ))))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

impl Strategy for LocalStrategy {
    fn run(&mut self, command: &str) -> Result<CommandOutput, DeployError> {
        if let Some(target) = as_cd_command(command) {
            let next = crate::pathutil::resolve_local_path(target, &self.cwd);
            self.cwd = next;
            return Ok(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        self.run_in_cwd(command)
    }

    fn run_script(
        &mut self,
        name: &str,
        content: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, DeployError> {
        let interpolated = interpolate(content, context);
        let script_path = std::env::temp_dir().join(format!("pod-deploy-{name}-{}", std::process::id()));

        let write_result = (|| -> anyhow::Result<()> {
            let mut file = File::create(&script_path)
                .with_context(|| format!("failed to create script {}", script_path.display()))?;
            file.write_all(interpolated.as_bytes())?;
            let mut perms = file.metadata()?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&script_path, perms)?;
            Ok(())
        })();

        // The script must be removed on every exit path, success or
        // failure, so the run happens inside a guard that always cleans up.
        let result = write_result
            .map_err(DeployError::Transport)
            .and_then(|()| self.run_in_cwd(&script_path.to_string_lossy()));

        let _ = fs::remove_file(&script_path);
        result
    }

    fn upload_content(&mut self, path: &Path, bytes: &[u8]) -> Result<(), DeployError> {
        let target = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))
                .map_err(DeployError::Transport)?;
        }

        // Rewritten in full, never patched in place: write to a sibling
        // temp file and rename over the target.
        let tmp = target.with_extension("tmp");
        {
            let mut file = File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))
                .map_err(DeployError::Transport)?;
            file.write_all(bytes)
                .context("failed to write upload content")
                .map_err(DeployError::Transport)?;
            file.sync_all().map_err(|e| DeployError::Transport(e.into()))?;
        }
        fs::rename(&tmp, &target)
            .with_context(|| format!("failed to rename into place at {}", target.display()))
            .map_err(DeployError::Transport)?;
        Ok(())
    }

    fn read_json(&mut self, path: &Path) -> Option<serde_json::Value> {
        let target = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        let content = fs::read_to_string(target).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn sync_directory(
        &mut self,
        source: &Path,
        destination: &Path,
        exclude: &[String],
    ) -> Result<(), DeployError> {
        let destination = if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            self.cwd.join(destination)
        };
        copy_tree(source, source, &destination, exclude).map_err(DeployError::Transport)
    }
}

fn copy_tree(root: &Path, dir: &Path, destination_root: &Path, exclude: &[String]) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .expect("path was yielded from walking root");

        if is_excluded(relative, exclude) {
            continue;
        }

        let dest_path = destination_root.join(relative);
        if path.is_dir() {
            fs::create_dir_all(&dest_path)?;
            copy_tree(root, &path, destination_root, exclude)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&path, &dest_path)
                .with_context(|| format!("failed to copy {} to {}", path.display(), dest_path.display()))?;
        }
    }
    Ok(())
}
