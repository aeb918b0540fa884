//! The `ssh` transport strategy: an authenticated secure-shell session
//! opened once per deploy invocation and held for its duration.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use anyhow::Context;
use pod_types::DeployError;
use ssh2::Session;

use crate::exclude::is_excluded;
use crate::interpolate::interpolate;
use crate::strategy::{CommandOutput, Strategy, as_cd_command};

pub struct SshStrategy {
    session: Session,
    cwd: String,
}

impl SshStrategy {
    pub fn connect(host: &str, port: u16, user: &str, key_path: &Path, deploy_path: &str) -> anyhow::Result<Self> {
        let tcp = TcpStream::connect((host, port))
            .with_context(|| format!("failed to open tcp connection to {host}:{port}"))?;
        let mut session = Session::new().context("failed to create ssh session")?;
        session.set_tcp_stream(tcp);
        session.handshake().context("ssh handshake failed")?;
        session
            .userauth_pubkey_file(user, None, key_path, None)
            .with_context(|| format!("ssh authentication failed for {user}@{host} using {}", key_path.display()))?;

        if !session.authenticated() {
            anyhow::bail!("ssh session did not authenticate for {user}@{host}");
        }

        Ok(Self {
            session,
            cwd: deploy_path.to_string(),
        })
    }

    fn exec(&self, command: &str) -> Result<CommandOutput, DeployError> {
        let wrapped = format!("cd {} && {}", shell_quote(&self.cwd), command);
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| DeployError::Transport(e.into()))?;
        channel
            .exec(&wrapped)
            .map_err(|e| DeployError::Transport(e.into()))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| DeployError::Transport(e.into()))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| DeployError::Transport(e.into()))?;

        channel.wait_close().map_err(|e| DeployError::Transport(e.into()))?;
        let exit_code = channel.exit_status().map_err(|e| DeployError::Transport(e.into()))?;

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    fn remote_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.cwd).join(path)
        }
    }

    fn mkdir_p(&self, dir: &Path) -> Result<(), DeployError> {
        self.exec(&format!("mkdir -p {}", shell_quote(&dir.to_string_lossy())))
            .map(|_| ())
    }
}

impl Strategy for SshStrategy {
    fn run(&mut self, command: &str) -> Result<CommandOutput, DeployError> {
        if let Some(target) = as_cd_command(command) {
            self.cwd = if target.starts_with('/') {
                target.to_string()
            } else {
                format!("{}/{target}", self.cwd.trim_end_matches('/'))
            };
            return Ok(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        self.exec(command)
    }

    fn run_script(
        &mut self,
        name: &str,
        content: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, DeployError> {
        let interpolated = interpolate(content, context);
        let remote_path = format!("/tmp/pod-deploy-{name}-{}", std::process::id());

        let sftp = self.session.sftp().map_err(|e| DeployError::Transport(e.into()))?;
        {
            let mut file = sftp
                .create(Path::new(&remote_path))
                .map_err(|e| DeployError::Transport(e.into()))?;
            file.write_all(interpolated.as_bytes())
                .map_err(|e| DeployError::Transport(e.into()))?;
        }

        let result = self
            .exec(&format!("chmod +x {remote_path}"))
            .and_then(|_| self.exec(&remote_path));

        // Removed on every exit path, matching the local strategy's
        // temp-script release guarantee.
        let _ = self.exec(&format!("rm -f {remote_path}"));
        result
    }

    fn upload_content(&mut self, path: &Path, bytes: &[u8]) -> Result<(), DeployError> {
        let target = self.remote_path(path);
        if let Some(parent) = target.parent() {
            self.mkdir_p(parent)?;
        }

        let sftp = self.session.sftp().map_err(|e| DeployError::Transport(e.into()))?;
        let tmp = target.with_extension("tmp");
        {
            let mut file = sftp.create(&tmp).map_err(|e| DeployError::Transport(e.into()))?;
            file.write_all(bytes).map_err(|e| DeployError::Transport(e.into()))?;
        }
        sftp.rename(&tmp, &target, None)
            .map_err(|e| DeployError::Transport(e.into()))?;
        Ok(())
    }

    fn read_json(&mut self, path: &Path) -> Option<serde_json::Value> {
        let target = self.remote_path(path);
        let sftp = self.session.sftp().ok()?;
        let mut file = sftp.open(&target).ok()?;
        let mut content = String::new();
        file.read_to_string(&mut content).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn sync_directory(
        &mut self,
        source: &Path,
        destination: &Path,
        exclude: &[String],
    ) -> Result<(), DeployError> {
        let destination = self.remote_path(destination);
        let sftp = self.session.sftp().map_err(|e| DeployError::Transport(e.into()))?;
        upload_tree(&sftp, source, source, &destination, exclude)
    }
}

fn upload_tree(
    sftp: &ssh2::Sftp,
    root: &Path,
    dir: &Path,
    destination_root: &Path,
    exclude: &[String],
) -> Result<(), DeployError> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))
        .map_err(DeployError::Transport)?;

    for entry in entries {
        let entry = entry.map_err(|e| DeployError::Transport(e.into()))?;
        let path = entry.path();
        let relative = path.strip_prefix(root).expect("path was yielded from walking root");

        if is_excluded(relative, exclude) {
            continue;
        }

        let dest_path = destination_root.join(relative);
        if path.is_dir() {
            let _ = sftp.mkdir(&dest_path, 0o755);
            upload_tree(sftp, root, &path, destination_root, exclude)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                let _ = sftp.mkdir(parent, 0o755);
            }
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))
                .map_err(DeployError::Transport)?;
            let mut remote = sftp.create(&dest_path).map_err(|e| DeployError::Transport(e.into()))?;
            remote.write_all(&bytes).map_err(|e| DeployError::Transport(e.into()))?;
        }
    }
    Ok(())
}

/// Minimal single-quoting for interpolation into a remote shell command.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
