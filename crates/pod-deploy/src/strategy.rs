//! The common contract both transport strategies implement. `pod-deploy`'s
//! orchestrator never touches a shell or a socket directly — every effect
//! on the target goes through one of these five primitives, so the
//! dispatch logic in `orchestrator` is identical for a local target and
//! an ssh target.

use std::collections::BTreeMap;
use std::path::Path;

use pod_types::DeployError;

/// The result of a `run` or `run-script` invocation: exit code plus
/// captured stdout/stderr, without per-call timeout bookkeeping, since a
/// deploy command's timeout is the caller's retry budget, not a per-call
/// one.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A transport to a deploy target. Implementations: [`crate::local::LocalStrategy`]
/// and [`crate::ssh::SshStrategy`].
pub trait Strategy {
    /// Executes a shell command and collects its output. A single-argument
    /// `cd <path>` is handled at this level by updating the strategy's
    /// tracked working directory — no shell is invoked for it.
    fn run(&mut self, command: &str) -> Result<CommandOutput, DeployError>;

    /// Writes `content` to a temporary location (interpolating `${...}`
    /// against `context` first), makes it executable, runs it, and
    /// removes it on every exit path.
    fn run_script(
        &mut self,
        name: &str,
        content: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, DeployError>;

    /// Writes `bytes` to `path`, creating parent directories as needed.
    fn upload_content(&mut self, path: &Path, bytes: &[u8]) -> Result<(), DeployError>;

    /// Reads and parses a JSON file. Returns `None` on a missing file or a
    /// parse failure — both are tolerated, never surfaced as an error.
    fn read_json(&mut self, path: &Path) -> Option<serde_json::Value>;

    /// Recursively copies `source` to `destination`, skipping any relative
    /// path [`crate::exclude::is_excluded`] against `exclude`.
    fn sync_directory(
        &mut self,
        source: &Path,
        destination: &Path,
        exclude: &[String],
    ) -> Result<(), DeployError>;
}

/// A single-argument `cd <path>` command, if `command` is exactly that.
pub(crate) fn as_cd_command(command: &str) -> Option<&str> {
    let trimmed = command.trim();
    let rest = trimmed.strip_prefix("cd ")?;
    let rest = rest.trim();
    if rest.is_empty() || rest.split_whitespace().count() != 1 {
        return None;
    }
    Some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_single_argument_cd() {
        assert_eq!(as_cd_command("cd /srv/app"), Some("/srv/app"));
    }

    #[test]
    fn rejects_multi_argument_or_chained_commands() {
        assert_eq!(as_cd_command("cd /srv/app && ls"), None);
        assert_eq!(as_cd_command("echo cd"), None);
        assert_eq!(as_cd_command("cd"), None);
    }
}
