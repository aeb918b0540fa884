//! Local file-path resolution for manifest fields that always refer to the
//! machine running the orchestrator — `keyPath` and a sync action's
//! `source` — regardless of which strategy the target ultimately uses.

use std::path::{Path, PathBuf};

/// Tilde-expands against the user's home directory, then resolves against
/// `cwd` if the result is still not absolute.
pub fn resolve_local_path(raw: &str, cwd: &Path) -> PathBuf {
    let expanded = if raw == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw))
    } else if let Some(rest) = raw.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw))
    } else {
        PathBuf::from(raw)
    };

    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_returned_unchanged() {
        let cwd = PathBuf::from("/home/deploy/project");
        assert_eq!(resolve_local_path("/etc/keys/id_ed25519", &cwd), PathBuf::from("/etc/keys/id_ed25519"));
    }

    #[test]
    fn relative_path_resolves_against_cwd() {
        let cwd = PathBuf::from("/home/deploy/project");
        assert_eq!(resolve_local_path("keys/deploy", &cwd), PathBuf::from("/home/deploy/project/keys/deploy"));
    }

    #[test]
    fn tilde_expands_against_home() {
        let cwd = PathBuf::from("/home/deploy/project");
        let resolved = resolve_local_path("~/.ssh/id_ed25519", &cwd);
        assert!(resolved.ends_with(".ssh/id_ed25519"));
        assert!(resolved.is_absolute());
    }
}
