//! `pod.config.toml` support — project-root-local overrides for the macro
//! expander, merged with CLI flags. A missing file falls back to defaults;
//! a malformed one is an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// The on-disk shape of `pod.config.toml`. Every field is optional: an
/// absent file, or a file missing some fields, falls back to the CLI's
/// own defaults via [`ProjectConfig::merge_cli_root`] /
/// [`ProjectConfig::cache_dir_or_default`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Overrides the module-resolution root the host runtime bundles
    /// relative-import macro modules against. Defaults to the project
    /// root passed to [`crate::expand_project`] when absent.
    #[serde(default)]
    pub module_root: Option<PathBuf>,

    /// Overrides where bundled-macro-module artifacts would be cached
    /// across invocations of the `pod` binary. The in-process
    /// [`pod_host::HostRuntime`] cache is unaffected by this (it never
    /// persists to disk); this field exists for a future on-disk bundle
    /// cache and is read but not yet consumed by [`crate::expand_project`].
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl ProjectConfig {
    /// Loads `pod.config.toml` from `project_root` if present. A missing
    /// file is not an error — it's the common case — but an unparseable
    /// one is, since a malformed config the user meant to take effect
    /// should never be silently ignored.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join("pod.config.toml");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn module_root_or(&self, project_root: &Path) -> PathBuf {
        self.module_root.clone().unwrap_or_else(|| project_root.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert!(config.module_root.is_none());
        assert_eq!(config.module_root_or(dir.path()), dir.path());
    }

    #[test]
    fn loads_declared_overrides() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("pod.config.toml"),
            "module_root = \"src\"\ncache_dir = \".pod-cache\"\n",
        )
        .unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.module_root, Some(PathBuf::from("src")));
        assert_eq!(config.cache_dir, Some(PathBuf::from(".pod-cache")));
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("pod.config.toml"), "module_root = [1, 2]\n").unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
