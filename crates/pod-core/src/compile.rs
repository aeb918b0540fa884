//! Whole-project macro expansion: walks every `.ts`/`.tsx`/`.jsx` file
//! under a project root and runs each through [`pod_expander::expand_file`]
//! against one shared [`pod_host::HostRuntime`].
//!
//! A watched build pipeline would call through here one file at a time on
//! each change; `expand_project` exists for the one-shot "compile
//! everything" case (e.g. a production build) and doubles as the harness
//! the golden/property tests in this crate drive.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pod_expander::{ExpansionOutput, expand_file};
use pod_host::HostRuntime;
use pod_types::FileDirective;
use walkdir::WalkDir;

use crate::config::ProjectConfig;

/// One file's expansion result, labeled with the path it came from.
#[derive(Debug)]
pub struct FileResult {
    pub path: PathBuf,
    pub directive: FileDirective,
    pub source: String,
    pub inline_failures: Vec<String>,
}

/// Expands a single file in isolation. This is the entry point a
/// watched-bundler's single-file transform hook would call on every save.
pub fn expand_one(file: &Path, project_root: &Path, host: &HostRuntime) -> Result<FileResult> {
    let ExpansionOutput { source, directive, inline_failures } =
        expand_file(file, project_root, host).with_context(|| {
            format!("failed to expand {}", file.display())
        })?;
    for failure in &inline_failures {
        tracing::warn!(file = %file.display(), %failure, "inline macro call left unresolved");
    }
    Ok(FileResult {
        path: file.to_path_buf(),
        directive,
        source,
        inline_failures,
    })
}

/// Walks `project_root` (honoring `pod.config.toml`'s `module_root`
/// override) and expands every TypeScript-family source file found,
/// skipping `node_modules` and any directory starting with `.` the way a
/// project-wide scan conventionally does. One [`HostRuntime`] is shared
/// across the whole walk so a macro module imported by many files is
/// bundled and evaluated only once.
pub fn expand_project(project_root: &Path) -> Result<Vec<FileResult>> {
    let config = ProjectConfig::load(project_root)?;
    let root = config.module_root_or(project_root);
    let host = HostRuntime::new().context("failed to start the macro host runtime")?;

    let mut results = Vec::new();
    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e))
    {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_source_file(path) {
            continue;
        }
        results.push(expand_one(path, project_root, &host)?);
    }
    results.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(results)
}

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    matches!(
        entry.file_name().to_str(),
        Some("node_modules") | Some(".git") | Some("dist") | Some("target")
    )
}

fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts") | Some("tsx") | Some("jsx")
    )
}
