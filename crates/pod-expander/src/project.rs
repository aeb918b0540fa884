//! Lazily loads and indexes the files a macro argument's identifier
//! resolution crosses into, caching each by canonical path so a file
//! pulled in by two different sites is only read and parsed once per
//! `expand` call.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pod_ast::{ParsedSource, parse_source};
use pod_graph::Graph;
use swc_ecma_ast::Module;

use crate::discovery::{FileIndex, index_and_discover};

pub struct CachedFile {
    pub module: Module,
    pub index: FileIndex,
}

/// Resolves a relative import specifier against the file that imports it,
/// trying the same candidate-extension list the host runtime's bundler
/// uses, so `./macros` and `./macros.ts` resolve identically whether the
/// expander or the host loads them.
pub fn resolve_relative(base_file: &Path, specifier: &str) -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &["", ".ts", ".tsx", "/index.ts", "/index.tsx"];
    let base_dir = base_file.parent().unwrap_or_else(|| Path::new("."));
    let raw = base_dir.join(specifier);
    for suffix in CANDIDATES {
        let candidate = if suffix.is_empty() {
            raw.clone()
        } else if let Some(stripped) = suffix.strip_prefix('/') {
            raw.join(stripped)
        } else {
            PathBuf::from(format!("{}{suffix}", raw.display()))
        };
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

pub fn file_key(project_root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(project_root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Owns the per-file cache used across the whole `expand()` call: the
/// entry file plus any relative-import neighbor files Phase 2 crosses
/// into while resolving macro arguments.
pub struct Project {
    pub root: PathBuf,
    files: RefCell<BTreeMap<PathBuf, CachedFile>>,
}

impl Project {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            files: RefCell::new(BTreeMap::new()),
        }
    }

    /// Registers an already-parsed file (the entry file, whose `ParsedSource`
    /// the caller needs to keep around anyway for Phase 5 printing).
    pub fn seed(&self, path: &Path, module: &Module, graph: &mut Graph) {
        if self.files.borrow().contains_key(path) {
            return;
        }
        let key = file_key(&self.root, path);
        let index = index_and_discover(path, &self.root, &key, module, graph);
        self.files.borrow_mut().insert(
            path.to_path_buf(),
            CachedFile {
                module: module.clone(),
                index,
            },
        );
    }

    /// Loads, parses, and indexes `path` if it isn't already cached,
    /// registering any macro sites it contains into `graph`.
    pub fn load(&self, path: &Path, graph: &mut Graph) -> Result<()> {
        if self.files.borrow().contains_key(path) {
            return Ok(());
        }
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_jsx = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("tsx") | Some("jsx")
        );
        let ParsedSource { module, .. } = parse_source(&source, &path.to_string_lossy(), is_jsx)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let key = file_key(&self.root, path);
        let index = index_and_discover(path, &self.root, &key, &module, graph);
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), CachedFile { module, index });
        Ok(())
    }

    pub fn with_index<R>(&self, path: &Path, f: impl FnOnce(&FileIndex) -> R) -> Option<R> {
        self.files.borrow().get(path).map(|cf| f(&cf.index))
    }

    pub fn key_of(&self, path: &Path) -> String {
        file_key(&self.root, path)
    }
}
