//! Resolves a macro module and the relative imports it pulls in, strips
//! TypeScript, rewrites each to the CommonJS shape ([`crate::commonjs`]),
//! and concatenates the result into one script carrying a small
//! `require`/`module.exports` runtime.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use pod_ast::{parse_source, strip_typescript};

use crate::commonjs::{SpecifierResolver, to_commonjs};

pub struct Bundle {
    pub entry_key: String,
    pub script: String,
}

const CANDIDATE_EXTENSIONS: &[&str] = &["", ".ts", ".tsx", "/index.ts", "/index.tsx"];

fn resolve_relative(base_file: &Path, specifier: &str) -> Option<PathBuf> {
    let base_dir = base_file.parent().unwrap_or_else(|| Path::new("."));
    let raw = base_dir.join(specifier);
    for suffix in CANDIDATE_EXTENSIONS {
        let candidate = if suffix.is_empty() {
            raw.clone()
        } else if suffix.starts_with('/') {
            raw.join(&suffix[1..])
        } else {
            PathBuf::from(format!("{}{suffix}", raw.display()))
        };
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn canonical_key(project_root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(project_root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

struct Resolver<'a> {
    project_root: &'a Path,
    pending: VecDeque<PathBuf>,
    visited: BTreeMap<String, PathBuf>,
}

impl SpecifierResolver for Resolver<'_> {
    fn resolve(&mut self, from_file: &Path, specifier: &str) -> Result<String> {
        if !specifier.starts_with("./") && !specifier.starts_with("../") {
            bail!(
                "macro module {} imports `{specifier}`, which is not a relative path; \
                 macro modules may only import other local macro modules",
                from_file.display()
            );
        }

        let path = resolve_relative(from_file, specifier).with_context(|| {
            format!(
                "cannot resolve `{specifier}` imported from {}",
                from_file.display()
            )
        })?;
        let key = canonical_key(self.project_root, &path);

        if !self.visited.contains_key(&key) {
            self.visited.insert(key.clone(), path.clone());
            self.pending.push_back(path);
        }

        Ok(key)
    }
}

/// Bundles `entry_file` (and every relative import it transitively pulls
/// in) into a single script. `project_root` only affects the module keys
/// used inside the generated `require`/`module.exports` wiring — it need
/// not match the expander's own project root.
pub fn bundle(entry_file: &Path, project_root: &Path) -> Result<Bundle> {
    let entry_key = canonical_key(project_root, entry_file);

    let mut resolver = Resolver {
        project_root,
        pending: VecDeque::from([entry_file.to_path_buf()]),
        visited: BTreeMap::from([(entry_key.clone(), entry_file.to_path_buf())]),
    };

    let mut modules: BTreeMap<String, String> = BTreeMap::new();

    while let Some(path) = resolver.pending.pop_front() {
        let key = canonical_key(project_root, &path);
        if modules.contains_key(&key) {
            continue;
        }

        let source = fs::read_to_string(&path)
            .with_context(|| format!("failed to read macro module {}", path.display()))?;
        let is_jsx = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("tsx") | Some("jsx")
        );

        let parsed = parse_source(&source, &path.to_string_lossy(), is_jsx)?;
        let stripped = strip_typescript(parsed.module);
        let stmts = to_commonjs(stripped.body, &path, &mut resolver)?;

        let wrapped_module = swc_ecma_ast::Module {
            span: swc_common::DUMMY_SP,
            body: stmts.into_iter().map(swc_ecma_ast::ModuleItem::Stmt).collect(),
            shebang: None,
        };
        let printed = pod_ast::print_module(&parsed.cm, &wrapped_module)?;

        modules.insert(key, printed);
    }

    let mut script = String::from(
        "(function(){\n\
         var __pod_modules = {};\n\
         var __pod_cache = {};\n\
         function require(__pod_spec) {\n\
         \u{20}\u{20}if (__pod_cache[__pod_spec]) { return __pod_cache[__pod_spec].exports; }\n\
         \u{20}\u{20}var module = { exports: {} };\n\
         \u{20}\u{20}__pod_cache[__pod_spec] = module;\n\
         \u{20}\u{20}__pod_modules[__pod_spec](module, module.exports, require);\n\
         \u{20}\u{20}return module.exports;\n\
         }\n",
    );

    for (key, body) in &modules {
        script.push_str(&format!(
            "__pod_modules[{key:?}] = function(module, exports, require) {{\n{body}\n}};\n"
        ));
    }

    script.push_str(&format!(
        "globalThis.__pod_entry = require({entry_key:?});\n}})();\n"
    ));

    Ok(Bundle { entry_key, script })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn bundles_entry_with_a_relative_dependency() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("helpers.ts"),
            "export function double(n: number): number { return n * 2; }",
        )
        .unwrap();
        fs::write(
            dir.path().join("entry.ts"),
            "import { double } from \"./helpers\";\n\
             export function run$(n: number) { return double(n); }",
        )
        .unwrap();

        let bundle = bundle(&dir.path().join("entry.ts"), dir.path()).unwrap();
        assert!(bundle.script.contains("helpers.ts"));
        assert!(bundle.script.contains("entry.ts"));
        assert!(bundle.script.contains("globalThis.__pod_entry"));
    }

    #[test]
    fn rejects_package_specifier_imports() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("entry.ts"),
            "import { z } from \"zod\";\nexport function run$() { return z; }",
        )
        .unwrap();

        let err = bundle(&dir.path().join("entry.ts"), dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("not a relative path"));
    }
}
