//! The five-phase compile-time macro expansion pipeline: discovery,
//! dependency probing, ordering, execution, rewrite.
//!
//! [`expand_file`] is the single public entry point. It owns a fresh
//! [`pod_graph::Graph`] and [`pod_ast::NodeArena`] per call — a build
//! coordinator driving many files shares one [`pod_host::HostRuntime`]
//! across calls (bundled macro modules stay cached there) but gets
//! independent graphs per file; there is no module-scoped singleton
//! graph.

mod directive;
mod discovery;
mod execute;
mod project;
mod resolve;
mod rewrite;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::rc::Rc;

pub use pod_types::{ExpanderError, FileDirective};

use pod_ast::{NodeArena, ParsedSource, parse_source};
use pod_graph::{Graph, GraphError};
use pod_host::HostRuntime;
use pod_types::SiteKey;

pub use directive::detect_directive;

use crate::execute::execute_site;
use crate::project::Project;
use crate::resolve::{EvalCtx, eval_expr};
use crate::rewrite::rewrite_and_print;

/// The result of expanding one file.
#[derive(Debug)]
pub struct ExpansionOutput {
    pub source: String,
    pub directive: FileDirective,
    /// One diagnostic per inline macro call that failed to evaluate and
    /// was left untouched in `source`.
    pub inline_failures: Vec<String>,
}

/// Fast path: a source without the substring `$(` contains no
/// call-expression macro site and MUST round-trip verbatim.
///
/// Tagged-template invocation (`` ident$`...` ``) is not a discovery or
/// rewrite target of this expander — see DESIGN.md's "Tagged-template
/// macro invocation is out of scope" note — so this guard does not also
/// gate on `` $` ``; doing so would claim coverage for a form the
/// pipeline below never expands.
pub fn has_macro_sigil(source: &str) -> bool {
    source.contains("$(")
}

/// Expands every macro site reachable from `entry_file`, returning the
/// rewritten source text. `project_root` anchors [`pod_types::SiteKey`]
/// normalization and relative-import resolution; `host` is the shared
/// macro execution context (reused across files so each macro module is
/// bundled and evaluated at most once per build).
pub fn expand_file(
    entry_file: &Path,
    project_root: &Path,
    host: &HostRuntime,
) -> Result<ExpansionOutput, ExpanderError> {
    let source = fs::read_to_string(entry_file).map_err(|e| ExpanderError::Parse {
        file: entry_file.display().to_string(),
        source: anyhow::Error::new(e),
    })?;

    if !has_macro_sigil(&source) {
        return Ok(ExpansionOutput {
            source,
            directive: FileDirective::None,
            inline_failures: Vec::new(),
        });
    }

    let is_jsx = matches!(
        entry_file.extension().and_then(|e| e.to_str()),
        Some("tsx") | Some("jsx")
    );
    let ParsedSource { cm, module } = parse_source(&source, &entry_file.to_string_lossy(), is_jsx)
        .map_err(|source| ExpanderError::Parse {
            file: entry_file.display().to_string(),
            source,
        })?;

    let directive = detect_directive(&module);

    let project = Project::new(project_root.to_path_buf());
    let mut graph = Graph::new();
    project.seed(entry_file, &module, &mut graph);

    probe_dependencies(&project, &mut graph)?;

    let order = graph.topological_sort().map_err(|e| match e {
        GraphError::CycleDetected(path) => ExpanderError::CycleDetected(path),
        GraphError::UnknownSite(_) => {
            unreachable!("probe_dependencies only ever records edges to sites it just registered")
        }
    })?;

    let arena = Rc::new(RefCell::new(NodeArena::new()));
    for key in &order {
        let already_computed = graph.get(key).map(|s| s.computed).unwrap_or(false);
        if !already_computed {
            execute_site(key, &project, &mut graph, host, arena.clone())?;
        }
    }

    let outcome = rewrite_and_print(&cm, module, entry_file, &project, &mut graph, host, arena)
        .map_err(|source| ExpanderError::MacroLoad {
            specifier: entry_file.display().to_string(),
            source,
        })?;

    Ok(ExpansionOutput {
        source: outcome.source,
        directive,
        inline_failures: outcome.inline_failures,
    })
}

/// Phase 2: probes every site's arguments in no-commit mode, recording
/// dependency edges as it goes. Probing a site can pull in a new file (a
/// relative import), which registers that file's own macro sites into
/// `graph` — so this runs to a fixed point rather than a single
/// current-file pass, letting cross-file dependency chains recurse
/// through as many files as they need to.
fn probe_dependencies(project: &Project, graph: &mut Graph) -> Result<(), ExpanderError> {
    let mut probed: BTreeSet<SiteKey> = BTreeSet::new();
    loop {
        let pending: Vec<SiteKey> = graph
            .keys()
            .filter(|k| !probed.contains(k))
            .cloned()
            .collect();
        if pending.is_empty() {
            break;
        }

        for key in pending {
            probed.insert(key.clone());
            let site = graph
                .get(&key)
                .expect("key came from graph.keys() moments ago")
                .clone();
            let file_path = project.root.join(&site.file);

            for arg in &site.call.args {
                let mut ctx = EvalCtx {
                    project,
                    graph,
                    current_site: key.clone(),
                    probe: true,
                };
                // Identifier resolution failure during probing is
                // non-fatal. The dependency
                // edges it *did* manage to record before failing still
                // stand; anything still unresolvable is caught for real
                // during Phase 4 execution.
                let _ = eval_expr(&arg.expr, &file_path, &mut ctx);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn host() -> HostRuntime {
        HostRuntime::new().unwrap()
    }

    #[test]
    fn fast_path_returns_source_unchanged_verbatim() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain.ts");
        let source = "export const x = 1 + 2;\n// no sigils here\n";
        fs::write(&file, source).unwrap();

        let output = expand_file(&file, dir.path(), &host()).unwrap();
        assert_eq!(output.source, source);
        assert!(output.inline_failures.is_empty());
    }

    #[test]
    fn expands_a_single_file_macro_with_const_arguments() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("macros.ts"),
            "export function double$(n, ctx) { return ast.num(n * 2); }\n",
        )
        .unwrap();
        let entry = dir.path().join("app.ts");
        fs::write(
            &entry,
            "import { double$ } from \"./macros\";\nconst n = 21;\nconst doubled = double$(n);\n",
        )
        .unwrap();

        let output = expand_file(&entry, dir.path(), &host()).unwrap();
        assert!(output.source.contains("const doubled = 42"));
    }

    #[test]
    fn directive_is_preserved_as_the_first_statement() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("macros.ts"),
            "export function id$(n, ctx) { return ast.num(n); }\n",
        )
        .unwrap();
        let entry = dir.path().join("app.ts");
        fs::write(
            &entry,
            "\"use public\";\nimport { id$ } from \"./macros\";\nconst n = id$(1);\n",
        )
        .unwrap();

        let output = expand_file(&entry, dir.path(), &host()).unwrap();
        assert_eq!(output.directive, FileDirective::Public);
        assert!(output.source.trim_start().starts_with("\"use public\""));
    }

    #[test]
    fn cyclic_macro_sites_fail_with_the_full_cycle_path() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("macros.ts"),
            "export function id$(n, ctx) { return ast.num(n); }\n",
        )
        .unwrap();
        let entry = dir.path().join("app.ts");
        fs::write(
            &entry,
            "import { id$ } from \"./macros\";\nconst a = id$(b);\nconst b = id$(a);\n",
        )
        .unwrap();

        let err = expand_file(&entry, dir.path(), &host()).unwrap_err();
        assert!(matches!(err, ExpanderError::CycleDetected(path) if path.len() >= 2));
    }

    #[test]
    fn cross_file_const_import_resolves_through_to_the_macro_argument() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("macros.ts"),
            "export function double$(n, ctx) { return ast.num(n * 2); }\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("constants.ts"),
            "export const base = 10;\n",
        )
        .unwrap();
        let entry = dir.path().join("app.ts");
        fs::write(
            &entry,
            "import { double$ } from \"./macros\";\nimport { base } from \"./constants\";\nconst doubled = double$(base);\n",
        )
        .unwrap();

        let output = expand_file(&entry, dir.path(), &host()).unwrap();
        assert!(output.source.contains("const doubled = 20"));
    }
}
