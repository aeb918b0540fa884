//! Phase 5: swaps each tracked site's declaring initializer for its
//! stored AST result, evaluates and replaces untracked inline
//! `$`-suffixed calls in place (non-fatal on failure — the call is left
//! untouched and the failure is reported back to the caller as a
//! diagnostic), and prints the tree back to source text.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use pod_ast::{NodeArena, print_module};
use pod_graph::Graph;
use pod_host::HostRuntime;
use pod_types::SiteKey;
use swc_common::SourceMap;
use swc_common::sync::Lrc;
use swc_ecma_ast::{CallExpr, Expr, Module, Pat, VarDeclarator};
use swc_ecma_visit::{VisitMut, VisitMutWith};

use crate::discovery::{direct_call_callee, is_macro_name};
use crate::project::{Project, resolve_relative};
use crate::resolve::{EvalCtx, eval_expr, is_resolvable_path};

pub struct RewriteOutcome {
    pub source: String,
    /// One message per inline macro call that failed to evaluate — the
    /// call itself is left untouched in the printed source.
    pub inline_failures: Vec<String>,
}

pub fn rewrite_and_print(
    cm: &Lrc<SourceMap>,
    mut module: Module,
    file_path: &Path,
    project: &Project,
    graph: &mut Graph,
    host: &HostRuntime,
    arena: Rc<RefCell<NodeArena>>,
) -> anyhow::Result<RewriteOutcome> {
    let mut visitor = RewriteVisitor {
        file_path,
        project,
        graph,
        host,
        arena,
        inline_failures: Vec::new(),
    };
    module.visit_mut_with(&mut visitor);
    let inline_failures = visitor.inline_failures;
    let source = print_module(cm, &module)?;
    Ok(RewriteOutcome {
        source,
        inline_failures,
    })
}

struct RewriteVisitor<'a> {
    file_path: &'a Path,
    project: &'a Project,
    graph: &'a mut Graph,
    host: &'a HostRuntime,
    arena: Rc<RefCell<NodeArena>>,
    inline_failures: Vec<String>,
}

impl VisitMut for RewriteVisitor<'_> {
    fn visit_mut_var_declarator(&mut self, node: &mut VarDeclarator) {
        if let Pat::Ident(binding) = &node.name {
            let name = binding.id.sym.to_string();
            let key = SiteKey::from_root(&self.project.root, self.file_path, &name);
            if let Some(result) = self.graph.get_result(&key) {
                // A tracked site's call was already fully executed in
                // Phase 4; swap the whole initializer and stop — don't
                // also descend into the original macro call below, or
                // `visit_mut_expr` would try to invoke it again as if it
                // were an untracked inline call.
                node.init = Some(Box::new(result.clone()));
                return;
            }
        }
        node.visit_mut_children_with(self);
    }

    fn visit_mut_expr(&mut self, node: &mut Expr) {
        node.visit_mut_children_with(self);

        let Expr::Call(call) = node else { return };
        let Some(callee) = direct_call_callee(call) else {
            return;
        };
        if !is_macro_name(callee) {
            return;
        }

        match self.invoke_inline(call) {
            Ok(result) => *node = result,
            Err(message) => {
                tracing::warn!(
                    file = %self.file_path.display(),
                    error = %message,
                    "inline macro call failed, leaving call site untouched"
                );
                self.inline_failures.push(message);
            }
        }
    }
}

impl RewriteVisitor<'_> {
    fn invoke_inline(&mut self, call: &CallExpr) -> Result<Expr, String> {
        let macro_name = direct_call_callee(call)
            .map(str::to_string)
            .expect("caller already checked this is a direct-identifier call");

        let import = self
            .project
            .with_index(self.file_path, |index| index.imports.get(&macro_name).cloned())
            .flatten()
            .ok_or_else(|| format!("`{macro_name}` is not imported in this file"))?;

        if !is_resolvable_path(&import.specifier) {
            return Err(format!(
                "`{macro_name}` is imported from package specifier `{}`; inline macros must resolve to a local file",
                import.specifier
            ));
        }

        let module_path = resolve_relative(self.file_path, &import.specifier)
            .ok_or_else(|| format!("could not resolve module `{}`", import.specifier))?;

        // Inline calls are not registered in the graph; a synthetic key
        // just gives the resolver something to (harmlessly, best-effort)
        // attribute dependency edges to.
        let file_key = self.project.key_of(self.file_path);
        let inline_site = SiteKey::new(file_key.clone(), format!("<inline:{macro_name}>"));

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let mut ctx = EvalCtx {
                project: self.project,
                graph: self.graph,
                current_site: inline_site.clone(),
                probe: false,
            };
            let value = eval_expr(&arg.expr, self.file_path, &mut ctx)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("an argument to `{macro_name}` is not statically resolvable"))?;
            args.push(value);
        }

        let handle = self
            .host
            .invoke(
                &module_path,
                &self.project.root,
                &import.imported,
                &args,
                self.arena.clone(),
                &file_key,
            )
            .map_err(|e| e.to_string())?;

        self.arena
            .borrow_mut()
            .take(handle.to_node_id())
            .ok_or_else(|| format!("macro `{macro_name}` did not return an AST node"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::index_and_discover;
    use pod_ast::{NodeArena, parse_source};
    use pod_host::HostRuntime;
    use std::path::PathBuf;

    #[test]
    fn tracked_site_initializer_is_swapped() {
        let root = PathBuf::from("/proj");
        let file = PathBuf::from("/proj/app.ts");
        let parsed = parse_source(
            "import { id$ } from \"./m\";\nconst x = id$(1);",
            "app.ts",
            false,
        )
        .unwrap();
        let mut graph = Graph::new();
        index_and_discover(&file, &root, "app.ts", &parsed.module, &mut graph);
        graph
            .set_result(&SiteKey::new("app.ts", "x"), pod_ast::factory::num_lit(99.0))
            .unwrap();

        let project = Project::new(root);
        project.seed(&file, &parsed.module, &mut graph);
        let host = HostRuntime::new().unwrap();
        let arena = Rc::new(RefCell::new(NodeArena::new()));

        let outcome = rewrite_and_print(
            &parsed.cm,
            parsed.module,
            &file,
            &project,
            &mut graph,
            &host,
            arena,
        )
        .unwrap();

        assert!(outcome.source.contains("const x = 99"));
        assert!(outcome.inline_failures.is_empty());
    }

    #[test]
    fn untracked_inline_call_without_a_definition_is_left_untouched() {
        let root = PathBuf::from("/proj");
        let file = PathBuf::from("/proj/app.ts");
        let parsed = parse_source("f(other$(1, 2));", "app.ts", false).unwrap();
        let mut graph = Graph::new();
        index_and_discover(&file, &root, "app.ts", &parsed.module, &mut graph);

        let project = Project::new(root);
        project.seed(&file, &parsed.module, &mut graph);
        let host = HostRuntime::new().unwrap();
        let arena = Rc::new(RefCell::new(NodeArena::new()));

        let outcome = rewrite_and_print(
            &parsed.cm,
            parsed.module,
            &file,
            &project,
            &mut graph,
            &host,
            arena,
        )
        .unwrap();

        assert!(outcome.source.contains("other$(1, 2)"));
        assert_eq!(outcome.inline_failures.len(), 1);
    }
}
