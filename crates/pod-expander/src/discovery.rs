//! Phase 1: walks a parsed module looking for macro call sites, and
//! builds the small per-file index (top-level `const`/`let`/`var`
//! bindings and named imports) Phase 2/4's identifier resolver reads
//! from.

use std::collections::BTreeMap;
use std::path::Path;

use pod_graph::Graph;
use pod_types::SiteKey;
use swc_ecma_ast::{
    CallExpr, Callee, Decl, Expr, Module, ModuleDecl, ModuleItem, Pat, Stmt, VarDeclKind,
    VarDeclarator,
};
use swc_ecma_visit::{Visit, VisitWith};

/// One named import as seen from the importing file: the local binding
/// name and the specifier/exported-name it resolves to.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub specifier: String,
    pub imported: String,
}

/// Everything the resolver needs to know about one file's top level,
/// plus the set of macro sites discovered inside it.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    pub consts: BTreeMap<String, Expr>,
    pub non_const_bindings: std::collections::BTreeSet<String>,
    pub imports: BTreeMap<String, ImportBinding>,
}

/// Returns the identifier text of a direct call's callee, if the call is
/// a plain `name(...)` (not a member call, not a call through an
/// arbitrary expression).
pub fn direct_call_callee(call: &CallExpr) -> Option<&str> {
    match &call.callee {
        Callee::Expr(expr) => match expr.as_ref() {
            Expr::Ident(id) => Some(&id.sym),
            _ => None,
        },
        _ => None,
    }
}

pub fn is_macro_name(name: &str) -> bool {
    name.ends_with('$')
}

/// Indexes `module`'s top-level bindings and imports, and registers every
/// top-level macro call site (a `const`/`let`/`var` initialized directly
/// by a call to a `$`-suffixed identifier) into `graph`.
///
/// Discovery walks recursively into nested scopes — implemented by
/// [`DiscoveryVisitor`], which registers sites found at any depth while
/// [`FileIndex`] itself only tracks top-level
/// bindings (nested `const`s are not valid cross-file import targets and
/// Phase 2's resolver only ever needs top-level names).
pub fn index_and_discover(
    file_path: &Path,
    project_root: &Path,
    file_key: &str,
    module: &Module,
    graph: &mut Graph,
) -> FileIndex {
    let mut index = FileIndex::default();

    for item in &module.body {
        match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                for specifier in &import.specifiers {
                    if let swc_ecma_ast::ImportSpecifier::Named(named) = specifier {
                        let imported = match &named.imported {
                            Some(swc_ecma_ast::ModuleExportName::Ident(id)) => id.sym.to_string(),
                            _ => named.local.sym.to_string(),
                        };
                        index.imports.insert(
                            named.local.sym.to_string(),
                            ImportBinding {
                                specifier: import.src.value.to_string(),
                                imported,
                            },
                        );
                    }
                }
            }
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl)))
            | ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(swc_ecma_ast::ExportDecl {
                decl: Decl::Var(var_decl),
                ..
            })) => {
                index_var_decl(var_decl, &mut index);
            }
            _ => {}
        }
    }

    let mut visitor = DiscoveryVisitor {
        file_path,
        project_root,
        file_key,
        graph,
    };
    module.visit_with(&mut visitor);

    index
}

fn index_var_decl(var_decl: &swc_ecma_ast::VarDecl, index: &mut FileIndex) {
    for decl in &var_decl.decls {
        let Pat::Ident(binding) = &decl.name else {
            continue;
        };
        let name = binding.id.sym.to_string();
        match var_decl.kind {
            VarDeclKind::Const => {
                if let Some(init) = &decl.init {
                    index.consts.insert(name, (**init).clone());
                }
            }
            VarDeclKind::Let | VarDeclKind::Var => {
                index.non_const_bindings.insert(name);
            }
        }
    }
}

struct DiscoveryVisitor<'a> {
    file_path: &'a Path,
    project_root: &'a Path,
    file_key: &'a str,
    graph: &'a mut Graph,
}

impl Visit for DiscoveryVisitor<'_> {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        if let (Pat::Ident(binding), Some(init)) = (&node.name, &node.init) {
            if let Expr::Call(call) = init.as_ref() {
                if let Some(callee) = direct_call_callee(call) {
                    if is_macro_name(callee) {
                        let name = binding.id.sym.to_string();
                        let key = SiteKey::from_root(self.project_root, self.file_path, &name);
                        self.graph
                            .add_site(key, self.file_key.to_string(), name, (**call).clone());
                    }
                }
            }
        }
        node.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_ast::parse_source;
    use std::path::PathBuf;

    #[test]
    fn discovers_top_level_macro_site_and_plain_const() {
        let parsed = parse_source(
            "import { add$ } from \"./macros\";\nconst x = add$(1, 2);\nconst y = 5;",
            "app.ts",
            false,
        )
        .unwrap();
        let mut graph = Graph::new();
        let root = PathBuf::from("/proj");
        let file = PathBuf::from("/proj/app.ts");
        let index =
            index_and_discover(&file, &root, "app.ts", &parsed.module, &mut graph);

        assert!(graph.contains(&SiteKey::new("app.ts", "x")));
        assert!(index.consts.contains_key("y"));
        assert_eq!(index.imports.get("add$").unwrap().specifier, "./macros");
    }

    #[test]
    fn discovers_macro_site_in_nested_scope() {
        let parsed = parse_source(
            "import { add$ } from \"./macros\";\nfunction f() { const inner = add$(1, 2); }",
            "app.ts",
            false,
        )
        .unwrap();
        let mut graph = Graph::new();
        let root = PathBuf::from("/proj");
        let file = PathBuf::from("/proj/app.ts");
        index_and_discover(&file, &root, "app.ts", &parsed.module, &mut graph);

        assert!(graph.contains(&SiteKey::new("app.ts", "inner")));
    }
}
