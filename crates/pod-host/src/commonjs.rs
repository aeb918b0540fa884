//! Rewrites one module's ES `import`/`export` syntax into the
//! `module`/`exports`/`require` shape the bundle's wrapper function
//! expects.
//!
//! Rather than hand-building the replacement AST nodes (`AssignExpr`,
//! `VarDecl`, ...) this renders each replacement as a tiny JS text
//! fragment and reparses it with [`pod_ast::parse_script_fragment`] —
//! the same technique the rest of the host uses to splice generated code
//! into a bundle without fighting swc's node constructors by hand.

use std::path::Path;

use anyhow::{Result, bail};
use pod_ast::parse_script_fragment;
use swc_ecma_ast::{
    Decl, DefaultDecl, ImportSpecifier, ModuleDecl, ModuleExportName, ModuleItem, Pat, Stmt,
};

/// Resolves an import specifier (as written in source, e.g. `"./helpers"`)
/// against the file it appears in, returning the canonical module key the
/// bundle registers that module under. Implemented by the bundler, which
/// tracks the BFS of modules still to be visited.
pub trait SpecifierResolver {
    fn resolve(&mut self, from_file: &Path, specifier: &str) -> Result<String>;
}

pub fn to_commonjs(
    items: Vec<ModuleItem>,
    file: &Path,
    resolver: &mut dyn SpecifierResolver,
) -> Result<Vec<Stmt>> {
    let mut out = Vec::with_capacity(items.len());

    for item in items {
        match item {
            ModuleItem::Stmt(stmt) => out.push(stmt),
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::Import(import) => {
                    let key = resolver.resolve(file, &import.src.value)?;
                    for specifier in &import.specifiers {
                        let fragment = match specifier {
                            ImportSpecifier::Default(d) => format!(
                                "const {local} = require({key:?}).default;",
                                local = d.local.sym
                            ),
                            ImportSpecifier::Namespace(ns) => {
                                format!("const {local} = require({key:?});", local = ns.local.sym)
                            }
                            ImportSpecifier::Named(named) => {
                                let imported = match &named.imported {
                                    Some(ModuleExportName::Ident(id)) => id.sym.to_string(),
                                    Some(ModuleExportName::Str(_)) => {
                                        bail!(
                                            "string-named imports are not supported in macro modules"
                                        )
                                    }
                                    None => named.local.sym.to_string(),
                                };
                                format!(
                                    "const {local} = require({key:?}).{imported};",
                                    local = named.local.sym
                                )
                            }
                        };
                        out.extend(parse_script_fragment(&fragment)?);
                    }
                }
                ModuleDecl::ExportDecl(export) => {
                    let names = decl_bound_names(&export.decl);
                    out.push(Stmt::Decl(export.decl));
                    for name in names {
                        out.extend(parse_script_fragment(&format!(
                            "exports.{name} = {name};"
                        ))?);
                    }
                }
                ModuleDecl::ExportDefaultDecl(export) => match export.decl {
                    DefaultDecl::Fn(_) | DefaultDecl::Class(_) => {
                        bail!(
                            "default exports in {} are not supported; \
                             export macro entry points as named exports",
                            file.display()
                        );
                    }
                    DefaultDecl::TsInterfaceDecl(_) => {
                        // Types vanish with the TS-strip pass; nothing to emit.
                    }
                },
                ModuleDecl::ExportDefaultExpr(_) => {
                    bail!(
                        "default exports in {} are not supported; \
                         export macro entry points as named exports",
                        file.display()
                    );
                }
                ModuleDecl::ExportNamed(named) if named.src.is_none() => {
                    for spec in &named.specifiers {
                        if let swc_ecma_ast::ExportSpecifier::Named(n) = spec {
                            let local = match &n.orig {
                                ModuleExportName::Ident(id) => id.sym.to_string(),
                                ModuleExportName::Str(_) => bail!(
                                    "string-named exports are not supported in macro modules"
                                ),
                            };
                            let exported = match &n.exported {
                                Some(ModuleExportName::Ident(id)) => id.sym.to_string(),
                                Some(ModuleExportName::Str(_)) => bail!(
                                    "string-named exports are not supported in macro modules"
                                ),
                                None => local.clone(),
                            };
                            out.extend(parse_script_fragment(&format!(
                                "exports.{exported} = {local};"
                            ))?);
                        } else {
                            bail!("only plain named exports are supported in macro modules");
                        }
                    }
                }
                other => bail!(
                    "{} uses an unsupported module form ({:?}); macro modules support only \
                     relative imports and named exports",
                    file.display(),
                    other
                ),
            },
        }
    }

    Ok(out)
}

fn decl_bound_names(decl: &Decl) -> Vec<String> {
    match decl {
        Decl::Var(var_decl) => var_decl
            .decls
            .iter()
            .filter_map(|d| match &d.name {
                Pat::Ident(id) => Some(id.id.sym.to_string()),
                _ => None,
            })
            .collect(),
        Decl::Fn(fn_decl) => vec![fn_decl.ident.sym.to_string()],
        Decl::Class(class_decl) => vec![class_decl.ident.sym.to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_ast::parse_source;
    use std::path::PathBuf;

    struct StubResolver;
    impl SpecifierResolver for StubResolver {
        fn resolve(&mut self, _from: &Path, specifier: &str) -> Result<String> {
            Ok(specifier.trim_start_matches("./").to_string())
        }
    }

    #[test]
    fn rewrites_named_import_and_export() {
        let parsed = parse_source(
            "import { helper } from \"./helpers\";\nexport const answer = helper(41) + 1;",
            "macro.ts",
            false,
        )
        .unwrap();
        let mut resolver = StubResolver;
        let stmts =
            to_commonjs(parsed.module.body, Path::new("macro.ts"), &mut resolver).unwrap();
        assert!(stmts.len() >= 3);
    }

    #[test]
    fn rejects_default_export() {
        let parsed = parse_source("export default 1;", "macro.ts", false).unwrap();
        let mut resolver = StubResolver;
        let err = to_commonjs(parsed.module.body, Path::new("macro.ts"), &mut resolver)
            .unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }
}
